//! Read-through and write-invalidate over both cache tiers.

use crate::cache_keys;
use saga_cache::{CacheMetrics, DistributedCache, DistributedCacheExt, LocalCache, PipelineOp};
use saga_core::{AccountError, AccountResult};
use serde::{de::DeserializeOwned, Serialize};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

/// Both cache tiers plus the invalidation topic.
///
/// Every proxy holds one; cloning shares the underlying tiers.
#[derive(Clone)]
pub struct CacheTiers {
    local: LocalCache,
    distributed: Arc<dyn DistributedCache>,
    invalidation_topic: String,
}

impl CacheTiers {
    pub fn new(local: LocalCache, distributed: Arc<dyn DistributedCache>, invalidation_topic: impl Into<String>) -> Self {
        Self {
            local,
            distributed,
            invalidation_topic: invalidation_topic.into(),
        }
    }

    pub fn local(&self) -> &LocalCache {
        &self.local
    }

    pub fn distributed(&self) -> &Arc<dyn DistributedCache> {
        &self.distributed
    }

    pub fn invalidation_topic(&self) -> &str {
        &self.invalidation_topic
    }

    /// Returns the value under `key`, loading it with `load` on a full miss.
    ///
    /// Concurrent misses on the same key across the fleet are serialized on
    /// the key's distributed mutex, so `load` runs once per miss episode. A
    /// loaded value goes to the distributed tier only; the local tier is
    /// filled on the next distributed hit. Errors from `load` are returned
    /// as-is and nothing is cached.
    pub async fn get_or_load<T, F, Fut>(&self, key: &str, load: F) -> AccountResult<T>
    where
        T: Serialize + DeserializeOwned + Send + Sync,
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = AccountResult<T>> + Send,
    {
        if let Some(value) = self.local.get::<T>(key).await {
            CacheMetrics::local_hit(key);
            return Ok(value);
        }

        if let Some(value) = self.distributed_hit(key).await? {
            return Ok(value);
        }

        let mutex = self.distributed.mutex(&cache_keys::mutex(key));
        mutex.lock().await?;

        let result = self.load_locked(key, load).await;

        match mutex.unlock().await {
            Ok(true) => {}
            Ok(false) => warn!(lock = %mutex.name(), "Fill lock lease expired before release"),
            Err(e) => warn!(lock = %mutex.name(), error = %e, "Failed to release fill lock"),
        }

        result
    }

    async fn load_locked<T, F, Fut>(&self, key: &str, load: F) -> AccountResult<T>
    where
        T: Serialize + DeserializeOwned + Send + Sync,
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = AccountResult<T>> + Send,
    {
        // a sibling may have filled the key while we waited for the lock
        if let Some(value) = self.distributed_hit(key).await? {
            return Ok(value);
        }

        let value = load().await?;
        CacheMetrics::store_load(key);
        debug!(key = %key, "Loaded from store");

        self.distributed.set(key, &value).await?;
        Ok(value)
    }

    async fn distributed_hit<T>(&self, key: &str) -> AccountResult<Option<T>>
    where
        T: Serialize + DeserializeOwned + Send + Sync,
    {
        let Some(value) = self.distributed.get::<T>(key).await? else {
            return Ok(None);
        };

        CacheMetrics::distributed_hit(key);
        if let Err(e) = self.local.set(key, &value).await {
            warn!(key = %key, error = %e, "Failed to fill local cache");
        }
        Ok(Some(value))
    }

    /// Removes `keys` from the distributed tier and broadcasts them to every
    /// replica's cleaner.
    ///
    /// Call only after the store write committed. Several keys are deleted
    /// in one pipeline. The broadcast is sent only once the delete
    /// succeeded. Any failure is reported as `InvalidationFailed`.
    pub async fn invalidate(&self, keys: Vec<String>) -> AccountResult<()> {
        if keys.is_empty() {
            return Ok(());
        }

        let outcome = async {
            match keys.as_slice() {
                [key] => self.distributed.delete(key).await?,
                _ => {
                    let ops = keys.iter().map(PipelineOp::delete).collect();
                    self.distributed.exec_pipeline(ops).await?;
                }
            }

            for key in &keys {
                self.local.delete(key).await?;
            }

            self.distributed.publish(&self.invalidation_topic, &keys).await
        }
        .await;

        match outcome {
            Ok(()) => {
                CacheMetrics::invalidation_published();
                debug!(keys = ?keys, "Invalidated cache keys");
                Ok(())
            }
            Err(e) => {
                warn!(keys = ?keys, error = %e, "Cache invalidation failed after committed write");
                Err(AccountError::invalidation_failed(&keys, e))
            }
        }
    }
}

impl std::fmt::Debug for CacheTiers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheTiers")
            .field("local", &self.local)
            .field("invalidation_topic", &self.invalidation_topic)
            .finish_non_exhaustive()
    }
}
