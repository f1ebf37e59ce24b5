//! In-process cache tier.

use crate::error::CacheResult;
use moka::future::Cache;
use saga_config::LocalCacheConfig;
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;
use tracing::debug;

/// Bounded, TTL-evicting cache private to one process.
///
/// Values are stored as JSON so that a single cache can hold every record
/// type. A stored value that no longer decodes into the requested type is
/// reported as a miss, never as an error.
///
/// Cloning is cheap and every clone shares the same entries, which is how
/// the proxies and the invalidation cleaner see the same tier.
#[derive(Clone)]
pub struct LocalCache {
    inner: Cache<String, String>,
}

impl LocalCache {
    /// Creates a cache holding at most `max_capacity` entries, each for `ttl`.
    #[must_use]
    pub fn new(max_capacity: u64, ttl: Duration) -> Self {
        let inner = Cache::builder()
            .max_capacity(max_capacity)
            .time_to_live(ttl)
            .build();
        Self { inner }
    }

    /// Creates a cache from configuration.
    #[must_use]
    pub fn from_config(config: &LocalCacheConfig) -> Self {
        Self::new(config.max_capacity, config.expiration())
    }

    /// Returns the cached value, or `None` on a miss or a type mismatch.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.inner.get(key).await?;
        match serde_json::from_str(&raw) {
            Ok(value) => {
                debug!(key = %key, "Local cache hit");
                Some(value)
            }
            Err(e) => {
                debug!(key = %key, error = %e, "Local cache entry did not decode, treating as miss");
                None
            }
        }
    }

    /// Stores a value, replacing any previous entry.
    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> CacheResult<()> {
        let raw = serde_json::to_string(value)?;
        self.inner.insert(key.to_string(), raw).await;
        Ok(())
    }

    /// Removes a key. Removing an absent key succeeds.
    pub async fn delete(&self, key: &str) -> CacheResult<()> {
        self.inner.invalidate(key).await;
        debug!(key = %key, "Local cache entry evicted");
        Ok(())
    }

    /// Returns true if the key currently has an entry.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.inner.contains_key(key)
    }
}

impl std::fmt::Debug for LocalCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalCache")
            .field("entries", &self.inner.entry_count())
            .finish()
    }
}
