//! Contract of the shared cache tier.
//!
//! The distributed tier is visible to every replica of the service. Besides
//! key/value storage it provides the two coordination primitives the read
//! and write paths rely on: a named lease mutex for request coalescing and a
//! pub/sub bus for invalidation broadcasts.

use crate::error::CacheResult;
use async_trait::async_trait;
use futures::stream::BoxStream;
use rand::Rng;
use saga_config::RedisConfig;
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;
use tracing::debug;

/// Stream of raw payloads received on a subscribed topic.
pub type MessageStream = BoxStream<'static, String>;

/// One command of a pipelined batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineOp {
    /// Store a JSON value under the tier's TTL policy.
    Set { key: String, value: String },
    /// Remove a key.
    Delete { key: String },
}

impl PipelineOp {
    /// Builds a `Set` op by serializing `value`.
    pub fn set<T: Serialize + ?Sized>(key: impl Into<String>, value: &T) -> CacheResult<Self> {
        Ok(Self::Set {
            key: key.into(),
            value: serde_json::to_string(value)?,
        })
    }

    /// Builds a `Delete` op.
    #[must_use]
    pub fn delete(key: impl Into<String>) -> Self {
        Self::Delete { key: key.into() }
    }

    /// Redis command name, used in error reports.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Set { .. } => "SET",
            Self::Delete { .. } => "DEL",
        }
    }

    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            Self::Set { key, .. } | Self::Delete { key } => key,
        }
    }
}

/// Entry lifetime in the distributed tier: a base TTL plus a uniformly
/// random extra in `[0, jitter]`, so entries filled together do not all
/// expire together.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TtlPolicy {
    pub base: Duration,
    pub jitter: Duration,
}

impl TtlPolicy {
    #[must_use]
    pub const fn new(base: Duration, jitter: Duration) -> Self {
        Self { base, jitter }
    }

    /// Draws the TTL for one write, in whole seconds (never zero).
    #[must_use]
    pub fn next_ttl_secs(&self) -> u64 {
        let extra = rand::thread_rng().gen_range(0..=self.jitter.as_secs());
        (self.base.as_secs() + extra).max(1)
    }
}

impl From<&RedisConfig> for TtlPolicy {
    fn from(config: &RedisConfig) -> Self {
        Self::new(config.expiration(), config.ttl_jitter())
    }
}

/// Lease and retry schedule for distributed mutexes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MutexOptions {
    /// How long a held lock survives without an explicit unlock.
    pub lease: Duration,
    /// Acquisition attempts before giving up.
    pub tries: u32,
    pub min_retry_delay: Duration,
    pub max_retry_delay: Duration,
}

impl Default for MutexOptions {
    fn default() -> Self {
        Self {
            lease: Duration::from_secs(5),
            tries: 32,
            min_retry_delay: Duration::from_millis(50),
            max_retry_delay: Duration::from_millis(250),
        }
    }
}

impl MutexOptions {
    /// Draws the pause before the next acquisition attempt.
    #[must_use]
    pub fn retry_delay(&self) -> Duration {
        let min = u64::try_from(self.min_retry_delay.as_millis()).unwrap_or(u64::MAX);
        let max = u64::try_from(self.max_retry_delay.as_millis()).unwrap_or(u64::MAX);
        if max <= min {
            return self.min_retry_delay;
        }
        Duration::from_millis(rand::thread_rng().gen_range(min..=max))
    }
}

impl From<&RedisConfig> for MutexOptions {
    fn from(config: &RedisConfig) -> Self {
        let (min_retry_delay, max_retry_delay) = config.mutex_retry_delay();
        Self {
            lease: config.mutex_lease(),
            tries: config.mutex_tries,
            min_retry_delay,
            max_retry_delay,
        }
    }
}

/// Named lock with a lease, shared by every process talking to the tier.
///
/// At most one holder exists per name while the lease is live. A handle
/// only ever releases a lock it acquired itself.
#[async_trait]
pub trait DistributedMutex: Send + Sync {
    /// Name of the lock.
    fn name(&self) -> &str;

    /// Blocks until the lock is held or the acquisition attempts run out.
    async fn lock(&self) -> CacheResult<()>;

    /// Releases the lock. Returns false when the lease had already expired
    /// or another holder had taken over.
    async fn unlock(&self) -> CacheResult<bool>;
}

/// Shared key/value tier with coordination primitives.
///
/// Values are JSON strings so the trait stays object safe. Typed access
/// lives in [`DistributedCacheExt`].
#[async_trait]
pub trait DistributedCache: Send + Sync {
    /// Returns the raw value, or `None` when the key is absent or expired.
    async fn get_raw(&self, key: &str) -> CacheResult<Option<String>>;

    /// Stores a raw value under the tier's TTL policy.
    async fn set_raw(&self, key: &str, value: String) -> CacheResult<()>;

    /// Removes a key. Removing an absent key succeeds.
    async fn delete(&self, key: &str) -> CacheResult<()>;

    /// Sends the ops as one batch and checks every reply.
    ///
    /// Fails with `CacheError::Pipeline` naming the first failing op. Ops
    /// are not atomic: those before the failure may have been applied.
    async fn exec_pipeline(&self, ops: Vec<PipelineOp>) -> CacheResult<()>;

    /// Returns a handle on the named mutex. No I/O happens until `lock`.
    fn mutex(&self, name: &str) -> Box<dyn DistributedMutex>;

    /// Publishes a raw payload to every current subscriber of `topic`.
    async fn publish_raw(&self, topic: &str, payload: String) -> CacheResult<()>;

    /// Subscribes to `topic`. Returns once the subscription is confirmed;
    /// the stream ends when the connection is lost.
    async fn subscribe(&self, topic: &str) -> CacheResult<MessageStream>;
}

/// Typed helpers over [`DistributedCache`].
#[async_trait]
pub trait DistributedCacheExt: DistributedCache {
    /// Returns the decoded value. A stored value of another shape is a miss.
    async fn get<T: DeserializeOwned + Send>(&self, key: &str) -> CacheResult<Option<T>> {
        match self.get_raw(key).await? {
            Some(json) => match serde_json::from_str(&json) {
                Ok(value) => Ok(Some(value)),
                Err(e) => {
                    debug!(key = %key, error = %e, "Distributed cache entry did not decode, treating as miss");
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }

    /// Serializes and stores a value.
    async fn set<T: Serialize + Send + Sync>(&self, key: &str, value: &T) -> CacheResult<()> {
        let json = serde_json::to_string(value)?;
        self.set_raw(key, json).await
    }

    /// Serializes and publishes a message.
    async fn publish<T: Serialize + Send + Sync>(&self, topic: &str, message: &T) -> CacheResult<()> {
        let json = serde_json::to_string(message)?;
        self.publish_raw(topic, json).await
    }
}

impl<T: DistributedCache + ?Sized> DistributedCacheExt for T {}
