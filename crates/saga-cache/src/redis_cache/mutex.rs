//! Lease lock on a single Redis key.

use super::RedisPool;
use crate::distributed::{DistributedMutex, MutexOptions};
use crate::error::{CacheError, CacheResult};
use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

/// Deletes the lock key only if it still carries our token.
const UNLOCK_SCRIPT: &str = r#"
if redis.call("get", KEYS[1]) == ARGV[1] then
    return redis.call("del", KEYS[1])
else
    return 0
end
"#;

/// Distributed mutex stored as `SET name token NX PX lease`.
///
/// Each handle carries a random token so that a holder whose lease expired
/// cannot release a lock that has since been taken by someone else.
pub struct RedisMutex {
    pool: RedisPool,
    name: String,
    token: String,
    options: MutexOptions,
}

impl RedisMutex {
    /// Creates a handle. No I/O happens until `lock`.
    #[must_use]
    pub fn new(pool: RedisPool, name: impl Into<String>, options: MutexOptions) -> Self {
        Self {
            pool,
            name: name.into(),
            token: Uuid::new_v4().to_string(),
            options,
        }
    }

    async fn try_acquire(&self) -> CacheResult<bool> {
        let mut conn = self.pool.get().await?;
        let lease_ms = u64::try_from(self.options.lease.as_millis()).unwrap_or(u64::MAX);

        let reply: Option<String> = redis::cmd("SET")
            .arg(&self.name)
            .arg(&self.token)
            .arg("NX")
            .arg("PX")
            .arg(lease_ms)
            .query_async(&mut conn)
            .await?;

        Ok(reply.is_some())
    }
}

#[async_trait]
impl DistributedMutex for RedisMutex {
    fn name(&self) -> &str {
        &self.name
    }

    async fn lock(&self) -> CacheResult<()> {
        let tries = self.options.tries.max(1);
        for attempt in 1..=tries {
            if self.try_acquire().await? {
                debug!(lock = %self.name, attempt, "Acquired distributed lock");
                return Ok(());
            }
            if attempt < tries {
                tokio::time::sleep(self.options.retry_delay()).await;
            }
        }

        Err(CacheError::LockNotAcquired {
            name: self.name.clone(),
            attempts: tries,
        })
    }

    async fn unlock(&self) -> CacheResult<bool> {
        let mut conn = self.pool.get().await?;

        let released: i32 = redis::Script::new(UNLOCK_SCRIPT)
            .key(&self.name)
            .arg(&self.token)
            .invoke_async(&mut conn)
            .await?;

        debug!(lock = %self.name, released = released == 1, "Released distributed lock");
        Ok(released == 1)
    }
}
