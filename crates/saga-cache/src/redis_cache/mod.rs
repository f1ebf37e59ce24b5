//! Redis-backed distributed tier.

mod cache;
mod connection;
mod mutex;

pub use cache::RedisCache;
pub use connection::{RedisConnection, RedisPool};
pub use mutex::RedisMutex;

use crate::error::{CacheError, CacheResult};
use deadpool_redis::{cluster, Config, PoolConfig, Runtime};
use saga_config::RedisConfig;
use tracing::info;

/// Create a Redis connection pool and check it answers `PING`.
///
/// Connects to a Redis Cluster when `cluster_urls` is set, otherwise to the
/// single server at `url`.
pub async fn create_pool(config: &RedisConfig) -> CacheResult<RedisPool> {
    let pool = if config.cluster_mode() {
        info!(
            nodes = config.cluster_urls.len(),
            "Creating Redis Cluster connection pool for the distributed cache..."
        );

        let mut cfg = cluster::Config::from_urls(config.cluster_urls.clone());
        cfg.pool = Some(PoolConfig::new(config.pool_size as usize));

        let pool = cfg
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| CacheError::Configuration(format!("Failed to create cluster pool: {}", e)))?;
        RedisPool::Cluster(pool)
    } else {
        info!("Creating Redis connection pool for the distributed cache...");

        let pool = Config::from_url(&config.url)
            .builder()
            .map_err(|e| CacheError::Configuration(format!("Invalid Redis config: {}", e)))?
            .max_size(config.pool_size as usize)
            .runtime(Runtime::Tokio1)
            .build()
            .map_err(|e| CacheError::Configuration(format!("Failed to create pool: {}", e)))?;
        RedisPool::Standalone(pool)
    };

    let mut conn = pool.get().await?;
    redis::cmd("PING").query_async::<String>(&mut conn).await?;

    info!(cluster = pool.is_cluster(), "Redis connection pool created successfully");

    Ok(pool)
}
