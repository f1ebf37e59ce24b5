//! Redis testcontainer shared by the distributed tier tests.

use saga_cache::RedisCache;
use saga_config::RedisConfig;
use std::time::Duration;
use testcontainers::{runners::AsyncRunner, ContainerAsync};
use testcontainers_modules::redis::{Redis, REDIS_PORT};

pub struct TestRedis {
    _container: ContainerAsync<Redis>,
    config: RedisConfig,
}

impl TestRedis {
    pub async fn new() -> Self {
        let container = Redis::default().start().await.expect("Failed to start Redis container");
        let port = container
            .get_host_port_ipv4(REDIS_PORT)
            .await
            .expect("Failed to get Redis port");

        let config = RedisConfig {
            url: format!("redis://127.0.0.1:{}", port),
            pool_size: 4,
            mutex_lease_ms: 1_000,
            mutex_tries: 5,
            mutex_retry_min_ms: 10,
            mutex_retry_max_ms: 20,
            ..RedisConfig::default()
        };

        Self {
            _container: container,
            config,
        }
    }

    pub fn config(&self) -> &RedisConfig {
        &self.config
    }

    /// Connects a new client, as a separate replica would.
    pub async fn connect(&self) -> RedisCache {
        for _ in 0..30 {
            if let Ok(cache) = RedisCache::connect(&self.config).await {
                return cache;
            }
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
        panic!("Redis did not accept connections");
    }
}
