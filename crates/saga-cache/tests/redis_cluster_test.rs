//! Distributed tier against a Redis Cluster.
//!
//! Needs a running cluster; point `SAGA_TEST_REDIS_CLUSTER_URLS` at its
//! nodes (comma-separated) and run with `--ignored`.

use futures::StreamExt;
use saga_cache::{CacheError, DistributedCache, PipelineOp, RedisCache};
use saga_config::RedisConfig;
use std::time::Duration;

async fn connect_cluster() -> RedisCache {
    let urls = std::env::var("SAGA_TEST_REDIS_CLUSTER_URLS").expect("SAGA_TEST_REDIS_CLUSTER_URLS not set");
    let config = RedisConfig {
        cluster_urls: urls.split(',').map(|url| url.trim().to_string()).collect(),
        pool_size: 4,
        mutex_lease_ms: 1_000,
        mutex_tries: 3,
        mutex_retry_min_ms: 10,
        mutex_retry_max_ms: 20,
        ..RedisConfig::default()
    };
    RedisCache::connect(&config).await.expect("Failed to connect to Redis Cluster")
}

#[tokio::test]
#[ignore = "requires a Redis Cluster"]
async fn test_batch_spans_slots() {
    let cache = connect_cluster().await;

    cache
        .exec_pipeline(vec![
            PipelineOp::set("cuspersonalinfo:1", &"personal").unwrap(),
            PipelineOp::set("cusshippinginfo:1", &"shipping").unwrap(),
            PipelineOp::set("cuscred:test@ming.com", &"credentials").unwrap(),
        ])
        .await
        .unwrap();
    assert!(cache.get_raw("cuscred:test@ming.com").await.unwrap().is_some());

    cache
        .exec_pipeline(vec![
            PipelineOp::delete("cuspersonalinfo:1"),
            PipelineOp::delete("cusshippinginfo:1"),
            PipelineOp::delete("cuscred:test@ming.com"),
        ])
        .await
        .unwrap();

    assert_eq!(cache.get_raw("cuspersonalinfo:1").await.unwrap(), None);
    assert_eq!(cache.get_raw("cusshippinginfo:1").await.unwrap(), None);
    assert_eq!(cache.get_raw("cuscred:test@ming.com").await.unwrap(), None);
}

#[tokio::test]
#[ignore = "requires a Redis Cluster"]
async fn test_mutex_on_cluster() {
    let cache = connect_cluster().await;
    let first = cache.mutex("mutex:cuscheck:42");
    let second = cache.mutex("mutex:cuscheck:42");

    first.lock().await.unwrap();
    let err = second.lock().await.unwrap_err();
    assert!(matches!(err, CacheError::LockNotAcquired { attempts: 3, .. }));

    assert!(first.unlock().await.unwrap());
}

#[tokio::test]
#[ignore = "requires a Redis Cluster"]
async fn test_publish_reaches_seed_node_subscriber() {
    let cache = connect_cluster().await;
    let mut messages = cache.subscribe("saga:test:cluster").await.unwrap();

    cache
        .publish_raw("saga:test:cluster", r#"["cuscheck:1"]"#.to_string())
        .await
        .unwrap();

    let message = tokio::time::timeout(Duration::from_secs(5), messages.next())
        .await
        .expect("no message within 5s")
        .expect("subscription ended");
    assert_eq!(message, r#"["cuscheck:1"]"#);
}
