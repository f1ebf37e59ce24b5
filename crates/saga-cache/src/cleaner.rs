//! Cross-replica local cache invalidation.
//!
//! Every process runs one [`LocalCacheCleaner`]. It listens on the
//! invalidation topic and evicts the announced keys from its own
//! [`LocalCache`] through a [`WorkerPool`].

use crate::distributed::DistributedCache;
use crate::error::{CacheError, CacheResult};
use crate::local::LocalCache;
use crate::metrics::CacheMetrics;
use crate::worker::{shutdown_requested, WorkerPool, WorkerPoolConfig, WorkerPoolStats};
use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::Mutex;
use saga_config::CleanerConfig;
use saga_resilience::RetryPolicy;
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Lifecycle of a cleaner. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanerState {
    /// Constructed, not yet subscribed.
    Idle,
    /// Subscription open, workers starting.
    Subscribed,
    /// Dispatching evictions.
    Running,
    /// Closed or the subscription ended.
    Stopped,
}

impl fmt::Display for CleanerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Subscribed => "subscribed",
            Self::Running => "running",
            Self::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

/// Store the cleaner evicts announced keys from.
#[async_trait]
pub trait EvictionTarget: Send + Sync {
    async fn evict(&self, key: &str) -> CacheResult<()>;
}

#[async_trait]
impl EvictionTarget for LocalCache {
    async fn evict(&self, key: &str) -> CacheResult<()> {
        self.delete(key).await
    }
}

/// Subscriber that mirrors distributed invalidations into the local tier.
pub struct LocalCacheCleaner {
    distributed: Arc<dyn DistributedCache>,
    target: Arc<dyn EvictionTarget>,
    topic: String,
    pool: WorkerPool,
    retry: RetryPolicy,
    state: Mutex<CleanerState>,
    shutdown_tx: watch::Sender<bool>,
}

impl LocalCacheCleaner {
    /// Creates an idle cleaner for `topic`.
    pub fn new(
        distributed: Arc<dyn DistributedCache>,
        local: LocalCache,
        config: &CleanerConfig,
        topic: impl Into<String>,
    ) -> Self {
        Self::with_target(distributed, Arc::new(local), config, topic)
    }

    /// Creates an idle cleaner evicting from `target`.
    ///
    /// Each eviction is attempted up to `config.evict_attempts` times.
    pub fn with_target(
        distributed: Arc<dyn DistributedCache>,
        target: Arc<dyn EvictionTarget>,
        config: &CleanerConfig,
        topic: impl Into<String>,
    ) -> Self {
        let (shutdown_tx, _) = watch::channel(false);

        Self {
            distributed,
            target,
            topic: topic.into(),
            pool: WorkerPool::new(WorkerPoolConfig::from(config)),
            retry: RetryPolicy::new(config.evict_attempts, config.evict_max_jitter()),
            state: Mutex::new(CleanerState::Idle),
            shutdown_tx,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> CleanerState {
        *self.state.lock()
    }

    /// Topic this cleaner listens on.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Statistics of the eviction worker pool.
    pub fn pool_stats(&self) -> WorkerPoolStats {
        self.pool.stats()
    }

    /// Subscribes and dispatches evictions until [`close`](Self::close) is
    /// called or the subscription ends.
    ///
    /// Returns once the loop has exited and the worker pool has stopped.
    /// Can only be called once per cleaner.
    pub async fn subscribe_invalidation_events(&self) -> CacheResult<()> {
        self.transition(CleanerState::Idle, CleanerState::Subscribed)?;

        let mut messages = match self.distributed.subscribe(&self.topic).await {
            Ok(stream) => stream,
            Err(e) => {
                warn!(topic = %self.topic, error = %e, "Failed to subscribe to invalidation topic");
                self.transition(CleanerState::Subscribed, CleanerState::Idle)?;
                return Err(e);
            }
        };

        if let Err(e) = self.pool.start() {
            *self.state.lock() = CleanerState::Stopped;
            return Err(e);
        }
        if let Err(e) = self.transition(CleanerState::Subscribed, CleanerState::Running) {
            // closed while subscribing
            self.pool.stop().await;
            return Err(e);
        }
        info!(topic = %self.topic, pool_id = %self.pool.id(), "Local cache cleaner running");

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        loop {
            tokio::select! {
                biased;
                () = shutdown_requested(&mut shutdown_rx) => {
                    debug!(topic = %self.topic, "Cleaner received shutdown signal");
                    break;
                }
                message = messages.next() => match message {
                    Some(payload) => {
                        if !self.dispatch(&payload).await {
                            break;
                        }
                    }
                    None => {
                        warn!(topic = %self.topic, "Invalidation subscription ended");
                        break;
                    }
                },
            }
        }

        self.pool.stop().await;
        *self.state.lock() = CleanerState::Stopped;
        info!(topic = %self.topic, "Local cache cleaner stopped");

        Ok(())
    }

    /// Stops the subscription loop and the worker pool.
    ///
    /// Messages already received but not yet handed to a worker are dropped.
    pub async fn close(&self) {
        {
            let mut state = self.state.lock();
            if *state == CleanerState::Stopped {
                return;
            }
            *state = CleanerState::Stopped;
        }

        info!(topic = %self.topic, "Closing local cache cleaner...");
        self.shutdown_tx.send_replace(true);
        self.pool.stop().await;
    }

    /// Queues one eviction per key. Returns false once the pool refuses work.
    async fn dispatch(&self, payload: &str) -> bool {
        let keys: Vec<String> = match serde_json::from_str(payload) {
            Ok(keys) => keys,
            Err(e) => {
                warn!(topic = %self.topic, error = %e, "Dropping malformed invalidation message");
                CacheMetrics::invalidation_dropped();
                return true;
            }
        };

        debug!(count = keys.len(), "Received invalidation");

        for key in keys {
            let target = Arc::clone(&self.target);
            let retry = self.retry;

            let submitted = self
                .pool
                .submit(async move {
                    retry.execute(|| target.evict(&key)).await.map_err(|e| {
                        warn!(key = %key, error = %e, "Local eviction failed after retries");
                        CacheMetrics::eviction_failed(&key);
                        e
                    })
                })
                .await;

            if let Err(e) = submitted {
                debug!(error = %e, "Eviction not queued, cleaner is stopping");
                return false;
            }
        }

        true
    }

    fn transition(&self, from: CleanerState, to: CleanerState) -> CacheResult<()> {
        let mut state = self.state.lock();
        match *state {
            current if current == from => {
                *state = to;
                Ok(())
            }
            CleanerState::Stopped => Err(CacheError::Closed("cleaner")),
            _ => Err(CacheError::AlreadyRunning("cleaner")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distributed::DistributedCacheExt;
    use crate::memory::InMemoryDistributedCache;
    use std::collections::HashMap;
    use std::time::Duration;
    use tokio::time::timeout;

    const TOPIC: &str = "saga:account:invalidation";

    fn cleaner_config() -> CleanerConfig {
        CleanerConfig {
            workers: 2,
            queue_capacity: 16,
            ..CleanerConfig::default()
        }
    }

    fn setup() -> (InMemoryDistributedCache, LocalCache, Arc<LocalCacheCleaner>) {
        let distributed = InMemoryDistributedCache::default();
        let local = LocalCache::new(1000, Duration::from_secs(60));
        let cleaner = Arc::new(LocalCacheCleaner::new(
            Arc::new(distributed.clone()),
            local.clone(),
            &cleaner_config(),
            TOPIC,
        ));
        (distributed, local, cleaner)
    }

    async fn wait_until(mut done: impl FnMut() -> bool) {
        timeout(Duration::from_secs(5), async {
            while !done() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }

    fn spawn_loop(cleaner: &Arc<LocalCacheCleaner>) -> tokio::task::JoinHandle<CacheResult<()>> {
        let cleaner = Arc::clone(cleaner);
        tokio::spawn(async move { cleaner.subscribe_invalidation_events().await })
    }

    #[tokio::test]
    async fn test_evicts_published_keys() {
        let (distributed, local, cleaner) = setup();
        local.set("cuspersonalinfo:1", &"ming").await.unwrap();
        local.set("cusshippinginfo:1", &"taipei").await.unwrap();
        local.set("cuscheck:1", &true).await.unwrap();

        let handle = spawn_loop(&cleaner);
        wait_until(|| cleaner.state() == CleanerState::Running).await;

        distributed
            .publish(TOPIC, &vec!["cuspersonalinfo:1", "cusshippinginfo:1"])
            .await
            .unwrap();

        wait_until(|| !local.contains("cuspersonalinfo:1") && !local.contains("cusshippinginfo:1")).await;
        assert!(local.contains("cuscheck:1"));

        cleaner.close().await;
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_malformed_message_does_not_stop_loop() {
        let (distributed, local, cleaner) = setup();
        local.set("cuscheck:7", &true).await.unwrap();

        let handle = spawn_loop(&cleaner);
        wait_until(|| cleaner.state() == CleanerState::Running).await;

        distributed.publish_raw(TOPIC, "not json".to_string()).await.unwrap();
        distributed.publish_raw(TOPIC, r#"{"keys":1}"#.to_string()).await.unwrap();
        distributed.publish(TOPIC, &vec!["cuscheck:7"]).await.unwrap();

        wait_until(|| !local.contains("cuscheck:7")).await;
        assert_eq!(cleaner.state(), CleanerState::Running);

        cleaner.close().await;
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_close_stops_loop_and_pool() {
        let (_distributed, _local, cleaner) = setup();
        let handle = spawn_loop(&cleaner);
        wait_until(|| cleaner.state() == CleanerState::Running).await;

        cleaner.close().await;
        timeout(Duration::from_secs(5), handle).await.unwrap().unwrap().unwrap();

        assert_eq!(cleaner.state(), CleanerState::Stopped);
        assert!(!cleaner.pool_stats().running);
    }

    #[tokio::test]
    async fn test_subscription_end_stops_cleaner() {
        let (distributed, _local, cleaner) = setup();
        let handle = spawn_loop(&cleaner);
        wait_until(|| cleaner.state() == CleanerState::Running).await;

        distributed.close_topic(TOPIC);
        timeout(Duration::from_secs(5), handle).await.unwrap().unwrap().unwrap();

        assert_eq!(cleaner.state(), CleanerState::Stopped);
    }

    #[tokio::test]
    async fn test_second_subscribe_is_rejected() {
        let (_distributed, _local, cleaner) = setup();
        let handle = spawn_loop(&cleaner);
        wait_until(|| cleaner.state() == CleanerState::Running).await;

        let err = cleaner.subscribe_invalidation_events().await.unwrap_err();
        assert!(matches!(err, CacheError::AlreadyRunning(_)));

        cleaner.close().await;
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_subscribe_after_close_is_rejected() {
        let (_distributed, _local, cleaner) = setup();
        assert_eq!(cleaner.state(), CleanerState::Idle);

        cleaner.close().await;
        let err = cleaner.subscribe_invalidation_events().await.unwrap_err();
        assert!(matches!(err, CacheError::Closed(_)));
    }

    /// Fails the first `failures` evictions of every key.
    #[derive(Default)]
    struct FlakyTarget {
        failures: usize,
        attempts: Mutex<HashMap<String, usize>>,
        evicted: Mutex<Vec<String>>,
    }

    impl FlakyTarget {
        fn failing(failures: usize) -> Arc<Self> {
            Arc::new(Self {
                failures,
                ..Self::default()
            })
        }

        fn attempts(&self, key: &str) -> usize {
            self.attempts.lock().get(key).copied().unwrap_or(0)
        }
    }

    #[async_trait]
    impl EvictionTarget for FlakyTarget {
        async fn evict(&self, key: &str) -> CacheResult<()> {
            let attempt = {
                let mut attempts = self.attempts.lock();
                let n = attempts.entry(key.to_string()).or_insert(0);
                *n += 1;
                *n
            };
            if attempt <= self.failures {
                return Err(CacheError::Closed("eviction target"));
            }
            self.evicted.lock().push(key.to_string());
            Ok(())
        }
    }

    fn flaky_cleaner(target: Arc<FlakyTarget>) -> (InMemoryDistributedCache, Arc<LocalCacheCleaner>) {
        let distributed = InMemoryDistributedCache::default();
        let cleaner = Arc::new(LocalCacheCleaner::with_target(
            Arc::new(distributed.clone()),
            target,
            &cleaner_config(),
            TOPIC,
        ));
        (distributed, cleaner)
    }

    #[tokio::test]
    async fn test_failed_eviction_is_retried() {
        let target = FlakyTarget::failing(2);
        let (distributed, cleaner) = flaky_cleaner(Arc::clone(&target));
        let handle = spawn_loop(&cleaner);
        wait_until(|| cleaner.state() == CleanerState::Running).await;

        distributed.publish(TOPIC, &vec!["cuscheck:1"]).await.unwrap();

        wait_until(|| !target.evicted.lock().is_empty()).await;
        assert_eq!(target.attempts("cuscheck:1"), 3);
        assert_eq!(cleaner.pool_stats().tasks_failed, 0);

        cleaner.close().await;
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_eviction_abandoned_after_three_attempts() {
        let target = FlakyTarget::failing(usize::MAX);
        let (distributed, cleaner) = flaky_cleaner(Arc::clone(&target));
        let handle = spawn_loop(&cleaner);
        wait_until(|| cleaner.state() == CleanerState::Running).await;

        distributed.publish(TOPIC, &vec!["cuscred:test@ming.com", "cuscheck:1"]).await.unwrap();

        wait_until(|| cleaner.pool_stats().tasks_failed == 2).await;
        assert_eq!(target.attempts("cuscred:test@ming.com"), 3);
        assert_eq!(target.attempts("cuscheck:1"), 3);
        assert!(target.evicted.lock().is_empty());

        // the loop keeps serving later messages
        assert_eq!(cleaner.state(), CleanerState::Running);

        cleaner.close().await;
        handle.await.unwrap().unwrap();
    }

    #[test]
    fn test_state_display() {
        assert_eq!(CleanerState::Running.to_string(), "running");
        assert_eq!(CleanerState::Stopped.to_string(), "stopped");
    }
}
