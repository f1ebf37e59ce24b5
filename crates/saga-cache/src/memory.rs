//! In-process stand-in for the distributed tier.
//!
//! Used when Redis is disabled (single-node deployments) and by tests that
//! need several "replicas" sharing one tier. Clones share all state, so two
//! clones behave like two connections to the same server.

use crate::distributed::{DistributedCache, DistributedMutex, MessageStream, MutexOptions, PipelineOp, TtlPolicy};
use crate::error::{CacheError, CacheResult};
use async_trait::async_trait;
use futures::StreamExt;
use moka::future::Cache;
use moka::Expiry;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tracing::{debug, warn};
use uuid::Uuid;

const TOPIC_CAPACITY: usize = 1024;
/// Upper bound on stored entries; beyond it moka evicts the least used.
const MAX_ENTRIES: u64 = 1_000_000;

#[derive(Clone)]
struct Entry {
    value: String,
    ttl: Duration,
}

/// Expires each entry after the TTL it was written with.
struct EntryTtl;

impl Expiry<String, Entry> for EntryTtl {
    fn expire_after_create(&self, _key: &String, entry: &Entry, _created_at: Instant) -> Option<Duration> {
        Some(entry.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        entry: &Entry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(entry.ttl)
    }
}

struct Lease {
    token: String,
    expires_at: Instant,
}

struct State {
    entries: Cache<String, Entry>,
    leases: Mutex<HashMap<String, Lease>>,
    topics: Mutex<HashMap<String, broadcast::Sender<String>>>,
}

impl State {
    fn new() -> Self {
        Self {
            entries: Cache::builder()
                .max_capacity(MAX_ENTRIES)
                .expire_after(EntryTtl)
                .build(),
            leases: Mutex::default(),
            topics: Mutex::default(),
        }
    }
}

/// Distributed tier held in memory.
#[derive(Clone)]
pub struct InMemoryDistributedCache {
    state: Arc<State>,
    ttl: TtlPolicy,
    mutex_options: MutexOptions,
}

impl InMemoryDistributedCache {
    #[must_use]
    pub fn new(ttl: TtlPolicy, mutex_options: MutexOptions) -> Self {
        Self {
            state: Arc::new(State::new()),
            ttl,
            mutex_options,
        }
    }

    /// Returns true if `key` holds a live entry.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.state.entries.contains_key(key)
    }

    /// Number of stored entries once expired ones have been purged.
    pub async fn entry_count(&self) -> u64 {
        self.state.entries.run_pending_tasks().await;
        self.state.entries.entry_count()
    }

    /// Drops the topic's channel, ending every open subscription to it.
    pub fn close_topic(&self, topic: &str) {
        self.state.topics.lock().remove(topic);
    }

    fn sender(&self, topic: &str) -> broadcast::Sender<String> {
        self.state
            .topics
            .lock()
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(TOPIC_CAPACITY).0)
            .clone()
    }

    async fn store(&self, key: &str, value: String) {
        let ttl = Duration::from_secs(self.ttl.next_ttl_secs());
        self.state.entries.insert(key.to_string(), Entry { value, ttl }).await;
    }
}

impl Default for InMemoryDistributedCache {
    fn default() -> Self {
        Self::new(
            TtlPolicy::new(Duration::from_secs(60), Duration::from_secs(10)),
            MutexOptions::default(),
        )
    }
}

#[async_trait]
impl DistributedCache for InMemoryDistributedCache {
    async fn get_raw(&self, key: &str) -> CacheResult<Option<String>> {
        Ok(self.state.entries.get(key).await.map(|entry| entry.value))
    }

    async fn set_raw(&self, key: &str, value: String) -> CacheResult<()> {
        self.store(key, value).await;
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        self.state.entries.invalidate(key).await;
        Ok(())
    }

    async fn exec_pipeline(&self, ops: Vec<PipelineOp>) -> CacheResult<()> {
        for op in ops {
            match op {
                PipelineOp::Set { key, value } => self.store(&key, value).await,
                PipelineOp::Delete { key } => self.state.entries.invalidate(&key).await,
            }
        }
        Ok(())
    }

    fn mutex(&self, name: &str) -> Box<dyn DistributedMutex> {
        Box::new(InMemoryMutex {
            state: Arc::clone(&self.state),
            name: name.to_string(),
            token: Uuid::new_v4().to_string(),
            options: self.mutex_options,
        })
    }

    async fn publish_raw(&self, topic: &str, payload: String) -> CacheResult<()> {
        // No subscribers is not an error, same as Redis PUBLISH.
        let receivers = self.sender(topic).send(payload).unwrap_or(0);
        debug!(topic = %topic, receivers, "Published message");
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> CacheResult<MessageStream> {
        let rx = self.sender(topic).subscribe();
        let topic = topic.to_string();

        let stream = futures::stream::unfold((rx, topic), |(mut rx, topic)| async move {
            loop {
                match rx.recv().await {
                    Ok(message) => return Some((message, (rx, topic))),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(topic = %topic, skipped, "Subscriber lagged, messages dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        })
        .boxed();

        Ok(stream)
    }
}

/// Lease lock over the shared in-memory state.
pub struct InMemoryMutex {
    state: Arc<State>,
    name: String,
    token: String,
    options: MutexOptions,
}

impl InMemoryMutex {
    fn try_acquire(&self) -> bool {
        let now = Instant::now();
        let mut leases = self.state.leases.lock();
        if leases.get(&self.name).is_some_and(|l| l.expires_at > now) {
            return false;
        }
        leases.insert(
            self.name.clone(),
            Lease {
                token: self.token.clone(),
                expires_at: now + self.options.lease,
            },
        );
        true
    }
}

#[async_trait]
impl DistributedMutex for InMemoryMutex {
    fn name(&self) -> &str {
        &self.name
    }

    async fn lock(&self) -> CacheResult<()> {
        let tries = self.options.tries.max(1);
        for attempt in 1..=tries {
            if self.try_acquire() {
                debug!(lock = %self.name, attempt, "Acquired in-memory lock");
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
        let now = Instant::now();
        let mut leases = self.state.leases.lock();
        let (held, expired) = match leases.get(&self.name) {
            Some(lease) => (lease.token == self.token && lease.expires_at > now, lease.expires_at <= now),
            None => (false, false),
        };
        if held || expired {
            leases.remove(&self.name);
        }
        Ok(held)
    }
}
