//! Cache metrics.
//!
//! Counters are labelled with the key namespace (the part of the key
//! before the first `:`), which keeps label cardinality bounded.

use metrics::{counter, describe_counter, describe_gauge, gauge};

/// Metric names for the cache subsystem.
pub mod names {
    /// Reads answered by the in-process tier.
    pub const LOCAL_HITS_TOTAL: &str = "saga_cache_local_hits_total";
    /// Reads answered by the distributed tier.
    pub const DISTRIBUTED_HITS_TOTAL: &str = "saga_cache_distributed_hits_total";
    /// Reads that went to the backing store.
    pub const STORE_LOADS_TOTAL: &str = "saga_cache_store_loads_total";
    /// Invalidation broadcasts published.
    pub const INVALIDATIONS_PUBLISHED_TOTAL: &str = "saga_cache_invalidations_published_total";
    /// Invalidation messages dropped because they did not decode.
    pub const INVALIDATIONS_DROPPED_TOTAL: &str = "saga_cache_invalidations_dropped_total";
    /// Local evictions that failed after every retry.
    pub const EVICTIONS_FAILED_TOTAL: &str = "saga_cache_evictions_failed_total";

    /// Worker tasks completed.
    pub const WORKER_TASKS_COMPLETED_TOTAL: &str = "saga_cache_worker_tasks_completed_total";
    /// Worker tasks that returned an error.
    pub const WORKER_TASKS_FAILED_TOTAL: &str = "saga_cache_worker_tasks_failed_total";
    /// Configured workers.
    pub const WORKERS: &str = "saga_cache_workers";
}

/// Register all metric descriptions.
pub fn register_metrics() {
    describe_counter!(names::LOCAL_HITS_TOTAL, "Reads answered by the local cache");
    describe_counter!(names::DISTRIBUTED_HITS_TOTAL, "Reads answered by the distributed cache");
    describe_counter!(names::STORE_LOADS_TOTAL, "Reads that fell through to the backing store");
    describe_counter!(
        names::INVALIDATIONS_PUBLISHED_TOTAL,
        "Invalidation broadcasts published after writes"
    );
    describe_counter!(
        names::INVALIDATIONS_DROPPED_TOTAL,
        "Malformed invalidation messages dropped by the cleaner"
    );
    describe_counter!(
        names::EVICTIONS_FAILED_TOTAL,
        "Local evictions that failed after all retries"
    );
    describe_counter!(names::WORKER_TASKS_COMPLETED_TOTAL, "Worker pool tasks completed");
    describe_counter!(names::WORKER_TASKS_FAILED_TOTAL, "Worker pool tasks that failed");
    describe_gauge!(names::WORKERS, "Configured eviction workers");
}

/// Returns the namespace label for a cache key.
#[must_use]
pub fn namespace(key: &str) -> &str {
    key.split_once(':').map_or(key, |(ns, _)| ns)
}

/// Cache metrics recorder.
#[derive(Clone)]
pub struct CacheMetrics;

impl CacheMetrics {
    pub fn local_hit(key: &str) {
        counter!(names::LOCAL_HITS_TOTAL, "namespace" => namespace(key).to_string()).increment(1);
    }

    pub fn distributed_hit(key: &str) {
        counter!(names::DISTRIBUTED_HITS_TOTAL, "namespace" => namespace(key).to_string()).increment(1);
    }

    pub fn store_load(key: &str) {
        counter!(names::STORE_LOADS_TOTAL, "namespace" => namespace(key).to_string()).increment(1);
    }

    pub fn invalidation_published() {
        counter!(names::INVALIDATIONS_PUBLISHED_TOTAL).increment(1);
    }

    pub fn invalidation_dropped() {
        counter!(names::INVALIDATIONS_DROPPED_TOTAL).increment(1);
    }

    pub fn eviction_failed(key: &str) {
        counter!(names::EVICTIONS_FAILED_TOTAL, "namespace" => namespace(key).to_string()).increment(1);
    }

    pub fn task_completed(pool_id: &str) {
        counter!(names::WORKER_TASKS_COMPLETED_TOTAL, "pool_id" => pool_id.to_string()).increment(1);
    }

    pub fn task_failed(pool_id: &str) {
        counter!(names::WORKER_TASKS_FAILED_TOTAL, "pool_id" => pool_id.to_string()).increment(1);
    }

    #[allow(clippy::cast_precision_loss)]
    pub fn workers(pool_id: &str, workers: usize) {
        gauge!(names::WORKERS, "pool_id" => pool_id.to_string()).set(workers as f64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespace() {
        assert_eq!(namespace("cuspersonalinfo:1"), "cuspersonalinfo");
        assert_eq!(namespace("cuscred:a:b@c.com"), "cuscred");
        assert_eq!(namespace("plain"), "plain");
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        register_metrics();
        CacheMetrics::local_hit("cuscheck:1");
        CacheMetrics::invalidation_published();
        CacheMetrics::workers("pool", 4);
    }
}
