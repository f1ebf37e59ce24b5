//! # Saga Cache
//!
//! Two-tier cache for the Saga account service.
//!
//! - [`LocalCache`]: per-process, TTL-bounded.
//! - [`DistributedCache`]: shared by every replica, backed by Redis or by
//!   [`InMemoryDistributedCache`] in single-node deployments.
//! - [`LocalCacheCleaner`]: evicts local entries announced on the
//!   invalidation topic, through a [`WorkerPool`].

pub mod cleaner;
pub mod distributed;
pub mod error;
pub mod local;
pub mod memory;
pub mod metrics;
pub mod redis_cache;
pub mod worker;

pub use cleaner::{CleanerState, EvictionTarget, LocalCacheCleaner};
pub use distributed::{
    DistributedCache, DistributedCacheExt, DistributedMutex, MessageStream, MutexOptions, PipelineOp, TtlPolicy,
};
pub use error::{CacheError, CacheResult};
pub use local::LocalCache;
pub use memory::InMemoryDistributedCache;
pub use metrics::CacheMetrics;
pub use redis_cache::{create_pool, RedisCache, RedisConnection, RedisMutex, RedisPool};
pub use worker::{WorkerPool, WorkerPoolConfig, WorkerPoolStats};
