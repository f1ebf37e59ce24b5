//! Cache subsystem error types.

use saga_core::AccountError;
use thiserror::Error;

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Cache-related errors.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Redis error.
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Redis pool error.
    #[error("Redis pool error: {0}")]
    Pool(#[from] deadpool_redis::PoolError),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The fill mutex stayed held by someone else for every attempt.
    #[error("Failed to acquire lock {name} after {attempts} attempts")]
    LockNotAcquired { name: String, attempts: u32 },

    /// A pipelined command was rejected; earlier commands may have applied.
    #[error("Pipeline {op} failed for key {key}: {message}")]
    Pipeline {
        op: &'static str,
        key: String,
        message: String,
    },

    /// Task submitted to a pool that is not running.
    #[error("Worker pool is stopped")]
    PoolStopped,

    /// Non-blocking submit against a full queue.
    #[error("Worker pool queue is full")]
    QueueFull,

    /// Component started twice.
    #[error("{0} is already running")]
    AlreadyRunning(&'static str),

    /// Component was closed before or while being used.
    #[error("{0} is closed")]
    Closed(&'static str),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl From<CacheError> for AccountError {
    fn from(err: CacheError) -> Self {
        match err {
            CacheError::Configuration(msg) => AccountError::Configuration(msg),
            other => AccountError::Cache(other.to_string()),
        }
    }
}
