//! Unified error type surfaced by the account service.

use std::fmt::Debug;
use thiserror::Error;

/// Error type for every layer of the account service.
///
/// The cache subsystem keeps its own error type and converts into this one
/// at the proxy boundary, so callers only ever match on `AccountError`.
#[derive(Error, Debug)]
pub enum AccountError {
    // ============ Domain Errors ============
    /// The requested record does not exist in the backing store.
    #[error("Resource not found: {resource_type} with id {id}")]
    NotFound {
        resource_type: &'static str,
        id: String,
    },

    /// Input rejected before reaching the store
    #[error("Validation error: {0}")]
    Validation(String),

    /// Duplicate entry on create
    #[error("Conflict: {0}")]
    Conflict(String),

    // ============ Infrastructure Errors ============
    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// Redis/Cache error
    #[error("Cache error: {0}")]
    Cache(String),

    /// The store write committed but the cache invalidation that follows it
    /// did not complete. Stale reads are possible until the TTL elapses.
    #[error("Invalidation failed for keys {keys:?} after committed write: {message}")]
    InvalidationFailed { keys: Vec<String>, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    // ============ Internal Errors ============
    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// Generic error wrapper
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AccountError {
    /// Returns a machine-readable error code.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Conflict(_) => "CONFLICT",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Cache(_) => "CACHE_ERROR",
            Self::InvalidationFailed { .. } => "INVALIDATION_FAILED",
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::Internal(_) | Self::Other(_) => "INTERNAL_ERROR",
        }
    }

    /// Creates a not found error for a resource.
    #[must_use]
    pub fn not_found<T: ToString>(resource_type: &'static str, id: T) -> Self {
        Self::NotFound {
            resource_type,
            id: id.to_string(),
        }
    }

    /// Creates a validation error.
    #[must_use]
    pub fn validation<T: Into<String>>(message: T) -> Self {
        Self::Validation(message.into())
    }

    /// Creates a conflict error.
    #[must_use]
    pub fn conflict<T: Into<String>>(message: T) -> Self {
        Self::Conflict(message.into())
    }

    /// Creates an invalidation failure for the given keys.
    #[must_use]
    pub fn invalidation_failed<T: ToString>(keys: &[String], cause: T) -> Self {
        Self::InvalidationFailed {
            keys: keys.to_vec(),
            message: cause.to_string(),
        }
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal<T: Into<String>>(message: T) -> Self {
        Self::Internal(message.into())
    }

    /// Returns true for the "record does not exist" outcome.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Checks if this error is retriable.
    ///
    /// A failed invalidation is not: the write already landed and repeating
    /// it would apply the mutation twice.
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        matches!(self, Self::Database(_) | Self::Cache(_))
    }

    /// True when the underlying store write committed despite the error.
    #[must_use]
    pub const fn is_write_committed(&self) -> bool {
        matches!(self, Self::InvalidationFailed { .. })
    }
}

#[cfg(feature = "sqlx")]
impl From<sqlx::Error> for AccountError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => Self::NotFound {
                resource_type: "database_row",
                id: "unknown".to_string(),
            },
            sqlx::Error::Database(db_err) => {
                // ER_DUP_ENTRY (1062) on MySQL
                if db_err.is_unique_violation() {
                    return Self::Conflict(db_err.message().to_string());
                }
                Self::Database(err.to_string())
            }
            _ => Self::Database(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for AccountError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(format!("JSON serialization error: {}", err))
    }
}
