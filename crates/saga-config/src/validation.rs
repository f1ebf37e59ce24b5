//! Configuration validation module.
//!
//! Fails fast on invalid configuration rather than at the first cache miss.

use crate::AppConfig;
use std::fmt;
use url::Url;

/// Configuration validation error variants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigValidationError {
    /// Pool size configuration is invalid (min must be <= max).
    InvalidPoolSize { min: u32, max: u32 },
    /// Pool size exceeds maximum allowed.
    PoolSizeTooLarge { value: u32, maximum: u32 },
    /// A count that must be at least one is zero.
    ZeroValue { name: String },
    /// URL format is invalid.
    InvalidUrl { url_type: String, message: String },
    /// Timeout value must be positive.
    NonPositiveTimeout { name: String, value: u64 },
    /// Lower bound above upper bound.
    InvalidRange { name: String, min: u64, max: u64 },
    /// Log level is invalid.
    InvalidLogLevel { value: String },
    /// Invalidation topic cannot be empty.
    EmptyInvalidationTopic,
}

impl fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidPoolSize { min, max } => {
                write!(
                    f,
                    "Invalid pool size: min ({}) cannot be greater than max ({})",
                    min, max
                )
            }
            Self::PoolSizeTooLarge { value, maximum } => {
                write!(f, "Pool size {} exceeds maximum allowed ({})", value, maximum)
            }
            Self::ZeroValue { name } => write!(f, "'{}' must be at least 1", name),
            Self::InvalidUrl { url_type, message } => {
                write!(f, "Invalid {} URL: {}", url_type, message)
            }
            Self::NonPositiveTimeout { name, value } => {
                write!(f, "Timeout '{}' must be positive, got {}", name, value)
            }
            Self::InvalidRange { name, min, max } => {
                write!(f, "Invalid range for '{}': min ({}) > max ({})", name, min, max)
            }
            Self::InvalidLogLevel { value } => {
                write!(
                    f,
                    "Invalid log level: '{}' (valid: trace, debug, info, warn, error)",
                    value
                )
            }
            Self::EmptyInvalidationTopic => write!(f, "Invalidation topic cannot be empty"),
        }
    }
}

impl std::error::Error for ConfigValidationError {}

/// Configuration validator.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Maximum connection pool size.
    const MAX_POOL_SIZE: u32 = 1000;
    /// Valid log levels.
    const VALID_LOG_LEVELS: &'static [&'static str] = &["trace", "debug", "info", "warn", "error"];

    /// Validates the entire application configuration.
    ///
    /// Returns Ok(()) if valid, or Err with all validation errors found.
    pub fn validate(config: &AppConfig) -> Result<(), Vec<ConfigValidationError>> {
        let mut errors = Vec::new();

        Self::validate_database(&config.database, &mut errors);
        Self::validate_redis(&config.redis, &mut errors);
        Self::validate_local_cache(&config.local_cache, &mut errors);
        Self::validate_cleaner(&config.cleaner, &mut errors);
        Self::validate_observability(&config.observability, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    fn validate_database(config: &crate::DatabaseConfig, errors: &mut Vec<ConfigValidationError>) {
        if config.url.is_empty() {
            errors.push(ConfigValidationError::InvalidUrl {
                url_type: "database".to_string(),
                message: "URL cannot be empty".to_string(),
            });
        } else if !config.url.starts_with("mysql://") {
            errors.push(ConfigValidationError::InvalidUrl {
                url_type: "database".to_string(),
                message: "URL must start with mysql://".to_string(),
            });
        }

        if config.min_connections > config.max_connections {
            errors.push(ConfigValidationError::InvalidPoolSize {
                min: config.min_connections,
                max: config.max_connections,
            });
        }
        if config.max_connections > Self::MAX_POOL_SIZE {
            errors.push(ConfigValidationError::PoolSizeTooLarge {
                value: config.max_connections,
                maximum: Self::MAX_POOL_SIZE,
            });
        }

        if config.connect_timeout_secs == 0 {
            errors.push(ConfigValidationError::NonPositiveTimeout {
                name: "database.connect_timeout_secs".to_string(),
                value: 0,
            });
        }
    }

    fn validate_redis(config: &crate::RedisConfig, errors: &mut Vec<ConfigValidationError>) {
        if config.invalidation_topic.trim().is_empty() {
            errors.push(ConfigValidationError::EmptyInvalidationTopic);
        }
        if config.mutex_lease_ms == 0 {
            errors.push(ConfigValidationError::NonPositiveTimeout {
                name: "redis.mutex_lease_ms".to_string(),
                value: 0,
            });
        }
        if config.mutex_tries == 0 {
            errors.push(ConfigValidationError::ZeroValue {
                name: "redis.mutex_tries".to_string(),
            });
        }
        if config.mutex_retry_min_ms > config.mutex_retry_max_ms {
            errors.push(ConfigValidationError::InvalidRange {
                name: "redis.mutex_retry_ms".to_string(),
                min: config.mutex_retry_min_ms,
                max: config.mutex_retry_max_ms,
            });
        }
        if config.expiration_secs == 0 {
            errors.push(ConfigValidationError::NonPositiveTimeout {
                name: "redis.expiration_secs".to_string(),
                value: 0,
            });
        }

        // The remaining checks only matter when talking to a real server.
        if !config.enabled {
            return;
        }

        if config.cluster_mode() {
            for url in &config.cluster_urls {
                Self::validate_redis_url(url, "redis cluster node", errors);
            }
        } else {
            Self::validate_redis_url(&config.url, "redis", errors);
        }

        if config.pool_size == 0 {
            errors.push(ConfigValidationError::ZeroValue {
                name: "redis.pool_size".to_string(),
            });
        }
        if config.pool_size > Self::MAX_POOL_SIZE {
            errors.push(ConfigValidationError::PoolSizeTooLarge {
                value: config.pool_size,
                maximum: Self::MAX_POOL_SIZE,
            });
        }
    }

    fn validate_redis_url(url: &str, url_type: &str, errors: &mut Vec<ConfigValidationError>) {
        match Url::parse(url) {
            Ok(url) if url.scheme() == "redis" || url.scheme() == "rediss" => {}
            Ok(_) => errors.push(ConfigValidationError::InvalidUrl {
                url_type: url_type.to_string(),
                message: "URL must start with redis:// or rediss://".to_string(),
            }),
            Err(e) => errors.push(ConfigValidationError::InvalidUrl {
                url_type: url_type.to_string(),
                message: e.to_string(),
            }),
        }
    }

    fn validate_local_cache(config: &crate::LocalCacheConfig, errors: &mut Vec<ConfigValidationError>) {
        if config.expiration_secs == 0 {
            errors.push(ConfigValidationError::NonPositiveTimeout {
                name: "local_cache.expiration_secs".to_string(),
                value: 0,
            });
        }
        if config.max_capacity == 0 {
            errors.push(ConfigValidationError::ZeroValue {
                name: "local_cache.max_capacity".to_string(),
            });
        }
    }

    fn validate_cleaner(config: &crate::CleanerConfig, errors: &mut Vec<ConfigValidationError>) {
        for (name, value) in [
            ("cleaner.workers", config.workers),
            ("cleaner.queue_capacity", config.queue_capacity),
        ] {
            if value == 0 {
                errors.push(ConfigValidationError::ZeroValue { name: name.to_string() });
            }
        }
        if config.evict_attempts == 0 {
            errors.push(ConfigValidationError::ZeroValue {
                name: "cleaner.evict_attempts".to_string(),
            });
        }
    }

    fn validate_observability(config: &crate::ObservabilityConfig, errors: &mut Vec<ConfigValidationError>) {
        let level = config.log_level.to_lowercase();
        if !Self::VALID_LOG_LEVELS.contains(&level.as_str()) {
            errors.push(ConfigValidationError::InvalidLogLevel {
                value: config.log_level.clone(),
            });
        }
    }
}
