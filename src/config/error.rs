//! Configuration error types

use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// Errors that can occur during configuration validation
#[derive(Debug, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Required configuration missing: {0}")]
    MissingRequired(&'static str),

    #[error("Invalid listen address")]
    InvalidAddress,

    #[error("Invalid port number")]
    InvalidPort,

    #[error("Invalid request timeout")]
    InvalidTimeout,

    #[error("Invalid database URL format")]
    InvalidDatabaseUrl,

    #[error("Invalid Redis URL format")]
    InvalidRedisUrl,

    #[error("Pool max_connections must be between 1 and 100")]
    InvalidPoolSize,

    #[error("Connection acquire timeout exceeds the store timeout")]
    AcquireTimeoutExceedsStoreTimeout,

    #[error("Request timeout must exceed the store timeout")]
    RequestTimeoutBelowStoreTimeout,

    #[error("Webhook signing secret is blank")]
    BlankSigningSecret,

    #[error("Store timeout must be between 1 and 60000 ms")]
    InvalidStoreTimeout,

    #[error("Claim lease must be between 1 and 86400 seconds")]
    InvalidClaimLease,

    #[error("Invalid rate limit: {0}")]
    InvalidRateLimit(String),
}
