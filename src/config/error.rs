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
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Required configuration missing: {0}")]
    MissingRequired(&'static str),

    #[error("Invalid database URL format")]
    InvalidDatabaseUrl,

    #[error("Pool min_connections exceeds max_connections")]
    InvalidPoolSize,

    #[error("Broker auto.offset.reset must be 'earliest' or 'latest'")]
    InvalidOffsetReset,

    #[error("Relay batch size must be positive")]
    InvalidBatchSize,

    #[error("Back-off ceiling must not be below the initial back-off")]
    InvalidBackoff,

    #[error("Consumer in-flight budget must be positive")]
    InvalidInFlightBudget,

    #[error("Timeout must be positive: {0}")]
    InvalidTimeout(&'static str),

    #[error("Step backend endpoint must be an http(s) URL: {0}")]
    InvalidEndpoint(&'static str),

    #[error("Embeddings overlap must be smaller than chunk size")]
    InvalidChunking,
}
