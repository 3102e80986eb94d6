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
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required configuration missing: {0}")]
    MissingRequired(&'static str),

    #[error("Invalid request timeout")]
    InvalidTimeout,

    #[error("Invalid auth API URL format")]
    InvalidApiUrl,

    #[error("Auth API must use HTTPS in production")]
    ApiMustBeHttps,

    #[error("Invalid live host")]
    InvalidLiveHost,

    #[error("Live channel must use wss in production")]
    LiveMustBeSecure,

    #[error("Keepalive interval must be between 1 and 300 seconds")]
    InvalidKeepalive,

    #[error("Invalid reconnect policy: {0}")]
    InvalidReconnect(&'static str),
}
