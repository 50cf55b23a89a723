//! Error types for Formgate.

use thiserror::Error;

/// Main error type for Formgate operations.
///
/// Rate limit decisions are never errors; a rejected request is a normal
/// [`RateLimitResult`](crate::ratelimit::RateLimitResult). These variants only
/// come out of configuration loading and the operator binary.
#[derive(Error, Debug)]
pub enum FormgateError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Layered configuration source errors
    #[error("Configuration source error: {0}")]
    Source(#[from] ::config::ConfigError),

    /// JSON output errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Formgate operations.
pub type Result<T> = std::result::Result<T, FormgateError>;
