//! # Error Types
//!
//! Custom error types for NavSat Bridge using `thiserror`.

use thiserror::Error;

/// Main error type for NavSat Bridge
#[derive(Debug, Error)]
pub enum NavsatBridgeError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// Wire message encoding errors
    #[error("Encoding error: {0}")]
    Encode(#[from] serde_json::Error),

    /// Transport-level errors (DNS, refusal, timeout, abrupt close)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Resource errors (wake lock, permissions) -- never retried
    #[error("Resource error: {0}")]
    Resource(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for NavSat Bridge
pub type Result<T> = std::result::Result<T, NavsatBridgeError>;
