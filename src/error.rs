//! Error types for slidegate.

use thiserror::Error;

/// Main error type for slidegate operations.
///
/// Only construction and configuration loading can fail. Limiter
/// operations themselves are total over every key.
#[derive(Error, Debug)]
pub enum SlidegateError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// The window size is zero, negative, or not a finite number of seconds
    #[error("Invalid window size: {0}")]
    InvalidWindow(String),

    /// A limiter must admit at least one event per window
    #[error("Invalid max requests: must be greater than zero")]
    InvalidMaxRequests,

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for slidegate operations.
pub type Result<T> = std::result::Result<T, SlidegateError>;
