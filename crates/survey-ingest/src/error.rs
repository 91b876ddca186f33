//! Error types for the survey log and intake pipeline.

use thiserror::Error;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Storage-level errors. Any of these fails the request that hit it.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error on the log file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Record serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}
