//! Error types for factlens.

use thiserror::Error;

/// Result type alias using factlens's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for factlens operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Admission refused: the concurrency ceiling is saturated
    #[error("Capacity exceeded: {active} of {ceiling} job slots in use")]
    Capacity { active: usize, ceiling: usize },

    /// Input rejected before any media was downloaded (e.g. video too long)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Download or extraction failed
    #[error("Acquisition error: {0}")]
    Acquisition(String),

    /// Analysis call failed or returned unusable output
    #[error("Analysis error: {0}")]
    Analysis(String),

    /// Result store write/read failed
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// HTTP/network request failed
    #[error("Request error: {0}")]
    Request(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Request(e.to_string())
    }
}
