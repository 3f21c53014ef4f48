//! Error types for the persistence gateway and sessions.

use candymap_core::ErrorKind;
use std::time::Duration;
use thiserror::Error;

/// Result type for gateway operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while loading or saving game state.
#[derive(Debug, Error)]
pub enum Error {
    /// Domain rule rejected the operation
    #[error(transparent)]
    Domain(#[from] candymap_core::Error),

    /// Local store error
    #[error("Storage error: {0}")]
    Storage(String),

    /// A stored value failed schema validation
    #[error("store {store} is corrupt: {reason}")]
    Corrupt { store: String, reason: String },

    /// Network error talking to the shared store
    #[error("Network error: {0}")]
    Http(String),

    /// The shared store did not answer in time
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The shared store answered with an error status
    #[error("server returned {status}: {message}")]
    Status { status: u16, message: String },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Domain(e) => e.kind(),
            Error::Status { status: 400, .. } | Error::Config(_) => ErrorKind::Validation,
            Error::Status { status: 409, .. } => ErrorKind::Conflict,
            _ => ErrorKind::Persistence,
        }
    }

    /// Whether retrying the same operation later may succeed.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Persistence
    }
}

impl From<rocksdb::Error> for Error {
    fn from(e: rocksdb::Error) -> Self {
        Error::Storage(e.to_string())
    }
}
