//! Error types for Candymap domain operations.

use crate::category::Category;
use thiserror::Error;

/// Result type for Candymap domain operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Broad classification of an [`Error`], used by callers to pick a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A required field was missing or malformed. Nothing changed.
    Validation,
    /// The operation conflicts with existing state (duplicate vote).
    Conflict,
    /// Stored data could not be read or written.
    Persistence,
}

/// Errors that can occur in Candymap domain operations.
#[derive(Debug, Error)]
pub enum Error {
    /// User name was empty or whitespace
    #[error("user name must not be empty")]
    EmptyUser,

    /// House id is not part of the catalog
    #[error("unknown house: {0}")]
    UnknownHouse(String),

    /// Category label is not one of the fixed categories
    #[error("unknown category: {0}")]
    UnknownCategory(String),

    /// The user already voted for this house and category
    #[error("{user} already voted for {house} in category {category}")]
    AlreadyVoted {
        user: String,
        house: String,
        category: Category,
    },

    /// A stored vote record broke the count/voters invariant
    #[error("invalid vote record: {0}")]
    InvalidRecord(String),

    /// The catalog document could not be built
    #[error("catalog error: {0}")]
    Catalog(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::EmptyUser | Error::UnknownHouse(_) | Error::UnknownCategory(_) => {
                ErrorKind::Validation
            }
            Error::AlreadyVoted { .. } => ErrorKind::Conflict,
            Error::InvalidRecord(_) | Error::Catalog(_) | Error::Serialization(_) => {
                ErrorKind::Persistence
            }
        }
    }
}

/// Reject empty or whitespace-only user names.
pub fn require_user(user: &str) -> Result<()> {
    if user.trim().is_empty() {
        return Err(Error::EmptyUser);
    }
    Ok(())
}
