//! Error types for inbox-core

use thiserror::Error;

/// Main error type for inbox-core
#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Send failed: {0}")]
    Send(String),

    /// A unique constraint rejected the write (the row already exists)
    #[error("Already exists: {0}")]
    Duplicate(String),

    /// The collaborator does not implement an optional operation
    #[error("Capability not supported by this repository: {0}")]
    CapabilityMissing(&'static str),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Tenant resolution failed: {0}")]
    Tenant(String),

    #[error("Notification failed: {0}")]
    Notification(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Returns true when the error reports an already existing row
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Error::Duplicate(_))
    }
}

/// Result type alias for inbox-core
pub type Result<T> = std::result::Result<T, Error>;
