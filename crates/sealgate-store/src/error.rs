//! Error types for the store module.

use thiserror::Error;

/// Errors that can occur during blob store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Unknown handle, or the blob outlived its retention horizon.
    #[error("blob not found: {0}")]
    NotFound(String),

    /// The write was rejected.
    #[error("write rejected: {0}")]
    WriteRejected(String),

    /// Invalid data in storage.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// Blocking task or lock failure.
    #[error("storage backend failure: {0}")]
    Backend(String),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
