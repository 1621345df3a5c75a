//! Storage-specific error types.
//!
//! Reading an id that was never flushed is not an error; every storage
//! returns an empty result for it.

use thiserror::Error;

/// Errors that can occur in the storage layer.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Filesystem access failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Database operation failed (duckdb error).
    #[error("database error: {0}")]
    Database(#[from] duckdb::Error),

    /// Invalid data in the durable medium (e.g., unknown record kind).
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Internal error (e.g., storage directory cannot be created).
    #[error("internal error: {0}")]
    Internal(String),
}
