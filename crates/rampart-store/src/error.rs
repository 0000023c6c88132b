//! Error types for the store.

use std::time::Duration;
use thiserror::Error;

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors raised by a store backend. All of them are fatal for the current
/// transaction, which is rolled back.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Backend or transport failure
    #[error("Storage error: {0}")]
    Backend(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The transaction outlived its time budget
    #[error("Transaction timed out after {0:?}")]
    Timeout(Duration),

    /// Referenced row or content does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Persisted data violates an index invariant
    #[error("Corrupt store: {0}")]
    Corrupt(String),

    /// Store was opened for snapshots only
    #[error("Store is open read-only")]
    ReadOnly,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rocksdb::Error> for StoreError {
    fn from(e: rocksdb::Error) -> Self {
        StoreError::Backend(e.to_string())
    }
}
