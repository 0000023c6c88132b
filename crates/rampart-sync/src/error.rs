//! Error types for reconciliation runs.

use rampart_store::StoreError;
use rampart_taxonomy::ValidationError;
use thiserror::Error;

/// Result type for sync and audit runs.
pub type Result<T> = std::result::Result<T, SyncError>;

/// Errors that abort a run. None of them leave partial writes behind.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The forest failed structural validation
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// A node's parent has no row id in this run
    #[error("Parent '{parent_slug}' of '{slug}' has not been written")]
    OrphanParent { slug: String, parent_slug: String },

    /// Store or transaction failure
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The run was cancelled before commit
    #[error("Run cancelled, transaction rolled back")]
    Cancelled,

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// The taxonomy file could not be read or parsed
    #[error("Failed to load taxonomy from {path}: {reason}")]
    Load { path: String, reason: String },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The blocking worker running the engine failed
    #[error("Worker error: {0}")]
    Worker(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SyncError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Validation(_) => 2,
            Self::OrphanParent { .. } | Self::Store(_) => 3,
            Self::Cancelled => 4,
            _ => 1,
        }
    }
}
