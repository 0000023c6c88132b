//! Error types for the taxonomy.

use thiserror::Error;

/// Result type for taxonomy validation.
pub type Result<T> = std::result::Result<T, ValidationError>;

/// Structural problems found in a forest. Any of these aborts a run before
/// anything is written.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The same identifier appears twice anywhere in the forest.
    #[error("duplicate identifier '{identifier}' at {path}")]
    DuplicateIdentifier { identifier: String, path: String },

    /// A subforum declares subforums of its own.
    #[error("nesting too deep at {path}: forums allow one level of subforums")]
    NestingTooDeep { path: String },

    /// Identifier is empty or not a lowercase slug.
    #[error("invalid identifier '{identifier}' at {path}")]
    InvalidIdentifier { identifier: String, path: String },

    /// A rule override holds a value no forum can use.
    #[error("invalid rule '{field}' at {path}")]
    InvalidRule { field: &'static str, path: String },
}

impl ValidationError {
    /// Rendered path of the offending node.
    pub fn path(&self) -> &str {
        match self {
            Self::DuplicateIdentifier { path, .. }
            | Self::NestingTooDeep { path }
            | Self::InvalidIdentifier { path, .. }
            | Self::InvalidRule { path, .. } => path,
        }
    }
}
