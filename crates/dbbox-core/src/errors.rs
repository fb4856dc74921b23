//! Cross-cutting error types for dbbox.
//!
//! Database errors (`DatabaseError`) live in `dbbox-db` and configuration
//! errors (`ConfigError`) in `dbbox-config`. Both wrap `CoreError` where a
//! value or identifier check fails.

use thiserror::Error;

/// Errors that can be raised by any dbbox crate.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A table or column name failed validation.
    #[error("Invalid identifier '{name}': {reason}")]
    InvalidIdentifier { name: String, reason: String },

    /// A non-optional value was requested from a NULL column.
    #[error("Column '{column}' is NULL")]
    UnexpectedNull { column: String },

    /// A column value could not be converted to the requested type.
    #[error("Column '{column}' holds {found}, expected {expected}")]
    TypeMismatch {
        column: String,
        expected: String,
        found: String,
    },

    /// Data failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Catch-all for unexpected errors.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
