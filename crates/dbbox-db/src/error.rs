//! Database error types for dbbox-db.

use std::time::Duration;

use dbbox_config::ConfigError;
use dbbox_core::CoreError;
use thiserror::Error;

use crate::retry::is_transient_mysql_error;

/// Errors from database operations.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Opening a connection failed in a way a retry may fix.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// A statement was rejected by the server.
    #[error("Query failed: {0}")]
    Query(String),

    /// Every pooled connection stayed checked out for the whole wait.
    #[error("Timed out after {waited:?} waiting for a pooled connection")]
    PoolTimeout { waited: Duration },

    /// The pool was shut down.
    #[error("Connection pool is closed")]
    PoolClosed,

    /// A transient failure persisted through every attempt.
    #[error("MySQL operation failed in all {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        last: Box<DatabaseError>,
    },

    /// A statement failed; carries the SQL and its parameters.
    #[error("An error occurred while executing the query '{sql}' with parameters '{params}': {source}")]
    Statement {
        sql: String,
        params: String,
        source: Box<DatabaseError>,
    },

    /// Expected a result row but none was returned.
    #[error("No result returned")]
    NoResult,

    /// The current database has no table by this name.
    #[error("Table '{0}' does not exist")]
    UnknownTable(String),

    /// A table handle was asked about a column the table does not have.
    #[error("Table '{table}' contains no column '{column}'")]
    UnknownColumn { table: String, column: String },

    /// A result row was asked for a column the query did not select.
    #[error("Column '{0}' is not part of the result")]
    ColumnNotInResult(String),

    /// Flushing a key that has no cached entry.
    #[error("The key '{key}' is not loaded in table '{table}'")]
    NotCached { table: String, key: String },

    /// Invalid state or builder misuse.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Underlying sqlx/MySQL error.
    #[error("MySQL error: {0}")]
    Sql(#[from] sqlx::Error),

    /// Catch-all for unexpected errors.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl DatabaseError {
    /// Whether retrying the operation on a fresh connection may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Connection(_) | Self::PoolTimeout { .. } => true,
            Self::Sql(e) => is_transient_mysql_error(e),
            Self::Statement { source, .. } => source.is_transient(),
            _ => false,
        }
    }
}
