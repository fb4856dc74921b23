//! Connection seams.
//!
//! The pool, the retry loop, the builders and the table cache only talk to
//! these two traits. Production uses the MySQL implementation in
//! [`crate::mysql`]; unit tests use a scripted in-memory connector.

use async_trait::async_trait;
use dbbox_core::SqlValue;

use crate::error::DatabaseError;
use crate::result::QueryResult;

/// A single open database session.
#[async_trait]
pub trait Connection: Send + 'static {
    /// Run a statement that returns rows.
    async fn query(&mut self, sql: &str, params: &[SqlValue])
    -> Result<QueryResult, DatabaseError>;

    /// Run a statement that modifies data; returns the number of rows affected.
    async fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<u64, DatabaseError>;

    /// Round-trip to the server to check the session is alive.
    async fn ping(&mut self) -> Result<(), DatabaseError>;

    /// Close the session gracefully.
    async fn close(self) -> Result<(), DatabaseError>;
}

/// Opens new connections for the pool and for transactions.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    type Connection: Connection;

    async fn connect(&self) -> Result<Self::Connection, DatabaseError>;

    /// Where connections go, for logs. Must not include credentials.
    fn describe(&self) -> String;
}
