//! Explicit transactions on a dedicated connection.
//!
//! A transaction never borrows a pooled connection: it opens its own, so a
//! long-running transaction cannot starve the pool and a connection left in a
//! half-finished transaction never goes back into rotation.

use dbbox_core::SqlValue;
use tracing::{debug, error};

use crate::connection::{Connection, Connector};
use crate::error::DatabaseError;
use crate::mysql::MySqlConnector;
use crate::result::QueryResult;

/// An open transaction.
///
/// Dropping it without [`Transaction::commit`] closes the connection, and the
/// server rolls back.
pub struct Transaction<C: Connector = MySqlConnector> {
    conn: Option<C::Connection>,
}

impl<C: Connector> Transaction<C> {
    pub(crate) async fn begin(connector: &C) -> Result<Self, DatabaseError> {
        let mut conn = connector.connect().await?;
        conn.execute("START TRANSACTION", &[]).await?;
        debug!("transaction started");
        Ok(Self { conn: Some(conn) })
    }

    fn conn_mut(&mut self) -> Result<&mut C::Connection, DatabaseError> {
        self.conn
            .as_mut()
            .ok_or_else(|| DatabaseError::InvalidState("transaction already finished".into()))
    }

    /// # Errors
    ///
    /// Returns the statement's error. The transaction stays open.
    pub async fn query(
        &mut self,
        sql: &str,
        params: &[SqlValue],
    ) -> Result<QueryResult, DatabaseError> {
        self.conn_mut()?.query(sql, params).await
    }

    /// # Errors
    ///
    /// Returns the statement's error. The transaction stays open.
    pub async fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<u64, DatabaseError> {
        self.conn_mut()?.execute(sql, params).await
    }

    /// Commit and close the connection.
    ///
    /// # Errors
    ///
    /// Returns the `COMMIT` error after attempting a rollback.
    pub async fn commit(mut self) -> Result<(), DatabaseError> {
        let mut conn = self.take()?;
        if let Err(e) = conn.execute("COMMIT", &[]).await {
            if let Err(rollback) = conn.execute("ROLLBACK", &[]).await {
                error!(error = %rollback, "rollback after failed commit failed");
            }
            close_quietly(conn).await;
            return Err(e);
        }
        debug!("transaction committed");
        close_quietly(conn).await;
        Ok(())
    }

    /// Roll back and close the connection.
    ///
    /// # Errors
    ///
    /// Returns the `ROLLBACK` error; the connection is closed either way.
    pub async fn rollback(mut self) -> Result<(), DatabaseError> {
        let mut conn = self.take()?;
        let result = conn.execute("ROLLBACK", &[]).await.map(|_| ());
        if let Err(e) = &result {
            error!(error = %e, "rollback failed");
        } else {
            debug!("transaction rolled back");
        }
        close_quietly(conn).await;
        result
    }

    fn take(&mut self) -> Result<C::Connection, DatabaseError> {
        self.conn
            .take()
            .ok_or_else(|| DatabaseError::InvalidState("transaction already finished".into()))
    }
}

async fn close_quietly<T: Connection>(conn: T) {
    if let Err(e) = conn.close().await {
        error!(error = %e, "failed to close transaction connection");
    }
}

impl<C: Connector> Drop for Transaction<C> {
    fn drop(&mut self) {
        if self.conn.take().is_some() {
            debug!("transaction dropped without commit; server rolls back");
        }
    }
}
