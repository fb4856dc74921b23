//! The datasource manager: pool, retry loop and table registry in one handle.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use dbbox_config::DbBoxConfig;
use dbbox_core::SqlValue;
use tracing::{debug, info, warn};

use crate::builders::{InsertBuilder, SelectBuilder, UpdateBuilder};
use crate::connection::Connector;
use crate::error::DatabaseError;
use crate::mysql::MySqlConnector;
use crate::pool::{ConnectionPool, PoolSettings, PoolStatus, PooledConnection};
use crate::result::QueryResult;
use crate::retry::RetryConfig;
use crate::statement::render_params;
use crate::table::{Table, TableBuilder};
use crate::transaction::Transaction;

struct ManagerInner<C: Connector> {
    pool: ConnectionPool<C>,
    retry: RetryConfig,
    cache_ttl: Option<Duration>,
    tables: Mutex<HashMap<String, Arc<Table<C>>>>,
}

/// Shared entry point for all database work.
///
/// Cloning is cheap; clones share the pool and the table registry.
pub struct DatasourceManager<C: Connector = MySqlConnector> {
    inner: Arc<ManagerInner<C>>,
}

impl<C: Connector> Clone for DatasourceManager<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl DatasourceManager<MySqlConnector> {
    /// Connect to the MySQL server described by `config`.
    ///
    /// # Errors
    ///
    /// `DatabaseError::Config` if no database is configured, or the error from
    /// opening the initial pool connections.
    pub async fn connect(config: &DbBoxConfig) -> Result<Self, DatabaseError> {
        let mysql = config.require_mysql()?;
        Self::new(
            MySqlConnector::new(mysql),
            PoolSettings::from(&config.pool),
            RetryConfig::from(&config.pool),
            config.cache.ttl(),
        )
        .await
    }
}

impl<C: Connector> DatasourceManager<C> {
    /// # Errors
    ///
    /// As [`ConnectionPool::open`].
    pub async fn new(
        connector: C,
        settings: PoolSettings,
        retry: RetryConfig,
        cache_ttl: Option<Duration>,
    ) -> Result<Self, DatabaseError> {
        let pool = ConnectionPool::open(connector, settings).await?;
        Ok(Self {
            inner: Arc::new(ManagerInner {
                pool,
                retry,
                cache_ttl,
                tables: Mutex::new(HashMap::new()),
            }),
        })
    }

    #[must_use]
    pub fn cache_ttl(&self) -> Option<Duration> {
        self.inner.cache_ttl
    }

    #[must_use]
    pub fn retry_config(&self) -> &RetryConfig {
        &self.inner.retry
    }

    fn lock_tables(&self) -> MutexGuard<'_, HashMap<String, Arc<Table<C>>>> {
        self.inner
            .tables
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `op` on a pooled connection, retrying transient failures.
    ///
    /// `op` owns the connection and should hand its result to
    /// [`PooledConnection::finish`] so broken connections are discarded.
    async fn run_secure<T, F, Fut>(&self, mut op: F) -> Result<T, DatabaseError>
    where
        F: FnMut(PooledConnection<C>) -> Fut,
        Fut: Future<Output = Result<T, DatabaseError>>,
    {
        let max_attempts = self.inner.retry.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            let result = match self.inner.pool.acquire().await {
                Ok(conn) => op(conn).await,
                Err(e) => Err(e),
            };
            match result {
                Ok(value) => return Ok(value),
                Err(e) if !e.is_transient() => return Err(e),
                Err(e) if attempt >= max_attempts => {
                    return Err(DatabaseError::RetriesExhausted {
                        attempts: attempt,
                        last: Box::new(e),
                    });
                }
                Err(e) => {
                    let delay = self.inner.retry.delay_after(attempt);
                    warn!(
                        attempt,
                        max_attempts,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %e,
                        "transient MySQL error, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// Run a statement that returns rows.
    ///
    /// # Errors
    ///
    /// `DatabaseError::Statement` wrapping the failure, which is
    /// `RetriesExhausted` when transient errors persisted.
    pub async fn execute_query(
        &self,
        sql: &str,
        params: &[SqlValue],
    ) -> Result<QueryResult, DatabaseError> {
        debug!(sql, params = %render_params(params), "query");
        self.run_secure(|mut conn| async move {
            let result = conn.query(sql, params).await;
            conn.finish(result)
        })
        .await
        .map_err(|e| statement_error(sql, params, e))
    }

    /// Run a statement that modifies data; returns rows affected.
    ///
    /// # Errors
    ///
    /// As [`Self::execute_query`].
    pub async fn execute_update(&self, sql: &str, params: &[SqlValue]) -> Result<u64, DatabaseError> {
        debug!(sql, params = %render_params(params), "update");
        self.run_secure(|mut conn| async move {
            let result = conn.execute(sql, params).await;
            conn.finish(result)
        })
        .await
        .map_err(|e| statement_error(sql, params, e))
    }

    /// Check a pooled connection is alive.
    ///
    /// # Errors
    ///
    /// The ping failure after retries.
    pub async fn ping(&self) -> Result<(), DatabaseError> {
        self.run_secure(|mut conn| async move {
            let result = conn.ping().await;
            conn.finish(result)
        })
        .await
    }

    /// Start a transaction on a dedicated connection outside the pool.
    ///
    /// # Errors
    ///
    /// `DatabaseError::PoolClosed` after [`Self::shutdown`], or the error from
    /// connecting or `START TRANSACTION`.
    pub async fn begin_transaction(&self) -> Result<Transaction<C>, DatabaseError> {
        if self.inner.pool.is_closed() {
            return Err(DatabaseError::PoolClosed);
        }
        Transaction::begin(self.inner.pool.connector()).await
    }

    pub fn create_table(&self, name: impl Into<String>) -> TableBuilder<C> {
        TableBuilder::new(self.clone(), name)
    }

    /// The shared handle for `name`, opening it on first use.
    ///
    /// # Errors
    ///
    /// `DatabaseError::InvalidState` if the table is already open with a
    /// different identifier column, otherwise as [`Table::open`].
    pub async fn table(&self, name: &str, identifier: &str) -> Result<Arc<Table<C>>, DatabaseError> {
        let existing = self.lock_tables().get(name).cloned();
        if let Some(table) = existing {
            return check_identifier(table, identifier);
        }

        let opened = Arc::new(Table::open(self.clone(), name, identifier).await?);
        let table = Arc::clone(
            self.lock_tables()
                .entry(name.to_string())
                .or_insert(opened),
        );
        check_identifier(table, identifier)
    }

    pub fn select(&self, table: impl Into<String>) -> SelectBuilder<C> {
        SelectBuilder::new(self.clone(), table)
    }

    pub fn update(&self, table: impl Into<String>) -> UpdateBuilder<C> {
        UpdateBuilder::new(self.clone(), table)
    }

    pub fn insert(&self, table: impl Into<String>) -> InsertBuilder<C> {
        InsertBuilder::new(self.clone(), table)
    }

    #[must_use]
    pub fn status(&self) -> PoolStatus {
        self.inner.pool.status()
    }

    /// Drop table handles and close the pool.
    ///
    /// Unflushed changes in table caches are lost; each affected table is
    /// logged.
    pub async fn shutdown(&self) {
        let tables: Vec<_> = self.lock_tables().drain().collect();
        for (name, table) in tables {
            let dirty = table.dirty_count();
            if dirty > 0 {
                warn!(table = %name, dirty, "discarding unflushed rows on shutdown");
            }
        }
        self.inner.pool.close().await;
        info!("datasource manager shut down");
    }
}

fn check_identifier<C: Connector>(
    table: Arc<Table<C>>,
    identifier: &str,
) -> Result<Arc<Table<C>>, DatabaseError> {
    if table.identifier().eq_ignore_ascii_case(identifier) {
        Ok(table)
    } else {
        Err(DatabaseError::InvalidState(format!(
            "table '{}' is open with identifier '{}', not '{identifier}'",
            table.name(),
            table.identifier()
        )))
    }
}

fn statement_error(sql: &str, params: &[SqlValue], source: DatabaseError) -> DatabaseError {
    DatabaseError::Statement {
        sql: sql.to_string(),
        params: render_params(params),
        source: Box::new(source),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::test_support::{
        MockConnector, MockResponse, rows, test_manager, test_retry, test_settings,
    };

    #[tokio::test]
    async fn query_passes_sql_and_params() {
        let connector = MockConnector::with_handler(|_, params| {
            MockResponse::Rows(rows(&["id"], vec![vec![params[0].clone()]]))
        });
        let db = test_manager(connector.clone()).await;
        let result = db
            .execute_query("SELECT `id` FROM `user` WHERE `id` = ?", &[SqlValue::Int(5)])
            .await
            .unwrap();
        assert_eq!(result.first().unwrap().get_i64("id").unwrap(), 5);
        assert_eq!(connector.statements()[0].params, vec![SqlValue::Int(5)]);
    }

    #[tokio::test]
    async fn transient_failure_is_retried_on_fresh_connection() {
        let connector = MockConnector::new();
        let db = test_manager(connector.clone()).await;
        connector.fail_next(DatabaseError::Connection("server has gone away".into()));

        let affected = db
            .execute_update("DELETE FROM `user` WHERE `id` = ?", &[SqlValue::Int(1)])
            .await
            .unwrap();
        assert_eq!(affected, 1);
        assert_eq!(connector.statements().len(), 2);
        assert_eq!(connector.connects(), 2);
        assert_eq!(db.status().open, 1);
    }

    #[tokio::test]
    async fn logic_errors_fail_immediately_with_context() {
        let connector = MockConnector::new();
        let db = test_manager(connector.clone()).await;
        connector.fail_next(DatabaseError::Query("You have an error in your SQL syntax".into()));

        let err = db
            .execute_query("SELEC 1", &[SqlValue::from("x")])
            .await
            .unwrap_err();
        assert_eq!(connector.statements().len(), 1);
        assert_eq!(
            err.to_string(),
            "An error occurred while executing the query 'SELEC 1' with parameters ''x'': \
             Query failed: You have an error in your SQL syntax"
        );
    }

    #[tokio::test]
    async fn persistent_transient_failure_exhausts_retries() {
        let connector = MockConnector::new();
        let db = test_manager(connector.clone()).await;
        for _ in 0..3 {
            connector.fail_next(DatabaseError::Connection("reset".into()));
        }

        let err = db.execute_update("UPDATE t SET a = 1", &[]).await.unwrap_err();
        let DatabaseError::Statement { source, .. } = err else {
            panic!("expected statement context, got {err}");
        };
        assert!(matches!(
            *source,
            DatabaseError::RetriesExhausted { attempts: 3, .. }
        ));
        assert_eq!(connector.statements().len(), 3);
    }

    #[tokio::test]
    async fn connect_failures_are_retried() {
        let connector = MockConnector::new();
        let db = test_manager(connector.clone()).await;
        connector.fail_connects(2);
        db.ping().await.unwrap();
        assert_eq!(connector.connects(), 1);
    }

    #[tokio::test]
    async fn exhausted_pool_times_out_and_retries() {
        let db = DatasourceManager::new(MockConnector::new(), test_settings(1), test_retry(), None)
            .await
            .unwrap();
        let _held = db.inner.pool.acquire().await.unwrap();
        let err = db.ping().await.unwrap_err();
        assert!(matches!(
            err,
            DatabaseError::RetriesExhausted { attempts: 3, ref last }
                if matches!(**last, DatabaseError::PoolTimeout { .. })
        ));
    }

    #[tokio::test]
    async fn transactions_use_dedicated_connections() {
        let connector = MockConnector::new();
        let db = test_manager(connector.clone()).await;
        let mut tx = db.begin_transaction().await.unwrap();
        tx.execute("INSERT INTO `user` (`id`) VALUES (?)", &[SqlValue::Int(4)])
            .await
            .unwrap();
        assert_eq!(db.status().in_use, 0);
        tx.commit().await.unwrap();
        assert_eq!(
            connector.sql_log(),
            vec!["START TRANSACTION", "INSERT INTO `user` (`id`) VALUES (?)", "COMMIT"]
        );
    }

    fn user_columns() -> MockConnector {
        MockConnector::with_handler(|sql, _| {
            if sql.contains("information_schema") {
                MockResponse::Rows(rows(&["column_name", "data_type"], vec![
                    vec!["id".into(), "int".into()],
                    vec!["password".into(), "varchar".into()],
                ]))
            } else {
                MockResponse::Affected(0)
            }
        })
    }

    #[tokio::test]
    async fn table_handles_are_shared() {
        let connector = user_columns();
        let db = test_manager(connector.clone()).await;
        let a = db.table("user", "id").await.unwrap();
        let b = db.table("user", "ID").await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(connector.statements().len(), 1);
        assert!(matches!(
            db.table("user", "password").await,
            Err(DatabaseError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn shutdown_closes_pool_and_drops_tables() {
        let connector = user_columns();
        let db = test_manager(connector.clone()).await;
        let table = db.table("user", "id").await.unwrap();
        table.set(1, "password", "unsaved").await.unwrap();

        db.shutdown().await;
        assert!(db.lock_tables().is_empty());
        assert!(matches!(db.ping().await, Err(DatabaseError::PoolClosed)));
        assert!(matches!(
            db.begin_transaction().await,
            Err(DatabaseError::PoolClosed)
        ));
        assert_eq!(connector.closes(), 1);
    }
}
