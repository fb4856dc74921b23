//! Bounded connection pool.
//!
//! At most `max_connections` connections are checked out at once, enforced by
//! a semaphore. Waiting for a slot is bounded by `acquire_timeout`, so
//! connection exhaustion surfaces as [`DatabaseError::PoolTimeout`] instead of
//! blocking forever. Idle connections are reused; a slot without an idle
//! connection opens a fresh one.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use dbbox_config::PoolConfig;
use dbbox_core::SqlValue;
use serde::Serialize;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info, warn};

use crate::connection::{Connection, Connector};
use crate::error::DatabaseError;
use crate::result::QueryResult;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolSettings {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self::from(&PoolConfig::default())
    }
}

impl From<&PoolConfig> for PoolSettings {
    fn from(config: &PoolConfig) -> Self {
        Self {
            max_connections: config.max_connections,
            min_connections: config.min_connections,
            acquire_timeout: Duration::from_secs(config.acquire_timeout_secs),
        }
    }
}

/// Snapshot of pool usage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolStatus {
    pub max_connections: u32,
    /// Connections currently open, idle or checked out.
    pub open: u32,
    pub idle: u32,
    pub in_use: u32,
}

struct PoolInner<C: Connector> {
    connector: C,
    settings: PoolSettings,
    idle: Mutex<Vec<C::Connection>>,
    permits: Arc<Semaphore>,
    open: AtomicU32,
    closed: AtomicBool,
}

/// Shared handle to a pool of connections from one [`Connector`].
pub struct ConnectionPool<C: Connector> {
    inner: Arc<PoolInner<C>>,
}

impl<C: Connector> Clone for ConnectionPool<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: Connector> ConnectionPool<C> {
    /// Create the pool and open `min_connections` connections up front.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::InvalidState` for inconsistent settings, or the
    /// connector's error if an initial connection cannot be opened.
    pub async fn open(connector: C, settings: PoolSettings) -> Result<Self, DatabaseError> {
        if settings.max_connections == 0 {
            return Err(DatabaseError::InvalidState(
                "pool needs at least one connection".into(),
            ));
        }
        if settings.min_connections > settings.max_connections {
            return Err(DatabaseError::InvalidState(format!(
                "min_connections ({}) exceeds max_connections ({})",
                settings.min_connections, settings.max_connections
            )));
        }
        let permits = usize::try_from(settings.max_connections)
            .map_err(|e| DatabaseError::InvalidState(format!("max_connections: {e}")))?;

        let pool = Self {
            inner: Arc::new(PoolInner {
                connector,
                settings,
                idle: Mutex::new(Vec::new()),
                permits: Arc::new(Semaphore::new(permits)),
                open: AtomicU32::new(0),
                closed: AtomicBool::new(false),
            }),
        };

        for _ in 0..pool.inner.settings.min_connections {
            let conn = pool.inner.connector.connect().await?;
            pool.inner.open.fetch_add(1, Ordering::SeqCst);
            pool.lock_idle().push(conn);
        }

        info!(
            url = %pool.inner.connector.describe(),
            max = pool.inner.settings.max_connections,
            min = pool.inner.settings.min_connections,
            "connection pool ready"
        );
        Ok(pool)
    }

    /// Check out a connection, waiting up to `acquire_timeout` for a free slot.
    ///
    /// # Errors
    ///
    /// `PoolTimeout` when every slot stays busy, `PoolClosed` after
    /// [`Self::close`], or the connector's error when a new connection fails.
    pub async fn acquire(&self) -> Result<PooledConnection<C>, DatabaseError> {
        let waited = self.inner.settings.acquire_timeout;
        let permit =
            match tokio::time::timeout(waited, Arc::clone(&self.inner.permits).acquire_owned())
                .await
            {
                Ok(Ok(permit)) => permit,
                Ok(Err(_)) => return Err(DatabaseError::PoolClosed),
                Err(_) => return Err(DatabaseError::PoolTimeout { waited }),
            };
        if self.is_closed() {
            return Err(DatabaseError::PoolClosed);
        }

        let reused = self.lock_idle().pop();
        let conn = match reused {
            Some(conn) => conn,
            None => {
                let conn = self.inner.connector.connect().await?;
                let open = self.inner.open.fetch_add(1, Ordering::SeqCst) + 1;
                debug!(open, "opened pooled connection");
                conn
            }
        };

        Ok(PooledConnection {
            conn: Some(conn),
            pool: self.clone(),
            _permit: permit,
        })
    }

    #[must_use]
    pub fn status(&self) -> PoolStatus {
        let max_connections = self.inner.settings.max_connections;
        let available = u32::try_from(self.inner.permits.available_permits()).unwrap_or(u32::MAX);
        let in_use = if self.is_closed() {
            0
        } else {
            max_connections.saturating_sub(available)
        };
        PoolStatus {
            max_connections,
            open: self.inner.open.load(Ordering::SeqCst),
            idle: u32::try_from(self.lock_idle().len()).unwrap_or(u32::MAX),
            in_use,
        }
    }

    pub(crate) fn connector(&self) -> &C {
        &self.inner.connector
    }

    #[must_use]
    pub fn settings(&self) -> &PoolSettings {
        &self.inner.settings
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Refuse new checkouts and close idle connections.
    ///
    /// Connections still checked out are dropped when their guard is.
    pub async fn close(&self) {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.inner.permits.close();
        let idle = std::mem::take(&mut *self.lock_idle());
        let count = idle.len();
        for conn in idle {
            self.inner.open.fetch_sub(1, Ordering::SeqCst);
            if let Err(e) = conn.close().await {
                warn!(error = %e, "failed to close pooled connection");
            }
        }
        info!(closed = count, "connection pool closed");
    }

    fn lock_idle(&self) -> MutexGuard<'_, Vec<C::Connection>> {
        self.inner
            .idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn release(&self, conn: C::Connection) {
        if self.is_closed() {
            self.inner.open.fetch_sub(1, Ordering::SeqCst);
            drop(conn);
        } else {
            self.lock_idle().push(conn);
        }
    }
}

/// A checked-out connection. Goes back to the pool when dropped.
pub struct PooledConnection<C: Connector> {
    conn: Option<C::Connection>,
    pool: ConnectionPool<C>,
    // Released after `Drop::drop` has returned the connection.
    _permit: OwnedSemaphorePermit,
}

impl<C: Connector> PooledConnection<C> {
    fn conn_mut(&mut self) -> Result<&mut C::Connection, DatabaseError> {
        self.conn
            .as_mut()
            .ok_or_else(|| DatabaseError::InvalidState("connection already released".into()))
    }

    /// # Errors
    ///
    /// Whatever the connection reports.
    pub async fn query(
        &mut self,
        sql: &str,
        params: &[SqlValue],
    ) -> Result<QueryResult, DatabaseError> {
        self.conn_mut()?.query(sql, params).await
    }

    /// # Errors
    ///
    /// Whatever the connection reports.
    pub async fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<u64, DatabaseError> {
        self.conn_mut()?.execute(sql, params).await
    }

    /// # Errors
    ///
    /// Whatever the connection reports.
    pub async fn ping(&mut self) -> Result<(), DatabaseError> {
        self.conn_mut()?.ping().await
    }

    /// Drop a broken connection instead of returning it to the pool.
    ///
    /// The freed slot opens a fresh connection on its next checkout.
    pub fn discard(mut self) {
        if self.conn.take().is_some() {
            let open = self
                .pool
                .inner
                .open
                .fetch_sub(1, Ordering::SeqCst)
                .saturating_sub(1);
            debug!(open, "discarded pooled connection");
        }
    }

    /// Release the connection, discarding it if `result` is a transient failure.
    ///
    /// # Errors
    ///
    /// Passes `result` through.
    pub fn finish<T>(self, result: Result<T, DatabaseError>) -> Result<T, DatabaseError> {
        if result.as_ref().is_err_and(DatabaseError::is_transient) {
            self.discard();
        }
        result
    }
}

impl<C: Connector> Drop for PooledConnection<C> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.release(conn);
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::test_support::{MockConnector, test_settings};

    #[tokio::test]
    async fn opens_min_connections_eagerly() {
        let connector = MockConnector::new();
        let settings = PoolSettings {
            min_connections: 2,
            ..test_settings(4)
        };
        let pool = ConnectionPool::open(connector.clone(), settings).await.unwrap();
        assert_eq!(connector.connects(), 2);
        assert_eq!(
            pool.status(),
            PoolStatus {
                max_connections: 4,
                open: 2,
                idle: 2,
                in_use: 0
            }
        );
    }

    #[tokio::test]
    async fn rejects_inconsistent_settings() {
        let zero = ConnectionPool::open(MockConnector::new(), test_settings(0)).await;
        assert!(matches!(zero, Err(DatabaseError::InvalidState(_))));

        let settings = PoolSettings {
            min_connections: 3,
            ..test_settings(2)
        };
        let inverted = ConnectionPool::open(MockConnector::new(), settings).await;
        assert!(matches!(inverted, Err(DatabaseError::InvalidState(_))));
    }

    #[tokio::test]
    async fn reuses_returned_connections() {
        let connector = MockConnector::new();
        let pool = ConnectionPool::open(connector.clone(), test_settings(2))
            .await
            .unwrap();

        let conn = pool.acquire().await.unwrap();
        assert_eq!(pool.status().in_use, 1);
        drop(conn);
        assert_eq!(pool.status().idle, 1);

        let _again = pool.acquire().await.unwrap();
        assert_eq!(connector.connects(), 1);
    }

    #[tokio::test]
    async fn every_slot_is_usable_then_times_out() {
        let pool = ConnectionPool::open(MockConnector::new(), test_settings(3))
            .await
            .unwrap();

        let held: Vec<_> = [
            pool.acquire().await.unwrap(),
            pool.acquire().await.unwrap(),
            pool.acquire().await.unwrap(),
        ]
        .into();
        assert_eq!(pool.status().in_use, 3);

        let err = pool.acquire().await.err().unwrap();
        assert!(matches!(err, DatabaseError::PoolTimeout { .. }));
        assert!(err.is_transient());
        drop(held);
    }

    #[tokio::test]
    async fn waiter_gets_connection_released_by_another_task() {
        let settings = PoolSettings {
            acquire_timeout: Duration::from_secs(5),
            ..test_settings(1)
        };
        let pool = ConnectionPool::open(MockConnector::new(), settings).await.unwrap();
        let held = pool.acquire().await.unwrap();

        let waiter = {
            let pool = pool.clone();
            tokio::spawn(async move { pool.acquire().await.map(|_| ()) })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        drop(held);
        waiter.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn discarded_connection_is_replaced() {
        let connector = MockConnector::new();
        let pool = ConnectionPool::open(connector.clone(), test_settings(1))
            .await
            .unwrap();

        pool.acquire().await.unwrap().discard();
        assert_eq!(pool.status().open, 0);

        let _fresh = pool.acquire().await.unwrap();
        assert_eq!(connector.connects(), 2);
        assert_eq!(pool.status().open, 1);
    }

    #[tokio::test]
    async fn finish_discards_only_transient_failures() {
        let pool = ConnectionPool::open(MockConnector::new(), test_settings(1))
            .await
            .unwrap();

        let conn = pool.acquire().await.unwrap();
        let _ = conn.finish::<()>(Err(DatabaseError::Query("syntax".into())));
        assert_eq!(pool.status().idle, 1);

        let conn = pool.acquire().await.unwrap();
        let _ = conn.finish::<()>(Err(DatabaseError::Connection("reset".into())));
        assert_eq!(pool.status().idle, 0);
        assert_eq!(pool.status().open, 0);
    }

    #[tokio::test]
    async fn failed_connect_releases_the_slot() {
        let connector = MockConnector::new();
        connector.fail_connects(1);
        let pool = ConnectionPool::open(connector.clone(), test_settings(1))
            .await
            .unwrap();

        assert!(matches!(
            pool.acquire().await,
            Err(DatabaseError::Connection(_))
        ));
        assert!(pool.acquire().await.is_ok());
    }

    #[tokio::test]
    async fn close_refuses_new_checkouts() {
        let connector = MockConnector::new();
        let settings = PoolSettings {
            min_connections: 1,
            ..test_settings(2)
        };
        let pool = ConnectionPool::open(connector.clone(), settings).await.unwrap();
        let held = pool.acquire().await.unwrap();

        pool.close().await;
        assert!(pool.is_closed());
        assert!(matches!(pool.acquire().await, Err(DatabaseError::PoolClosed)));

        drop(held);
        assert_eq!(pool.status().open, 0);
        assert_eq!(pool.status().idle, 0);
    }

    #[tokio::test]
    async fn forwards_statements() {
        let connector = MockConnector::new();
        let pool = ConnectionPool::open(connector.clone(), test_settings(1))
            .await
            .unwrap();
        let mut conn = pool.acquire().await.unwrap();
        let affected = conn
            .execute("DELETE FROM `user` WHERE `id` = ?", &[SqlValue::Int(7)])
            .await
            .unwrap();
        assert_eq!(affected, 1);
        conn.ping().await.unwrap();
        assert_eq!(
            connector.sql_log(),
            vec!["DELETE FROM `user` WHERE `id` = ?", "SELECT 1"]
        );
    }
}
