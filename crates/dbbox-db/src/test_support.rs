//! Scripted in-memory connector for unit tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use dbbox_core::SqlValue;

use crate::connection::{Connection, Connector};
use crate::error::DatabaseError;
use crate::manager::DatasourceManager;
use crate::pool::PoolSettings;
use crate::result::{Column, QueryResult};
use crate::retry::RetryConfig;
use crate::statement::Statement;

/// What the scripted server answers to a statement.
pub enum MockResponse {
    Rows(QueryResult),
    Affected(u64),
    Error(DatabaseError),
}

type Handler = dyn Fn(&str, &[SqlValue]) -> MockResponse + Send + Sync;

#[derive(Default)]
struct MockState {
    statements: Vec<Statement>,
    connect_failures: u32,
    statement_failures: VecDeque<DatabaseError>,
    connects: u32,
    closes: u32,
}

#[derive(Clone)]
pub struct MockConnector {
    state: Arc<Mutex<MockState>>,
    handler: Arc<Handler>,
}

impl MockConnector {
    /// Every query returns no rows and every update affects one row.
    pub fn new() -> Self {
        Self::with_handler(|_, _| MockResponse::Affected(1))
    }

    pub fn with_handler(
        handler: impl Fn(&str, &[SqlValue]) -> MockResponse + Send + Sync + 'static,
    ) -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState::default())),
            handler: Arc::new(handler),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The next `n` connection attempts fail with a transient error.
    pub fn fail_connects(&self, n: u32) {
        self.lock().connect_failures = n;
    }

    /// Queue an error for the next statement on any connection.
    pub fn fail_next(&self, error: DatabaseError) {
        self.lock().statement_failures.push_back(error);
    }

    pub fn statements(&self) -> Vec<Statement> {
        self.lock().statements.clone()
    }

    pub fn sql_log(&self) -> Vec<String> {
        self.lock().statements.iter().map(|s| s.sql.clone()).collect()
    }

    pub fn connects(&self) -> u32 {
        self.lock().connects
    }

    pub fn closes(&self) -> u32 {
        self.lock().closes
    }
}

#[async_trait]
impl Connector for MockConnector {
    type Connection = MockConnection;

    async fn connect(&self) -> Result<MockConnection, DatabaseError> {
        let mut state = self.lock();
        if state.connect_failures > 0 {
            state.connect_failures -= 1;
            return Err(DatabaseError::Connection("connection refused".into()));
        }
        state.connects += 1;
        Ok(MockConnection {
            connector: self.clone(),
        })
    }

    fn describe(&self) -> String {
        "mock://test".to_string()
    }
}

pub struct MockConnection {
    connector: MockConnector,
}

impl MockConnection {
    fn respond(&self, sql: &str, params: &[SqlValue]) -> MockResponse {
        {
            let mut state = self.connector.lock();
            state.statements.push(Statement::new(sql, params.to_vec()));
            if let Some(error) = state.statement_failures.pop_front() {
                return MockResponse::Error(error);
            }
        }
        (self.connector.handler)(sql, params)
    }
}

#[async_trait]
impl Connection for MockConnection {
    async fn query(
        &mut self,
        sql: &str,
        params: &[SqlValue],
    ) -> Result<QueryResult, DatabaseError> {
        match self.respond(sql, params) {
            MockResponse::Rows(result) => Ok(result),
            MockResponse::Affected(_) => Ok(QueryResult::empty()),
            MockResponse::Error(e) => Err(e),
        }
    }

    async fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<u64, DatabaseError> {
        match self.respond(sql, params) {
            MockResponse::Rows(result) => Ok(result.len() as u64),
            MockResponse::Affected(n) => Ok(n),
            MockResponse::Error(e) => Err(e),
        }
    }

    async fn ping(&mut self) -> Result<(), DatabaseError> {
        match self.respond("SELECT 1", &[]) {
            MockResponse::Error(e) => Err(e),
            _ => Ok(()),
        }
    }

    async fn close(self) -> Result<(), DatabaseError> {
        self.connector.lock().closes += 1;
        Ok(())
    }
}

/// A result with text columns, for scripting handlers.
pub fn rows(columns: &[&str], rows: Vec<Vec<SqlValue>>) -> QueryResult {
    QueryResult::new(
        columns.iter().map(|c| Column::new(*c, "VARCHAR")).collect(),
        rows,
    )
}

pub fn test_settings(max_connections: u32) -> PoolSettings {
    PoolSettings {
        max_connections,
        min_connections: 0,
        acquire_timeout: Duration::from_millis(50),
    }
}

pub fn test_retry() -> RetryConfig {
    RetryConfig {
        max_attempts: 3,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(4),
    }
}

pub async fn test_manager(connector: MockConnector) -> DatasourceManager<MockConnector> {
    DatasourceManager::new(connector, test_settings(2), test_retry(), None)
        .await
        .unwrap()
}
