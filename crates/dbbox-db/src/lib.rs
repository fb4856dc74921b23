//! # dbbox-db
//!
//! Pooled MySQL access for dbbox.
//!
//! [`DatasourceManager`] owns a bounded [`ConnectionPool`], runs every
//! statement through a retry loop that only repeats transient failures, and
//! hands out query builders and cached [`Table`] handles. The pool and the
//! retry logic talk to the [`Connector`] trait, so the MySQL backend in
//! [`mysql`] can be swapped for a scripted one in tests.
//!
//! ```no_run
//! use dbbox_config::DbBoxConfig;
//! use dbbox_db::DatasourceManager;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let config = DbBoxConfig::load_with_dotenv()?;
//! let db = DatasourceManager::connect(&config).await?;
//!
//! let users = db.table("user", "id").await?;
//! users.set(3, "password", "pw3").await?;
//! users.update(3).await?;
//!
//! db.shutdown().await;
//! # Ok(()) }
//! ```

pub mod builders;
pub mod connection;
pub mod error;
pub mod manager;
pub mod mysql;
pub mod pool;
pub mod result;
pub mod retry;
pub mod statement;
pub mod table;
pub mod transaction;

#[cfg(test)]
mod test_support;

pub use builders::{InsertBuilder, SelectBuilder, UpdateBuilder};
pub use connection::{Connection, Connector};
pub use error::DatabaseError;
pub use manager::DatasourceManager;
pub use mysql::{MySqlConnection, MySqlConnector};
pub use pool::{ConnectionPool, PoolSettings, PoolStatus, PooledConnection};
pub use result::{Column, QueryResult, Row};
pub use retry::RetryConfig;
pub use statement::Statement;
pub use table::{Table, TableBuilder, TableColumn};
pub use transaction::Transaction;
