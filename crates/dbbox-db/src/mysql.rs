//! MySQL backend over `sqlx`.
//!
//! Statements with parameters go through the binary (prepared) protocol;
//! statements without parameters use the text protocol so that commands MySQL
//! cannot prepare (`START TRANSACTION`, some DDL) still work.

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use dbbox_config::MySqlConfig;
use dbbox_core::SqlValue;
use sqlx::mysql::{MySql, MySqlArguments, MySqlConnectOptions, MySqlRow};
use sqlx::query::Query;
use sqlx::{Column as _, Connection as _, Executor as _, Row as _, TypeInfo as _, ValueRef as _};

use crate::connection::{Connection, Connector};
use crate::error::DatabaseError;
use crate::result::{Column, QueryResult};
use crate::retry::is_transient_mysql_error;

/// Opens `sqlx` MySQL connections from [`MySqlConfig`].
#[derive(Debug, Clone)]
pub struct MySqlConnector {
    options: MySqlConnectOptions,
    url: String,
}

impl MySqlConnector {
    #[must_use]
    pub fn new(config: &MySqlConfig) -> Self {
        let options = MySqlConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.user)
            .password(&config.password)
            .database(&config.database);
        Self {
            options,
            url: config.url(),
        }
    }
}

#[async_trait]
impl Connector for MySqlConnector {
    type Connection = MySqlConnection;

    async fn connect(&self) -> Result<MySqlConnection, DatabaseError> {
        let inner = sqlx::mysql::MySqlConnection::connect_with(&self.options)
            .await
            .map_err(|e| {
                if is_transient_mysql_error(&e) {
                    DatabaseError::Connection(format!("{}: {e}", self.url))
                } else {
                    DatabaseError::Sql(e)
                }
            })?;
        tracing::debug!(url = %self.url, "opened MySQL connection");
        Ok(MySqlConnection { inner })
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}

/// One MySQL session.
pub struct MySqlConnection {
    inner: sqlx::mysql::MySqlConnection,
}

#[async_trait]
impl Connection for MySqlConnection {
    async fn query(
        &mut self,
        sql: &str,
        params: &[SqlValue],
    ) -> Result<QueryResult, DatabaseError> {
        let rows = if params.is_empty() {
            self.inner.fetch_all(sql).await?
        } else {
            bind_all(sqlx::query(sql), params)
                .fetch_all(&mut self.inner)
                .await?
        };
        decode_rows(&rows)
    }

    async fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<u64, DatabaseError> {
        let done = if params.is_empty() {
            self.inner.execute(sql).await?
        } else {
            bind_all(sqlx::query(sql), params)
                .execute(&mut self.inner)
                .await?
        };
        Ok(done.rows_affected())
    }

    async fn ping(&mut self) -> Result<(), DatabaseError> {
        self.inner.ping().await?;
        Ok(())
    }

    async fn close(self) -> Result<(), DatabaseError> {
        self.inner.close().await?;
        Ok(())
    }
}

fn bind_all<'q>(
    mut query: Query<'q, MySql, MySqlArguments>,
    params: &[SqlValue],
) -> Query<'q, MySql, MySqlArguments> {
    for param in params {
        query = match param {
            SqlValue::Null => query.bind(None::<String>),
            SqlValue::Bool(v) => query.bind(*v),
            SqlValue::Int(v) => query.bind(*v),
            SqlValue::UInt(v) => query.bind(*v),
            SqlValue::Float(v) => query.bind(*v),
            SqlValue::Double(v) => query.bind(*v),
            SqlValue::Text(v) => query.bind(v.clone()),
            SqlValue::Bytes(v) => query.bind(v.clone()),
            SqlValue::Date(v) => query.bind(*v),
            SqlValue::DateTime(v) => query.bind(*v),
            SqlValue::Time(v) => query.bind(*v),
        };
    }
    query
}

fn decode_rows(rows: &[MySqlRow]) -> Result<QueryResult, DatabaseError> {
    let Some(first) = rows.first() else {
        return Ok(QueryResult::empty());
    };
    let columns: Vec<Column> = first
        .columns()
        .iter()
        .map(|c| Column::new(c.name(), c.type_info().name()))
        .collect();

    let mut values = Vec::with_capacity(rows.len());
    for row in rows {
        let decoded = (0..columns.len())
            .map(|idx| decode_value(row, idx))
            .collect::<Result<Vec<_>, _>>()?;
        values.push(decoded);
    }
    Ok(QueryResult::new(columns, values))
}

/// Map a MySQL column to a `SqlValue` by its server type name.
///
/// DECIMAL, JSON, ENUM and SET arrive as text.
fn decode_value(row: &MySqlRow, idx: usize) -> Result<SqlValue, sqlx::Error> {
    let raw = row.try_get_raw(idx)?;
    if raw.is_null() {
        return Ok(SqlValue::Null);
    }
    let type_name = raw.type_info().name().to_ascii_uppercase();

    let value = match type_name.as_str() {
        "BOOLEAN" => SqlValue::Bool(row.try_get_unchecked::<bool, _>(idx)?),
        t if t.ends_with("UNSIGNED") => SqlValue::UInt(row.try_get_unchecked::<u64, _>(idx)?),
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" | "YEAR" => {
            SqlValue::Int(row.try_get_unchecked::<i64, _>(idx)?)
        }
        "FLOAT" => SqlValue::Float(row.try_get_unchecked::<f32, _>(idx)?),
        "DOUBLE" => SqlValue::Double(row.try_get_unchecked::<f64, _>(idx)?),
        "DATE" => SqlValue::Date(row.try_get::<NaiveDate, _>(idx)?),
        "DATETIME" | "TIMESTAMP" => SqlValue::DateTime(row.try_get::<NaiveDateTime, _>(idx)?),
        "TIME" => SqlValue::Time(row.try_get::<NaiveTime, _>(idx)?),
        "BINARY" | "VARBINARY" | "BLOB" | "TINYBLOB" | "MEDIUMBLOB" | "LONGBLOB" | "BIT"
        | "GEOMETRY" => SqlValue::Bytes(row.try_get_unchecked::<Vec<u8>, _>(idx)?),
        _ => SqlValue::Text(row.try_get_unchecked::<String, _>(idx)?),
    };
    Ok(value)
}
