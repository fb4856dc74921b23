//! Table handles with a row cache keyed by an identifier column.
//!
//! `get` reads through the cache, `set` changes cached rows and marks them
//! dirty, and `update` writes a dirty row back with an upsert. Clean rows
//! expire after the configured TTL; dirty rows stay until flushed or unloaded.

mod cache;
mod schema;

pub use schema::TableBuilder;

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use dbbox_core::{SqlValue, quote_identifier, validate_identifier};
use serde::Serialize;
use tracing::debug;

use crate::builders::{InsertBuilder, SelectBuilder, UpdateBuilder};
use crate::connection::Connector;
use crate::error::DatabaseError;
use crate::manager::DatasourceManager;
use crate::mysql::MySqlConnector;
use crate::result::QueryResult;

use cache::RowCache;

const COLUMNS_SQL: &str = "SELECT COLUMN_NAME AS column_name, DATA_TYPE AS data_type \
     FROM information_schema.columns \
     WHERE table_schema = DATABASE() AND table_name = ? \
     ORDER BY ordinal_position";

const INTEGER_TYPES: [&str; 6] = ["tinyint", "smallint", "mediumint", "int", "integer", "bigint"];

/// A column as reported by `information_schema`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableColumn {
    pub name: String,
    /// Lowercase MySQL data type, e.g. `varchar` or `int`.
    pub data_type: String,
}

pub struct Table<C: Connector = MySqlConnector> {
    manager: DatasourceManager<C>,
    name: String,
    identifier: String,
    columns: Vec<TableColumn>,
    cache: Mutex<RowCache>,
}

impl<C: Connector> std::fmt::Debug for Table<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Table")
            .field("name", &self.name)
            .field("identifier", &self.identifier)
            .field("columns", &self.columns)
            .finish_non_exhaustive()
    }
}

impl<C: Connector> Table<C> {
    /// Discover the table's columns and return a handle.
    ///
    /// # Errors
    ///
    /// `DatabaseError::UnknownTable` if the current database has no such
    /// table, `DatabaseError::UnknownColumn` if `identifier` is not one of its
    /// columns, or any error from the lookup query.
    pub async fn open(
        manager: DatasourceManager<C>,
        name: &str,
        identifier: &str,
    ) -> Result<Self, DatabaseError> {
        validate_identifier(name)?;
        validate_identifier(identifier)?;

        let result = manager
            .execute_query(COLUMNS_SQL, &[SqlValue::from(name)])
            .await?;
        let columns = result
            .iter()
            .map(|row| {
                Ok(TableColumn {
                    name: row.get_string("column_name")?,
                    data_type: row.get_string("data_type")?.to_ascii_lowercase(),
                })
            })
            .collect::<Result<Vec<_>, DatabaseError>>()?;

        if columns.is_empty() {
            return Err(DatabaseError::UnknownTable(name.to_string()));
        }
        let identifier = columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(identifier))
            .map(|c| c.name.clone())
            .ok_or_else(|| DatabaseError::UnknownColumn {
                table: name.to_string(),
                column: identifier.to_string(),
            })?;

        debug!(table = name, identifier = %identifier, columns = columns.len(), "opened table");
        let ttl = manager.cache_ttl();
        Ok(Self {
            manager,
            name: name.to_string(),
            identifier,
            columns,
            cache: Mutex::new(RowCache::new(ttl)),
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The key column rows are cached by.
    #[must_use]
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    #[must_use]
    pub fn columns(&self) -> &[TableColumn] {
        &self.columns
    }

    fn lock_cache(&self) -> MutexGuard<'_, RowCache> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn column_index(&self, column: &str) -> Result<usize, DatabaseError> {
        self.columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(column))
            .ok_or_else(|| DatabaseError::UnknownColumn {
                table: self.name.clone(),
                column: column.to_string(),
            })
    }

    fn identifier_index(&self) -> usize {
        self.columns
            .iter()
            .position(|c| c.name == self.identifier)
            .unwrap_or_default()
    }

    /// Cache key for `key` in the identifier column's type, so `1` and `"1"`
    /// address the same row of an integer-keyed table.
    fn cache_key(&self, key: &SqlValue) -> String {
        let data_type = self.columns[self.identifier_index()].data_type.as_str();
        if INTEGER_TYPES.contains(&data_type) {
            if let Ok(n) = key.to::<i64>(&self.identifier) {
                return n.to_string();
            }
        }
        match key {
            SqlValue::Text(text) => text.clone(),
            other => other.to_string(),
        }
    }

    /// Read the row for `key` from the server, in column order.
    async fn load_row(&self, key: &SqlValue) -> Result<Option<Vec<SqlValue>>, DatabaseError> {
        let result = self
            .select()
            .columns(self.columns.iter().map(|c| c.name.clone()))
            .where_eq(self.identifier.clone(), key.clone())
            .limit(1)
            .execute()
            .await?;
        let Some(row) = result.first() else {
            return Ok(None);
        };
        let values = self
            .columns
            .iter()
            .map(|c| row.value(&c.name).cloned())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Some(values))
    }

    /// Whether a row for `key` is currently cached.
    #[must_use]
    pub fn is_loaded(&self, key: impl Into<SqlValue>) -> bool {
        self.lock_cache().contains(&self.cache_key(&key.into()))
    }

    /// Whether the server has a row for `key`. Ignores the cache.
    ///
    /// # Errors
    ///
    /// Any error from the query.
    pub async fn exists(&self, key: impl Into<SqlValue>) -> Result<bool, DatabaseError> {
        let result = self
            .select()
            .columns([self.identifier.clone()])
            .where_eq(self.identifier.clone(), key)
            .limit(1)
            .execute()
            .await?;
        Ok(!result.is_empty())
    }

    /// Value of `column` for the row with `key`, loading the row if needed.
    ///
    /// # Errors
    ///
    /// `DatabaseError::UnknownColumn` for a column the table lacks,
    /// `DatabaseError::NoResult` if no row has `key`, or any query error.
    pub async fn get(
        &self,
        key: impl Into<SqlValue>,
        column: &str,
    ) -> Result<SqlValue, DatabaseError> {
        let key = key.into();
        let idx = self.column_index(column)?;
        let cache_key = self.cache_key(&key);

        let cached = self
            .lock_cache()
            .fresh(&cache_key, Instant::now())
            .map(|entry| entry.values[idx].clone());
        if let Some(value) = cached {
            return Ok(value);
        }

        let values = self.load_row(&key).await?.ok_or(DatabaseError::NoResult)?;
        let value = values[idx].clone();
        self.lock_cache()
            .insert_loaded(cache_key, values, Instant::now());
        Ok(value)
    }

    /// Change `column` of the row with `key` in the cache.
    ///
    /// A key with no row yet starts a new entry holding only the key; it is
    /// inserted on [`Self::update`].
    ///
    /// # Errors
    ///
    /// `DatabaseError::UnknownColumn` for a column the table lacks,
    /// `DatabaseError::InvalidState` when `column` is the identifier, or any
    /// error from loading the row.
    pub async fn set(
        &self,
        key: impl Into<SqlValue>,
        column: &str,
        value: impl Into<SqlValue>,
    ) -> Result<(), DatabaseError> {
        let key = key.into();
        let idx = self.column_index(column)?;
        if idx == self.identifier_index() {
            return Err(DatabaseError::InvalidState(format!(
                "cannot change identifier column '{}' of table '{}'",
                self.identifier, self.name
            )));
        }
        let cache_key = self.cache_key(&key);
        let value = value.into();

        {
            let mut cache = self.lock_cache();
            if let Some(entry) = cache.fresh_mut(&cache_key, Instant::now()) {
                entry.values[idx] = value;
                entry.dirty = true;
                return Ok(());
            }
        }

        let values = match self.load_row(&key).await? {
            Some(values) => values,
            None => {
                let mut values = vec![SqlValue::Null; self.columns.len()];
                values[self.identifier_index()] = key;
                values
            }
        };
        // Another task may have cached the row while it loaded; its entry wins.
        let mut cache = self.lock_cache();
        let entry = cache.fresh_or_insert(cache_key, values, Instant::now());
        entry.values[idx] = value;
        entry.dirty = true;
        Ok(())
    }

    /// Write the cached row for `key` back and evict it.
    ///
    /// # Errors
    ///
    /// `DatabaseError::NotCached` if no row for `key` is cached, or any error
    /// from the write. A failed write leaves the entry cached.
    pub async fn update(&self, key: impl Into<SqlValue>) -> Result<(), DatabaseError> {
        let cache_key = self.cache_key(&key.into());
        let entry = self
            .lock_cache()
            .remove(&cache_key)
            .ok_or_else(|| DatabaseError::NotCached {
                table: self.name.clone(),
                key: cache_key.clone(),
            })?;
        if !entry.dirty {
            debug!(table = %self.name, key = %cache_key, "flushed clean entry");
            return Ok(());
        }

        let mut insert = self.insert();
        for (column, value) in self.columns.iter().zip(&entry.values) {
            insert = insert.value(column.name.clone(), value.clone());
        }
        let result = insert
            .on_duplicate_update_except(self.identifier.clone())
            .execute()
            .await;
        if let Err(e) = result {
            self.lock_cache().restore(cache_key, entry);
            return Err(e);
        }
        debug!(table = %self.name, key = %cache_key, "flushed entry");
        Ok(())
    }

    /// Forget the cached row for `key`, discarding unsaved changes.
    pub fn unload(&self, key: impl Into<SqlValue>) -> bool {
        let cache_key = self.cache_key(&key.into());
        match self.lock_cache().remove(&cache_key) {
            Some(entry) => {
                if entry.dirty {
                    debug!(table = %self.name, key = %cache_key, "unloaded unsaved entry");
                }
                true
            }
            None => false,
        }
    }

    pub fn clear_cache(&self) {
        self.lock_cache().clear();
    }

    /// Drop expired clean rows; returns how many were dropped.
    pub fn evict_expired(&self) -> usize {
        self.lock_cache().evict_expired(Instant::now())
    }

    /// Cached rows with unsaved changes.
    #[must_use]
    pub fn dirty_count(&self) -> usize {
        self.lock_cache().dirty_count()
    }

    /// Delete the row for `key` and evict it; returns rows affected.
    ///
    /// # Errors
    ///
    /// Any error from the statement.
    pub async fn delete(&self, key: impl Into<SqlValue>) -> Result<u64, DatabaseError> {
        let key = key.into();
        let sql = format!(
            "DELETE FROM {} WHERE {} = ?",
            quote_identifier(&self.name)?,
            quote_identifier(&self.identifier)?
        );
        let affected = self
            .manager
            .execute_update(&sql, std::slice::from_ref(&key))
            .await?;
        let cache_key = self.cache_key(&key);
        self.lock_cache().remove(&cache_key);
        Ok(affected)
    }

    /// Identifier values of rows whose `column` equals `value`.
    ///
    /// # Errors
    ///
    /// `DatabaseError::UnknownColumn` for a column the table lacks, or any
    /// query error.
    pub async fn filter(
        &self,
        column: &str,
        value: impl Into<SqlValue>,
    ) -> Result<Vec<SqlValue>, DatabaseError> {
        self.column_index(column)?;
        let result = self
            .select()
            .columns([self.identifier.clone()])
            .where_eq(column, value)
            .execute()
            .await?;
        result
            .iter()
            .map(|row| row.value_at(0).cloned())
            .collect()
    }

    /// Parameterized select on this table. No `columns` selects all of them.
    ///
    /// # Errors
    ///
    /// `DatabaseError::UnknownColumn` for a column the table lacks, or any
    /// query error.
    pub async fn select_where(
        &self,
        columns: &[&str],
        column: &str,
        value: impl Into<SqlValue>,
    ) -> Result<QueryResult, DatabaseError> {
        for name in columns.iter().chain(std::iter::once(&column)) {
            self.column_index(name)?;
        }
        self.select()
            .columns(columns.iter().copied())
            .where_eq(column, value)
            .execute()
            .await
    }

    pub fn select(&self) -> SelectBuilder<C> {
        self.manager.select(&self.name)
    }

    pub fn update_builder(&self) -> UpdateBuilder<C> {
        self.manager.update(&self.name)
    }

    pub fn insert(&self) -> InsertBuilder<C> {
        self.manager.insert(&self.name)
    }
}
