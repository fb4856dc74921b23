use dbbox_core::{SqlValue, quote_identifier};

use super::{quoted_list, upsert_pair};
use crate::connection::Connector;
use crate::error::DatabaseError;
use crate::manager::DatasourceManager;
use crate::mysql::MySqlConnector;
use crate::statement::Statement;

/// `INSERT` of one row, optionally as an upsert.
#[must_use]
pub struct InsertBuilder<C: Connector = MySqlConnector> {
    manager: DatasourceManager<C>,
    table: String,
    values: Vec<(String, SqlValue)>,
    upsert_skip: Option<Vec<String>>,
}

impl<C: Connector> InsertBuilder<C> {
    pub(crate) fn new(manager: DatasourceManager<C>, table: impl Into<String>) -> Self {
        Self {
            manager,
            table: table.into(),
            values: Vec::new(),
            upsert_skip: None,
        }
    }

    pub fn value(mut self, column: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        upsert_pair(&mut self.values, column.into(), value.into());
        self
    }

    /// On a duplicate key, update every inserted column instead of failing.
    pub fn on_duplicate_update(mut self) -> Self {
        self.upsert_skip = Some(Vec::new());
        self
    }

    /// As [`Self::on_duplicate_update`], leaving `key` untouched on update.
    pub fn on_duplicate_update_except(mut self, key: impl Into<String>) -> Self {
        self.upsert_skip = Some(vec![key.into()]);
        self
    }

    /// # Errors
    ///
    /// `DatabaseError::InvalidState` without any values; `DatabaseError::Core`
    /// for an invalid identifier.
    pub fn build(&self) -> Result<Statement, DatabaseError> {
        if self.values.is_empty() {
            return Err(DatabaseError::InvalidState(format!(
                "insert into '{}' has no values",
                self.table
            )));
        }
        let columns = quoted_list(self.values.iter().map(|(c, _)| c.as_str()))?;
        let placeholders = vec!["?"; self.values.len()].join(", ");
        let mut sql = format!(
            "INSERT INTO {} ({columns}) VALUES ({placeholders})",
            quote_identifier(&self.table)?
        );
        let mut params: Vec<SqlValue> = self.values.iter().map(|(_, v)| v.clone()).collect();

        if let Some(skip) = &self.upsert_skip {
            let updated: Vec<&(String, SqlValue)> = self
                .values
                .iter()
                .filter(|(c, _)| !skip.iter().any(|s| s.eq_ignore_ascii_case(c)))
                .collect();
            // Only the key was inserted; a no-op assignment keeps the statement valid.
            if updated.is_empty() {
                let key = quote_identifier(&self.values[0].0)?;
                sql.push_str(&format!(" ON DUPLICATE KEY UPDATE {key} = {key}"));
            } else {
                sql.push_str(" ON DUPLICATE KEY UPDATE ");
                for (i, (column, value)) in updated.into_iter().enumerate() {
                    if i > 0 {
                        sql.push_str(", ");
                    }
                    sql.push_str(&quote_identifier(column)?);
                    sql.push_str(" = ?");
                    params.push(value.clone());
                }
            }
        }
        Ok(Statement::new(sql, params))
    }

    /// Run the insert; returns the number of rows affected.
    ///
    /// # Errors
    ///
    /// As [`Self::build`], plus any error from running the statement.
    pub async fn execute(self) -> Result<u64, DatabaseError> {
        let statement = self.build()?;
        self.manager
            .execute_update(&statement.sql, &statement.params)
            .await
    }
}
