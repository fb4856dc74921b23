use dbbox_core::{SqlValue, quote_identifier};

use super::{Condition, render_where, upsert_pair};
use crate::connection::Connector;
use crate::error::DatabaseError;
use crate::manager::DatasourceManager;
use crate::mysql::MySqlConnector;
use crate::statement::Statement;

/// `UPDATE` on one table.
#[must_use]
pub struct UpdateBuilder<C: Connector = MySqlConnector> {
    manager: DatasourceManager<C>,
    table: String,
    assignments: Vec<(String, SqlValue)>,
    conditions: Vec<Condition>,
}

impl<C: Connector> UpdateBuilder<C> {
    pub(crate) fn new(manager: DatasourceManager<C>, table: impl Into<String>) -> Self {
        Self {
            manager,
            table: table.into(),
            assignments: Vec::new(),
            conditions: Vec::new(),
        }
    }

    /// Assign a column. Setting the same column again replaces the value.
    pub fn set(mut self, column: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        upsert_pair(&mut self.assignments, column.into(), value.into());
        self
    }

    pub fn where_eq(mut self, column: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        self.conditions
            .push(Condition::Eq(column.into(), value.into()));
        self
    }

    /// A raw condition with `?` placeholders, one per parameter.
    pub fn where_clause(mut self, clause: impl Into<String>, params: Vec<SqlValue>) -> Self {
        self.conditions.push(Condition::Raw(clause.into(), params));
        self
    }

    /// # Errors
    ///
    /// `DatabaseError::InvalidState` without any `set`, or for a placeholder
    /// count mismatch; `DatabaseError::Core` for an invalid identifier.
    pub fn build(&self) -> Result<Statement, DatabaseError> {
        if self.assignments.is_empty() {
            return Err(DatabaseError::InvalidState(format!(
                "update of '{}' sets no columns",
                self.table
            )));
        }
        let mut sql = format!("UPDATE {} SET ", quote_identifier(&self.table)?);
        let mut params = Vec::with_capacity(self.assignments.len());
        for (i, (column, value)) in self.assignments.iter().enumerate() {
            if i > 0 {
                sql.push_str(", ");
            }
            sql.push_str(&quote_identifier(column)?);
            sql.push_str(" = ?");
            params.push(value.clone());
        }
        render_where(&self.conditions, &mut sql, &mut params)?;
        Ok(Statement::new(sql, params))
    }

    /// Run the update; returns the number of rows affected.
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
