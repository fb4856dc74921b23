use dbbox_core::{SortOrder, SqlValue, quote_identifier};

use super::{Condition, render_where};
use crate::connection::Connector;
use crate::error::DatabaseError;
use crate::manager::DatasourceManager;
use crate::mysql::MySqlConnector;
use crate::result::QueryResult;
use crate::statement::Statement;

/// `SELECT` on one table.
///
/// ```no_run
/// # async fn demo(db: dbbox_db::DatasourceManager) -> Result<(), dbbox_db::DatabaseError> {
/// let rows = db
///     .select("user")
///     .columns(["id", "password"])
///     .where_eq("auto_login", 0)
///     .and("land", "Deutschland")
///     .execute()
///     .await?;
/// # Ok(()) }
/// ```
#[must_use]
pub struct SelectBuilder<C: Connector = MySqlConnector> {
    manager: DatasourceManager<C>,
    table: String,
    columns: Vec<String>,
    conditions: Vec<Condition>,
    order: Vec<(String, SortOrder)>,
    limit: Option<u64>,
}

impl<C: Connector> SelectBuilder<C> {
    pub(crate) fn new(manager: DatasourceManager<C>, table: impl Into<String>) -> Self {
        Self {
            manager,
            table: table.into(),
            columns: Vec::new(),
            conditions: Vec::new(),
            order: Vec::new(),
            limit: None,
        }
    }

    /// Columns to return. Not calling this selects `*`.
    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns.extend(columns.into_iter().map(Into::into));
        self
    }

    /// `column = value`, or `column IS NULL` for a NULL value.
    pub fn where_eq(mut self, column: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        self.conditions
            .push(Condition::Eq(column.into(), value.into()));
        self
    }

    /// Another equality condition, joined with `AND`.
    pub fn and(self, column: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        self.where_eq(column, value)
    }

    /// A raw condition with `?` placeholders, one per parameter.
    pub fn where_clause(mut self, clause: impl Into<String>, params: Vec<SqlValue>) -> Self {
        self.conditions.push(Condition::Raw(clause.into(), params));
        self
    }

    pub fn order_by(mut self, column: impl Into<String>, order: SortOrder) -> Self {
        self.order.push((column.into(), order));
        self
    }

    pub const fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// # Errors
    ///
    /// Returns `DatabaseError::Core` for an invalid identifier, or
    /// `DatabaseError::InvalidState` for a placeholder count mismatch.
    pub fn build(&self) -> Result<Statement, DatabaseError> {
        let columns = if self.columns.is_empty() {
            "*".to_string()
        } else {
            self.columns
                .iter()
                .map(|c| {
                    if c == "*" {
                        Ok(c.clone())
                    } else {
                        quote_identifier(c)
                    }
                })
                .collect::<Result<Vec<_>, _>>()?
                .join(", ")
        };

        let mut sql = format!("SELECT {columns} FROM {}", quote_identifier(&self.table)?);
        let mut params = Vec::new();
        render_where(&self.conditions, &mut sql, &mut params)?;

        for (i, (column, order)) in self.order.iter().enumerate() {
            sql.push_str(if i == 0 { " ORDER BY " } else { ", " });
            sql.push_str(&quote_identifier(column)?);
            sql.push(' ');
            sql.push_str(order.as_sql());
        }
        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        Ok(Statement::new(sql, params))
    }

    /// # Errors
    ///
    /// As [`Self::build`], plus any error from running the query.
    pub async fn execute(self) -> Result<QueryResult, DatabaseError> {
        let statement = self.build()?;
        self.manager
            .execute_query(&statement.sql, &statement.params)
            .await
    }
}
