//! `CREATE TABLE` builder.

use dbbox_core::{ColumnType, quote_identifier};

use crate::connection::Connector;
use crate::error::DatabaseError;
use crate::manager::DatasourceManager;
use crate::mysql::MySqlConnector;

/// Declares a table column by column.
///
/// ```no_run
/// # async fn demo(db: dbbox_db::DatasourceManager) -> Result<(), dbbox_db::DatabaseError> {
/// db.create_table("user")
///     .add_int("id")
///     .add_string("password")
///     .add_boolean("auto_login")
///     .primary_key("id")
///     .create()
///     .await?;
/// # Ok(()) }
/// ```
#[must_use]
pub struct TableBuilder<C: Connector = MySqlConnector> {
    manager: DatasourceManager<C>,
    name: String,
    columns: Vec<(String, ColumnType)>,
    primary_key: Option<String>,
}

impl<C: Connector> TableBuilder<C> {
    pub(crate) fn new(manager: DatasourceManager<C>, name: impl Into<String>) -> Self {
        Self {
            manager,
            name: name.into(),
            columns: Vec::new(),
            primary_key: None,
        }
    }

    pub fn add_column(mut self, name: impl Into<String>, column_type: ColumnType) -> Self {
        self.columns.push((name.into(), column_type));
        self
    }

    pub fn add_string(self, name: impl Into<String>) -> Self {
        self.add_column(name, ColumnType::String)
    }

    pub fn add_int(self, name: impl Into<String>) -> Self {
        self.add_column(name, ColumnType::Int)
    }

    pub fn add_long(self, name: impl Into<String>) -> Self {
        self.add_column(name, ColumnType::Long)
    }

    pub fn add_float(self, name: impl Into<String>) -> Self {
        self.add_column(name, ColumnType::Float)
    }

    pub fn add_double(self, name: impl Into<String>) -> Self {
        self.add_column(name, ColumnType::Double)
    }

    pub fn add_boolean(self, name: impl Into<String>) -> Self {
        self.add_column(name, ColumnType::Boolean)
    }

    pub fn primary_key(mut self, column: impl Into<String>) -> Self {
        self.primary_key = Some(column.into());
        self
    }

    /// Render the `CREATE TABLE IF NOT EXISTS` statement.
    ///
    /// # Errors
    ///
    /// `DatabaseError::Core` for an invalid table or column name;
    /// `DatabaseError::InvalidState` for no columns or a duplicate column;
    /// `DatabaseError::UnknownColumn` for a primary key that was not declared.
    pub fn build(&self) -> Result<String, DatabaseError> {
        let table = quote_identifier(&self.name)?;
        if self.columns.is_empty() {
            return Err(DatabaseError::InvalidState(format!(
                "table '{}' declares no columns",
                self.name
            )));
        }

        let mut definitions = Vec::with_capacity(self.columns.len() + 1);
        for (i, (name, column_type)) in self.columns.iter().enumerate() {
            if self.columns[..i]
                .iter()
                .any(|(other, _)| other.eq_ignore_ascii_case(name))
            {
                return Err(DatabaseError::InvalidState(format!(
                    "column '{name}' declared twice in table '{}'",
                    self.name
                )));
            }
            definitions.push(format!(
                "{} {}",
                quote_identifier(name)?,
                column_type.mysql_type()
            ));
        }

        if let Some(key) = &self.primary_key {
            if !self.columns.iter().any(|(c, _)| c.eq_ignore_ascii_case(key)) {
                return Err(DatabaseError::UnknownColumn {
                    table: self.name.clone(),
                    column: key.clone(),
                });
            }
            definitions.push(format!("PRIMARY KEY ({})", quote_identifier(key)?));
        }

        Ok(format!(
            "CREATE TABLE IF NOT EXISTS {table} ({})",
            definitions.join(", ")
        ))
    }

    /// Create the table if it does not exist.
    ///
    /// # Errors
    ///
    /// As [`Self::build`], plus any error from running the statement.
    pub async fn create(self) -> Result<(), DatabaseError> {
        let sql = self.build()?;
        self.manager.execute_update(&sql, &[]).await?;
        tracing::info!(table = %self.name, "table ensured");
        Ok(())
    }
}
