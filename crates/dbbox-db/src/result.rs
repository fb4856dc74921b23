//! Materialized query results.
//!
//! Rows are fully read before the connection goes back to the pool, so a
//! `QueryResult` has no cursor or statement to close. Column names are shared
//! between rows and looked up case-insensitively.

use std::sync::Arc;

use dbbox_core::{FromSqlValue, SqlValue};
use serde::Serialize;
use serde::ser::{SerializeMap, Serializer};

use crate::error::DatabaseError;

/// Name and server-reported type of a result column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Column {
    pub name: String,
    pub type_name: String,
}

impl Column {
    #[must_use]
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
        }
    }
}

fn position(columns: &[Column], name: &str) -> Option<usize> {
    columns
        .iter()
        .position(|c| c.name.eq_ignore_ascii_case(name))
}

/// Rows returned by a query.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    columns: Arc<[Column]>,
    rows: Vec<Row>,
}

impl QueryResult {
    /// Build a result from column metadata and row values.
    ///
    /// Rows shorter than the column list are padded with NULL and longer
    /// rows truncated, so every row has exactly one value per column.
    #[must_use]
    pub fn new(columns: Vec<Column>, rows: Vec<Vec<SqlValue>>) -> Self {
        let columns: Arc<[Column]> = columns.into();
        let rows = rows
            .into_iter()
            .map(|mut values| {
                values.resize(columns.len(), SqlValue::Null);
                Row {
                    columns: Arc::clone(&columns),
                    values,
                }
            })
            .collect();
        Self { columns, rows }
    }

    #[must_use]
    pub fn empty() -> Self {
        Self::new(Vec::new(), Vec::new())
    }

    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    #[must_use]
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Name of the column at a 0-based index.
    #[must_use]
    pub fn column_name(&self, index: usize) -> Option<&str> {
        self.columns.get(index).map(|c| c.name.as_str())
    }

    /// Server type name (e.g. `VARCHAR`, `BIGINT`) of the column at a 0-based index.
    #[must_use]
    pub fn column_type(&self, index: usize) -> Option<&str> {
        self.columns.get(index).map(|c| c.type_name.as_str())
    }

    #[must_use]
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[must_use]
    pub fn first(&self) -> Option<&Row> {
        self.rows.first()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Row> {
        self.rows.iter()
    }

    #[must_use]
    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }
}

impl IntoIterator for QueryResult {
    type Item = Row;
    type IntoIter = std::vec::IntoIter<Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}

impl<'a> IntoIterator for &'a QueryResult {
    type Item = &'a Row;
    type IntoIter = std::slice::Iter<'a, Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

impl Serialize for QueryResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(&self.rows)
    }
}

/// One result row.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<[Column]>,
    values: Vec<SqlValue>,
}

impl Row {
    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    #[must_use]
    pub fn values(&self) -> &[SqlValue] {
        &self.values
    }

    #[must_use]
    pub fn into_values(self) -> Vec<SqlValue> {
        self.values
    }

    #[must_use]
    pub fn index_of(&self, column: &str) -> Option<usize> {
        position(&self.columns, column)
    }

    /// Raw value of a named column.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::ColumnNotInResult` if the query did not select it.
    pub fn value(&self, column: &str) -> Result<&SqlValue, DatabaseError> {
        self.index_of(column)
            .and_then(|idx| self.values.get(idx))
            .ok_or_else(|| DatabaseError::ColumnNotInResult(column.to_string()))
    }

    /// Raw value at a 0-based index.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::ColumnNotInResult` if the index is out of range.
    pub fn value_at(&self, index: usize) -> Result<&SqlValue, DatabaseError> {
        self.values
            .get(index)
            .ok_or_else(|| DatabaseError::ColumnNotInResult(format!("#{index}")))
    }

    /// Typed value of a named column.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::ColumnNotInResult` for an unknown column, or
    /// `DatabaseError::Core` if the value is NULL or cannot be converted.
    pub fn get<T: FromSqlValue>(&self, column: &str) -> Result<T, DatabaseError> {
        Ok(self.value(column)?.to(column)?)
    }

    /// Typed value at a 0-based index.
    ///
    /// # Errors
    ///
    /// As [`Row::get`].
    pub fn get_at<T: FromSqlValue>(&self, index: usize) -> Result<T, DatabaseError> {
        let value = self.value_at(index)?;
        let name = self
            .columns
            .get(index)
            .map_or_else(|| format!("#{index}"), |c| c.name.clone());
        Ok(value.to(&name)?)
    }

    /// # Errors
    ///
    /// As [`Row::get`].
    pub fn get_string(&self, column: &str) -> Result<String, DatabaseError> {
        self.get(column)
    }

    /// # Errors
    ///
    /// As [`Row::get`].
    pub fn get_i32(&self, column: &str) -> Result<i32, DatabaseError> {
        self.get(column)
    }

    /// # Errors
    ///
    /// As [`Row::get`].
    pub fn get_i64(&self, column: &str) -> Result<i64, DatabaseError> {
        self.get(column)
    }

    /// # Errors
    ///
    /// As [`Row::get`].
    pub fn get_f32(&self, column: &str) -> Result<f32, DatabaseError> {
        self.get(column)
    }

    /// # Errors
    ///
    /// As [`Row::get`].
    pub fn get_f64(&self, column: &str) -> Result<f64, DatabaseError> {
        self.get(column)
    }

    /// # Errors
    ///
    /// As [`Row::get`].
    pub fn get_bool(&self, column: &str) -> Result<bool, DatabaseError> {
        self.get(column)
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (column, value) in self.columns.iter().zip(&self.values) {
            map.serialize_entry(&column.name, value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn user_result() -> QueryResult {
        QueryResult::new(
            vec![
                Column::new("id", "BIGINT"),
                Column::new("password", "VARCHAR"),
                Column::new("auto_login", "BOOLEAN"),
                Column::new("score", "DOUBLE"),
            ],
            vec![
                vec![
                    SqlValue::Int(1),
                    SqlValue::from("pw1"),
                    SqlValue::Bool(false),
                    SqlValue::Double(9.5),
                ],
                vec![
                    SqlValue::Int(2),
                    SqlValue::Null,
                    SqlValue::Bool(true),
                    SqlValue::Double(1.0),
                ],
            ],
        )
    }

    #[test]
    fn column_metadata() {
        let result = user_result();
        assert_eq!(result.column_count(), 4);
        assert_eq!(result.column_name(0), Some("id"));
        assert_eq!(result.column_type(2), Some("BOOLEAN"));
        assert_eq!(result.column_name(4), None);
        assert_eq!(result.len(), 2);
        assert!(!result.is_empty());
    }

    #[test]
    fn typed_getters() {
        let result = user_result();
        let row = result.first().unwrap();
        assert_eq!(row.get_i64("id").unwrap(), 1);
        assert_eq!(row.get_i32("ID").unwrap(), 1);
        assert_eq!(row.get_string("password").unwrap(), "pw1");
        assert!(!row.get_bool("auto_login").unwrap());
        assert!((row.get_f64("score").unwrap() - 9.5).abs() < f64::EPSILON);
        assert!((row.get_f32("score").unwrap() - 9.5).abs() < f32::EPSILON);
        assert_eq!(row.get_at::<i64>(0).unwrap(), 1);
    }

    #[test]
    fn null_and_missing_columns() {
        let result = user_result();
        let row = &result.rows()[1];
        assert_eq!(row.get::<Option<String>>("password").unwrap(), None);
        assert!(matches!(
            row.get_string("password"),
            Err(DatabaseError::Core(dbbox_core::CoreError::UnexpectedNull { .. }))
        ));
        assert!(matches!(
            row.get_string("email"),
            Err(DatabaseError::ColumnNotInResult(ref c)) if c == "email"
        ));
        assert!(row.value_at(9).is_err());
    }

    #[test]
    fn short_rows_are_padded() {
        let result = QueryResult::new(
            vec![Column::new("a", "INT"), Column::new("b", "INT")],
            vec![vec![SqlValue::Int(1)]],
        );
        assert_eq!(result.rows()[0].values(), &[SqlValue::Int(1), SqlValue::Null]);
    }

    #[test]
    fn serializes_rows_as_objects() {
        let json = serde_json::to_value(user_result()).unwrap();
        assert_eq!(
            json,
            serde_json::json!([
                {"id": 1, "password": "pw1", "auto_login": false, "score": 9.5},
                {"id": 2, "password": null, "auto_login": true, "score": 1.0},
            ])
        );
    }

    #[test]
    fn iterates_by_reference_and_value() {
        let result = user_result();
        let ids: Vec<i64> = (&result).into_iter().map(|r| r.get_i64("id").unwrap()).collect();
        assert_eq!(ids, vec![1, 2]);
        let owned: Vec<Row> = result.into_iter().collect();
        assert_eq!(owned.len(), 2);
    }
}
