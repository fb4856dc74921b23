//! Statement builders.
//!
//! Builders collect identifiers and values without failing; `build()`
//! validates every identifier and renders a [`Statement`] with `?`
//! placeholders, and `execute()` runs it through the manager's retry loop.

mod insert;
mod select;
mod update;

pub use insert::InsertBuilder;
pub use select::SelectBuilder;
pub use update::UpdateBuilder;

use dbbox_core::{SqlValue, quote_identifier};

use crate::error::DatabaseError;
use crate::statement::count_placeholders;

#[derive(Debug, Clone, PartialEq)]
enum Condition {
    Eq(String, SqlValue),
    Raw(String, Vec<SqlValue>),
}

/// Append ` WHERE ...` for `conditions`, joined with `AND`.
fn render_where(
    conditions: &[Condition],
    sql: &mut String,
    params: &mut Vec<SqlValue>,
) -> Result<(), DatabaseError> {
    for (i, condition) in conditions.iter().enumerate() {
        sql.push_str(if i == 0 { " WHERE " } else { " AND " });
        match condition {
            Condition::Eq(column, SqlValue::Null) => {
                sql.push_str(&quote_identifier(column)?);
                sql.push_str(" IS NULL");
            }
            Condition::Eq(column, value) => {
                sql.push_str(&quote_identifier(column)?);
                sql.push_str(" = ?");
                params.push(value.clone());
            }
            Condition::Raw(clause, values) => {
                let expected = count_placeholders(clause);
                if expected != values.len() {
                    return Err(DatabaseError::InvalidState(format!(
                        "where clause '{clause}' has {expected} placeholders but {} parameters",
                        values.len()
                    )));
                }
                sql.push('(');
                sql.push_str(clause);
                sql.push(')');
                params.extend(values.iter().cloned());
            }
        }
    }
    Ok(())
}

/// Insert or replace `(column, value)`, keeping the original position.
fn upsert_pair(pairs: &mut Vec<(String, SqlValue)>, column: String, value: SqlValue) {
    match pairs.iter_mut().find(|(c, _)| c.eq_ignore_ascii_case(&column)) {
        Some(slot) => slot.1 = value,
        None => pairs.push((column, value)),
    }
}

fn quoted_list<'a>(names: impl IntoIterator<Item = &'a str>) -> Result<String, DatabaseError> {
    let quoted = names
        .into_iter()
        .map(quote_identifier)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(quoted.join(", "))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn where_clause_rendering() {
        let mut sql = String::from("SELECT * FROM `user`");
        let mut params = Vec::new();
        render_where(
            &[
                Condition::Eq("auto_login".into(), SqlValue::Int(0)),
                Condition::Eq("deleted_at".into(), SqlValue::Null),
                Condition::Raw("`age` > ? OR `age` < ?".into(), vec![
                    SqlValue::Int(60),
                    SqlValue::Int(18),
                ]),
            ],
            &mut sql,
            &mut params,
        )
        .unwrap();
        assert_eq!(
            sql,
            "SELECT * FROM `user` WHERE `auto_login` = ? AND `deleted_at` IS NULL AND (`age` > ? OR `age` < ?)"
        );
        assert_eq!(params, vec![
            SqlValue::Int(0),
            SqlValue::Int(60),
            SqlValue::Int(18)
        ]);
    }

    #[test]
    fn placeholder_mismatch_is_rejected() {
        let mut sql = String::new();
        let err = render_where(
            &[Condition::Raw("`id` = ? AND `land` = ?".into(), vec![SqlValue::Int(1)])],
            &mut sql,
            &mut Vec::new(),
        )
        .unwrap_err();
        assert!(matches!(err, DatabaseError::InvalidState(_)));
    }

    #[test]
    fn injected_column_names_are_rejected() {
        let err = render_where(
            &[Condition::Eq("id; DROP TABLE user".into(), SqlValue::Int(1))],
            &mut String::new(),
            &mut Vec::new(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            DatabaseError::Core(dbbox_core::CoreError::InvalidIdentifier { .. })
        ));
    }

    #[test]
    fn upsert_pair_keeps_position() {
        let mut pairs = Vec::new();
        upsert_pair(&mut pairs, "a".into(), SqlValue::Int(1));
        upsert_pair(&mut pairs, "b".into(), SqlValue::Int(2));
        upsert_pair(&mut pairs, "A".into(), SqlValue::Int(3));
        assert_eq!(pairs, vec![
            ("a".to_string(), SqlValue::Int(3)),
            ("b".to_string(), SqlValue::Int(2)),
        ]);
    }
}
