use dbbox_core::SqlValue;
use dbbox_db::DatasourceManager;
use serde::Serialize;

use crate::cli::GlobalFlags;
use crate::output::output;

#[derive(Debug, Serialize)]
struct SetResponse {
    table: String,
    key: SqlValue,
    column: String,
    value: SqlValue,
    flushed: bool,
}

#[derive(Debug, Serialize)]
struct DeleteResponse {
    table: String,
    key: SqlValue,
    rows_affected: u64,
}

/// Set a column and flush the row in one step.
pub async fn set(
    table: &str,
    id: &str,
    key: &str,
    column: &str,
    value: &str,
    db: &DatasourceManager,
    flags: &GlobalFlags,
) -> anyhow::Result<()> {
    let handle = db.table(table, id).await?;
    let key = SqlValue::parse_literal(key);
    let value = SqlValue::parse_literal(value);
    handle.set(key.clone(), column, value.clone()).await?;
    handle.update(key.clone()).await?;
    output(
        &SetResponse {
            table: table.to_string(),
            key,
            column: column.to_string(),
            value,
            flushed: true,
        },
        flags.format,
    )
}

pub async fn delete(
    table: &str,
    id: &str,
    key: &str,
    db: &DatasourceManager,
    flags: &GlobalFlags,
) -> anyhow::Result<()> {
    let handle = db.table(table, id).await?;
    let key = SqlValue::parse_literal(key);
    let rows_affected = handle.delete(key.clone()).await?;
    output(
        &DeleteResponse {
            table: table.to_string(),
            key,
            rows_affected,
        },
        flags.format,
    )
}
