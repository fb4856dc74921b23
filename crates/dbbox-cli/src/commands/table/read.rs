use std::collections::BTreeMap;

use dbbox_core::SqlValue;
use dbbox_db::DatasourceManager;
use serde::Serialize;

use crate::cli::GlobalFlags;
use crate::output::output;

#[derive(Debug, Serialize)]
struct ValueResponse {
    table: String,
    key: SqlValue,
    column: String,
    value: SqlValue,
}

#[derive(Debug, Serialize)]
struct ExistsResponse {
    table: String,
    key: SqlValue,
    exists: bool,
}

pub async fn get(
    table: &str,
    id: &str,
    key: &str,
    column: &str,
    db: &DatasourceManager,
    flags: &GlobalFlags,
) -> anyhow::Result<()> {
    let handle = db.table(table, id).await?;
    let key = SqlValue::parse_literal(key);
    let value = handle.get(key.clone(), column).await?;
    output(
        &ValueResponse {
            table: table.to_string(),
            key,
            column: column.to_string(),
            value,
        },
        flags.format,
    )
}

pub async fn exists(
    table: &str,
    id: &str,
    key: &str,
    db: &DatasourceManager,
    flags: &GlobalFlags,
) -> anyhow::Result<()> {
    let handle = db.table(table, id).await?;
    let key = SqlValue::parse_literal(key);
    let exists = handle.exists(key.clone()).await?;
    output(
        &ExistsResponse {
            table: table.to_string(),
            key,
            exists,
        },
        flags.format,
    )
}

/// Prints one `{identifier: key}` row per match.
pub async fn filter(
    table: &str,
    id: &str,
    column: &str,
    value: &str,
    db: &DatasourceManager,
    flags: &GlobalFlags,
) -> anyhow::Result<()> {
    let handle = db.table(table, id).await?;
    let keys = handle
        .filter(column, SqlValue::parse_literal(value))
        .await?;
    let rows = keys
        .into_iter()
        .map(|key| BTreeMap::from([(handle.identifier().to_string(), key)]))
        .collect::<Vec<_>>();
    output(&rows, flags.format)
}

pub async fn columns(
    table: &str,
    id: &str,
    db: &DatasourceManager,
    flags: &GlobalFlags,
) -> anyhow::Result<()> {
    let handle = db.table(table, id).await?;
    output(&handle.columns(), flags.format)
}
