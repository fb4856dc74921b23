use dbbox_core::ColumnType;
use dbbox_db::DatasourceManager;
use serde::Serialize;

use crate::cli::GlobalFlags;
use crate::output::output;

#[derive(Debug, Serialize)]
struct CreateResponse {
    table: String,
    columns: usize,
    primary_key: Option<String>,
}

pub async fn run(
    name: &str,
    columns: Vec<(String, ColumnType)>,
    primary_key: Option<&str>,
    db: &DatasourceManager,
    flags: &GlobalFlags,
) -> anyhow::Result<()> {
    let count = columns.len();
    let mut builder = db.create_table(name);
    for (column, column_type) in columns {
        builder = builder.add_column(column, column_type);
    }
    if let Some(key) = primary_key {
        builder = builder.primary_key(key);
    }
    builder.create().await?;

    output(
        &CreateResponse {
            table: name.to_string(),
            columns: count,
            primary_key: primary_key.map(str::to_string),
        },
        flags.format,
    )
}
