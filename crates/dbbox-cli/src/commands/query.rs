use anyhow::Context;
use dbbox_db::DatasourceManager;
use serde::Serialize;

use crate::cli::GlobalFlags;
use crate::cli::root_commands::StatementArgs;
use crate::commands::shared::parse::parse_params;
use crate::output::{output, output_result};

#[derive(Debug, Serialize)]
struct ExecResponse {
    rows_affected: u64,
}

/// Handle `dbbox query`.
pub async fn handle_query(
    args: &StatementArgs,
    db: &DatasourceManager,
    flags: &GlobalFlags,
) -> anyhow::Result<()> {
    let params = parse_params(&args.params);
    let result = db
        .execute_query(&args.sql, &params)
        .await
        .context("query failed")?;
    output_result(&result, flags.format)
}

/// Handle `dbbox exec`.
pub async fn handle_exec(
    args: &StatementArgs,
    db: &DatasourceManager,
    flags: &GlobalFlags,
) -> anyhow::Result<()> {
    let params = parse_params(&args.params);
    let rows_affected = db
        .execute_update(&args.sql, &params)
        .await
        .context("statement failed")?;
    output(&ExecResponse { rows_affected }, flags.format)
}
