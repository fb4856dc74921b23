use std::time::Instant;

use dbbox_db::DatasourceManager;
use serde::Serialize;

use crate::cli::GlobalFlags;
use crate::output::output;

#[derive(Debug, Serialize)]
struct PingResponse {
    status: &'static str,
    elapsed_ms: u128,
}

/// Handle `dbbox ping`.
pub async fn handle(db: &DatasourceManager, flags: &GlobalFlags) -> anyhow::Result<()> {
    let started = Instant::now();
    db.ping().await?;
    output(
        &PingResponse {
            status: "ok",
            elapsed_ms: started.elapsed().as_millis(),
        },
        flags.format,
    )
}
