use dbbox_db::DatasourceManager;

use crate::cli::GlobalFlags;
use crate::output::output;

/// Handle `dbbox status`.
pub fn handle(db: &DatasourceManager, flags: &GlobalFlags) -> anyhow::Result<()> {
    output(&db.status(), flags.format)
}
