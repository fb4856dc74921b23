use dbbox_db::DatasourceManager;

use crate::cli::GlobalFlags;
use crate::cli::root_commands::Commands;
use crate::commands;

/// Dispatch a parsed command to the corresponding handler module.
pub async fn dispatch(
    command: Commands,
    db: &DatasourceManager,
    flags: &GlobalFlags,
) -> anyhow::Result<()> {
    match command {
        Commands::Ping => commands::ping::handle(db, flags).await,
        Commands::Status => commands::status::handle(db, flags),
        Commands::Query(args) => commands::query::handle_query(&args, db, flags).await,
        Commands::Exec(args) => commands::query::handle_exec(&args, db, flags).await,
        Commands::Table { action } => commands::table::handle(action, db, flags).await,
    }
}
