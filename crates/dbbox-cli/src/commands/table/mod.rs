use dbbox_db::DatasourceManager;

use crate::cli::GlobalFlags;
use crate::cli::subcommands::TableCommands;

mod create;
mod read;
mod write;

/// Handle `dbbox table`.
pub async fn handle(
    action: TableCommands,
    db: &DatasourceManager,
    flags: &GlobalFlags,
) -> anyhow::Result<()> {
    match action {
        TableCommands::Create {
            name,
            columns,
            primary_key,
        } => create::run(&name, columns, primary_key.as_deref(), db, flags).await,
        TableCommands::Get {
            table,
            key,
            column,
            id,
        } => read::get(&table, &id, &key, &column, db, flags).await,
        TableCommands::Exists { table, key, id } => {
            read::exists(&table, &id, &key, db, flags).await
        }
        TableCommands::Filter {
            table,
            column,
            value,
            id,
        } => read::filter(&table, &id, &column, &value, db, flags).await,
        TableCommands::Columns { table, id } => read::columns(&table, &id, db, flags).await,
        TableCommands::Set {
            table,
            key,
            column,
            value,
            id,
        } => write::set(&table, &id, &key, &column, &value, db, flags).await,
        TableCommands::Delete { table, key, id } => {
            write::delete(&table, &id, &key, db, flags).await
        }
    }
}
