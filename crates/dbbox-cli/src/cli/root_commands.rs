use clap::{Args, Subcommand};

use crate::cli::subcommands::TableCommands;

/// Top-level command tree.
#[derive(Clone, Debug, Subcommand)]
pub enum Commands {
    /// Check the server answers on a pooled connection.
    Ping,
    /// Show connection pool usage.
    Status,
    /// Run a statement that returns rows.
    Query(StatementArgs),
    /// Run a statement that modifies data and print rows affected.
    Exec(StatementArgs),
    /// Cached table operations.
    Table {
        #[command(subcommand)]
        action: TableCommands,
    },
}

#[derive(Clone, Debug, Args)]
pub struct StatementArgs {
    /// SQL with `?` placeholders.
    pub sql: String,
    /// Positional parameter, repeatable. `null`, `true`/`false` and numbers
    /// are typed; wrap in single quotes to force text.
    #[arg(short, long = "param", allow_hyphen_values = true)]
    pub params: Vec<String>,
}
