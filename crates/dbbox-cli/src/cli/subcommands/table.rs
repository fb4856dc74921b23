use clap::Subcommand;
use dbbox_core::ColumnType;

use crate::commands::shared::parse::parse_column_spec;

/// Table commands. `--id` names the identifier column rows are keyed by.
#[derive(Clone, Debug, Subcommand)]
pub enum TableCommands {
    /// Create a table if it does not exist.
    Create {
        name: String,
        /// Column as `name:type`; type is one of string, int, long, float,
        /// double, boolean.
        #[arg(long = "column", required = true, value_parser = parse_column_spec)]
        columns: Vec<(String, ColumnType)>,
        #[arg(long)]
        primary_key: Option<String>,
    },
    /// Read one column of the row with a key.
    Get {
        table: String,
        key: String,
        column: String,
        #[arg(long, default_value = "id")]
        id: String,
    },
    /// Set one column of the row with a key and write it back.
    Set {
        table: String,
        key: String,
        column: String,
        #[arg(allow_hyphen_values = true)]
        value: String,
        #[arg(long, default_value = "id")]
        id: String,
    },
    /// Delete the row with a key.
    Delete {
        table: String,
        key: String,
        #[arg(long, default_value = "id")]
        id: String,
    },
    /// Whether a row with the key exists.
    Exists {
        table: String,
        key: String,
        #[arg(long, default_value = "id")]
        id: String,
    },
    /// Keys of rows whose column equals a value.
    Filter {
        table: String,
        column: String,
        #[arg(allow_hyphen_values = true)]
        value: String,
        #[arg(long, default_value = "id")]
        id: String,
    },
    /// List the table's columns.
    Columns {
        table: String,
        #[arg(long, default_value = "id")]
        id: String,
    },
}
