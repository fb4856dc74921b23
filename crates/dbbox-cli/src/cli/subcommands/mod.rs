pub mod table;

pub use table::TableCommands;
