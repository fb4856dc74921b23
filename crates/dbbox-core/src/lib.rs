//! # dbbox-core
//!
//! Core types and error types shared by every dbbox crate.
//!
//! - [`value::SqlValue`]: the dynamically typed scalar bound as a statement
//!   parameter and returned in result rows
//! - [`value::FromSqlValue`]: typed extraction from a `SqlValue`
//! - [`enums`]: column data types for table creation and sort order
//! - [`ident`]: identifier validation for table and column names
//! - [`errors::CoreError`]: cross-cutting errors

pub mod enums;
pub mod errors;
pub mod ident;
pub mod value;

pub use enums::{ColumnType, SortOrder};
pub use errors::CoreError;
pub use ident::{quote_identifier, validate_identifier};
pub use value::{ConversionError, FromSqlValue, SqlValue};
