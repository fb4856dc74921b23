//! SQL identifier rules.
//!
//! Table and column names cannot be bound as statement parameters, so every
//! name that ends up interpolated into SQL text goes through
//! [`validate_identifier`] first.

use crate::errors::CoreError;

/// MySQL's limit for table and column names.
pub const MAX_IDENTIFIER_LEN: usize = 64;

/// Check that `name` matches `^[A-Za-z0-9_]+$` and fits MySQL's length limit.
///
/// # Errors
///
/// Returns `CoreError::InvalidIdentifier` describing the first rule violated.
pub fn validate_identifier(name: &str) -> Result<&str, CoreError> {
    let invalid = |reason: &str| CoreError::InvalidIdentifier {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    if name.is_empty() {
        return Err(invalid("must not be empty"));
    }
    if name.len() > MAX_IDENTIFIER_LEN {
        return Err(invalid("longer than 64 characters"));
    }
    if let Some(ch) = name
        .chars()
        .find(|ch| !(ch.is_ascii_alphanumeric() || *ch == '_'))
    {
        return Err(invalid(&format!("contains '{ch}'")));
    }
    Ok(name)
}

/// Validate `name` and wrap it in backticks.
///
/// # Errors
///
/// Returns `CoreError::InvalidIdentifier` if the name is not a valid identifier.
pub fn quote_identifier(name: &str) -> Result<String, CoreError> {
    validate_identifier(name).map(|name| format!("`{name}`"))
}
