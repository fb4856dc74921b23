//! Errors from loading dbbox configuration.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    /// A config file or `DBBOX_*` variable could not be parsed into `DbBoxConfig`.
    #[error("Failed to load dbbox configuration: {0}")]
    Figment(#[from] figment::Error),

    /// A section the caller needs, such as `mysql`, has no usable values.
    #[error("The [{section}] section is not set up in any config file or DBBOX_* variable")]
    NotConfigured { section: String },

    /// A value parsed but is out of range, e.g. `pool.min_connections` above the maximum.
    #[error("Bad value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}
