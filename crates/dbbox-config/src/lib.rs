//! # dbbox-config
//!
//! Layered configuration loading for dbbox using figment.
//!
//! Configuration sources (in priority order, highest wins):
//! 1. Environment variables (`DBBOX_*` prefix, `__` as separator)
//! 2. An explicit config file passed by the caller (`--config` on the CLI)
//! 3. Project-level `.dbbox/config.toml`
//! 4. User-level `~/.config/dbbox/config.toml`
//! 5. Built-in defaults
//!
//! # Environment Variable Mapping
//!
//! Figment maps `DBBOX_MYSQL__HOST` -> `mysql.host`, `DBBOX_POOL__MAX_CONNECTIONS`
//! -> `pool.max_connections`, etc.
//!
//! # Usage
//!
//! ```no_run
//! use dbbox_config::DbBoxConfig;
//!
//! let config = DbBoxConfig::load_with_dotenv().expect("config");
//! if config.mysql.is_configured() {
//!     println!("MySQL: {}", config.mysql.url());
//! }
//! ```

mod cache;
mod error;
mod mysql;
mod pool;

pub use cache::CacheConfig;
pub use error::ConfigError;
pub use mysql::MySqlConfig;
pub use pool::PoolConfig;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DbBoxConfig {
    #[serde(default)]
    pub mysql: MySqlConfig,
    #[serde(default)]
    pub pool: PoolConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

impl DbBoxConfig {
    /// Load configuration from defaults, TOML files and environment variables.
    ///
    /// Does NOT call `dotenvy` -- use [`Self::load_with_dotenv`] for `.env` support.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a source fails to parse or the pool settings
    /// are invalid.
    pub fn load() -> Result<Self, ConfigError> {
        Self::extract(Self::figment(None))
    }

    /// Load configuration with an extra TOML file layered above the project file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if `path` does not exist, otherwise as
    /// [`Self::load`].
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::InvalidValue {
                field: "config".to_string(),
                reason: format!("file '{}' does not exist", path.display()),
            });
        }
        Self::extract(Self::figment(Some(path)))
    }

    /// Load configuration after reading `.env` from the current directory.
    ///
    /// # Errors
    ///
    /// As [`Self::load`].
    pub fn load_with_dotenv() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::load()
    }

    /// Build the figment provider chain.
    ///
    /// Public so tests can inspect the figment or add providers on top.
    pub fn figment(extra_file: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        // Layer 1: User-global config
        if let Some(global_path) = Self::global_config_path() {
            if global_path.exists() {
                figment = figment.merge(Toml::file(global_path));
            }
        }

        // Layer 2: Project-local config
        let local_path = PathBuf::from(".dbbox/config.toml");
        if local_path.exists() {
            figment = figment.merge(Toml::file(local_path));
        }

        // Layer 3: Explicit file
        if let Some(path) = extra_file {
            figment = figment.merge(Toml::file(path));
        }

        // Layer 4: Environment variables (highest priority)
        figment.merge(Env::prefixed("DBBOX_").split("__"))
    }

    /// Fail with `NotConfigured` unless a MySQL database is set.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::NotConfigured` for the `mysql` section.
    pub fn require_mysql(&self) -> Result<&MySqlConfig, ConfigError> {
        if self.mysql.is_configured() {
            Ok(&self.mysql)
        } else {
            Err(ConfigError::NotConfigured {
                section: "mysql".to_string(),
            })
        }
    }

    fn extract(figment: Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract()?;
        config.pool.validate()?;
        Ok(config)
    }

    fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("dbbox").join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use figment::Jail;
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn default_config_loads() {
        let config = DbBoxConfig::default();
        assert!(!config.mysql.is_configured());
        assert_eq!(config.pool.max_connections, 10);
        assert_eq!(config.cache.ttl_secs, 300);
    }

    #[test]
    fn require_mysql_reports_section() {
        let config = DbBoxConfig::default();
        let err = config.require_mysql().unwrap_err();
        assert!(matches!(err, ConfigError::NotConfigured { ref section } if section == "mysql"));
        assert!(err.to_string().contains("[mysql] section is not set up"));
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let err = DbBoxConfig::load_from_file(Path::new("/nonexistent/dbbox.toml")).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn absolute_config_path_outside_project() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("dbbox.toml");
        let mut file = std::fs::File::create(&path).expect("create config");
        writeln!(
            file,
            "[mysql]\nhost = \"db.internal\"\ndatabase = \"app\"\n\n[pool]\nmax_connections = 4"
        )
        .expect("write config");

        Jail::expect_with(|jail| {
            jail.set_env("DBBOX_POOL__MAX_CONNECTIONS", "6");
            let config = DbBoxConfig::load_from_file(&path).expect("config should load");
            assert_eq!(config.mysql.host, "db.internal");
            assert_eq!(config.mysql.database, "app");
            assert_eq!(config.pool.max_connections, 6);
            assert!(config.require_mysql().is_ok());
            Ok(())
        });
    }
}
