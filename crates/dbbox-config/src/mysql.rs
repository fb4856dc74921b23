//! MySQL connection settings.

use serde::{Deserialize, Serialize};

const fn default_port() -> u16 {
    3306
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_user() -> String {
    "root".to_string()
}

#[derive(Clone, Deserialize, Serialize)]
pub struct MySqlConfig {
    /// Server host name or address.
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Schema to connect to.
    #[serde(default)]
    pub database: String,

    #[serde(default = "default_user")]
    pub user: String,

    #[serde(default)]
    pub password: String,
}

impl Default for MySqlConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            database: String::new(),
            user: default_user(),
            password: String::new(),
        }
    }
}

impl MySqlConfig {
    /// A database name is the one field without a usable default.
    pub fn is_configured(&self) -> bool {
        !self.database.is_empty()
    }

    /// Connection URL without the password, e.g. `mysql://root@localhost:3306/dashboard`.
    pub fn url(&self) -> String {
        format!(
            "mysql://{}@{}:{}/{}",
            self.user, self.host, self.port, self.database
        )
    }
}

// Keeps the password out of logs and panic messages.
impl std::fmt::Debug for MySqlConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MySqlConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &if self.password.is_empty() { "" } else { "***" })
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_target_local_server() {
        let config = MySqlConfig::default();
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 3306);
        assert_eq!(config.user, "root");
        assert!(!config.is_configured());
    }

    #[test]
    fn url_omits_password() {
        let config = MySqlConfig {
            database: "dashboard".into(),
            password: "hunter2".into(),
            ..Default::default()
        };
        assert!(config.is_configured());
        assert_eq!(config.url(), "mysql://root@localhost:3306/dashboard");
    }

    #[test]
    fn debug_redacts_password() {
        let config = MySqlConfig {
            password: "hunter2".into(),
            ..Default::default()
        };
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("***"));
    }
}
