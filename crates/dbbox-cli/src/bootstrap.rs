use anyhow::Context;
use dbbox_config::DbBoxConfig;
use dbbox_db::DatasourceManager;

use crate::cli::GlobalFlags;

/// Load `.env`, then layered config plus the `--config` file if given.
pub fn load_config(flags: &GlobalFlags) -> anyhow::Result<DbBoxConfig> {
    load_dotenv()?;
    let config = match &flags.config {
        Some(path) => DbBoxConfig::load_from_file(path)?,
        None => DbBoxConfig::load()?,
    };
    Ok(config)
}

pub async fn connect(config: &DbBoxConfig) -> anyhow::Result<DatasourceManager> {
    let mysql = config.require_mysql().context(
        "no MySQL database configured; set DBBOX_MYSQL__DATABASE or [mysql] database in .dbbox/config.toml",
    )?;
    tracing::debug!(url = %mysql.url(), "connecting");
    DatasourceManager::connect(config)
        .await
        .with_context(|| format!("failed to connect to {}", mysql.url()))
}

fn load_dotenv() -> anyhow::Result<()> {
    let cwd = std::env::current_dir().context("failed to determine current directory")?;
    let env_path = cwd.join(".env");
    if env_path.exists() {
        dotenvy::from_path(&env_path)
            .with_context(|| format!("failed to load dotenv file at {}", env_path.display()))?;
    }
    Ok(())
}
