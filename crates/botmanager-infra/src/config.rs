//! Service configuration loader.
//!
//! Reads `config.toml` from the data directory (`~/.botmanager/` in
//! production) into [`ServiceConfig`], falling back to defaults when the file
//! is missing or malformed, then applies environment overrides.

use std::path::{Path, PathBuf};

use botmanager_types::config::ServiceConfig;

pub const DATA_DIR_ENV: &str = "BOTMANAGER_DATA_DIR";
pub const DATABASE_URL_ENV: &str = "BOTMANAGER_DATABASE_URL";
pub const HOST_ENV: &str = "BOTMANAGER_HOST";
pub const PORT_ENV: &str = "BOTMANAGER_PORT";

/// Resolve the data directory.
///
/// `BOTMANAGER_DATA_DIR` wins, then `~/.botmanager`, then `./.botmanager`.
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        return PathBuf::from(dir);
    }

    if let Some(home) = dirs::home_dir() {
        return home.join(".botmanager");
    }

    PathBuf::from(".botmanager")
}

/// Load `{data_dir}/config.toml` and apply environment overrides.
pub async fn load_service_config(data_dir: &Path) -> ServiceConfig {
    let mut config = read_config_file(data_dir).await;
    apply_overrides(&mut config, |key| std::env::var(key).ok());
    config
}

async fn read_config_file(data_dir: &Path) -> ServiceConfig {
    let config_path = data_dir.join("config.toml");

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return ServiceConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return ServiceConfig::default();
        }
    };

    match toml::from_str::<ServiceConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            ServiceConfig::default()
        }
    }
}

fn apply_overrides(config: &mut ServiceConfig, var: impl Fn(&str) -> Option<String>) {
    if let Some(url) = var(DATABASE_URL_ENV) {
        config.database_url = Some(url);
    }
    if let Some(host) = var(HOST_ENV) {
        config.host = host;
    }
    if let Some(port) = var(PORT_ENV) {
        match port.parse() {
            Ok(port) => config.port = port,
            Err(_) => tracing::warn!("Ignoring {PORT_ENV}={port}: not a port number"),
        }
    }
}

/// The database URL to open: configured, or the default file in `data_dir`.
pub fn database_url(config: &ServiceConfig, data_dir: &Path) -> String {
    config
        .database_url
        .clone()
        .unwrap_or_else(|| crate::sqlite::pool::default_database_url(data_dir))
}
