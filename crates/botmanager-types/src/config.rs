//! Service configuration types.
//!
//! `ServiceConfig` represents the `config.toml` in the data directory. Every
//! field has a default so a partial (or missing) file is valid.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// SQLite URL. `None` means `{data_dir}/botmanager.db`.
    #[serde(default)]
    pub database_url: Option<String>,

    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Deadline attached to every request context.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// How long a session may wait for a pooled connection.
    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,

    /// Emit logs as JSON lines.
    #[serde(default)]
    pub log_json: bool,

    /// Bridge spans to OpenTelemetry (stdout exporter).
    #[serde(default)]
    pub otel: bool,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_acquire_timeout_secs() -> u64 {
    5
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout_secs(),
            acquire_timeout_secs: default_acquire_timeout_secs(),
            log_json: false,
            otel: false,
        }
    }
}

impl ServiceConfig {
    pub fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.request_timeout_secs)
    }

    pub fn acquire_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.acquire_timeout_secs)
    }
}
