//! Bootstrap configuration for the gateway process.
//!
//! Only process-level settings live here (listen address, sync endpoint,
//! logging). All routing state arrives through the sync channel at runtime
//! and is never read from disk.
use config::{Config, Environment, File};
use eyre::{Result, WrapErr};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BootstrapConfig {
    /// Address the inbound HTTP listener binds.
    pub listen_addr: String,
    pub sync: SyncConfig,
    pub logging: LoggingConfig,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:9195".to_string(),
            sync: SyncConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Websocket endpoint of the control plane. No endpoint means the
    /// gateway starts with empty caches and waits for a future push source.
    pub url: Option<String>,
    /// Seconds between reconnect attempts.
    pub retry_interval_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            url: None,
            retry_interval_secs: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// Emit JSON lines instead of the pretty console format.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: true,
        }
    }
}

/// Load the bootstrap config from `path` (toml / yaml / json by extension),
/// letting `SYNAPSE__`-prefixed environment variables override file values.
pub fn load_config(path: &str) -> Result<BootstrapConfig> {
    Config::builder()
        .add_source(File::with_name(path).required(false))
        .add_source(Environment::with_prefix("SYNAPSE").separator("__"))
        .build()
        .wrap_err_with(|| format!("failed to read bootstrap config from {path}"))?
        .try_deserialize()
        .wrap_err("bootstrap config has invalid shape")
}
