//! Rate limiter backend configuration.
//!
//! The plugin's pushed `config` blob names the redis deployment backing the
//! distributed token buckets. This handler parses it, derives the typed
//! connection settings and publishes them into the gateway's singleton
//! registry; the store adapter reads them from there. Publishing the same
//! settings twice is a no-op so repeated pushes do not churn connections.
use std::sync::Arc;

use serde::Deserialize;

use crate::{
    config::models::PluginData,
    core::result::GatewayError,
    plugins::names,
    sync::subscriber::PluginConfigHandler,
    utils::singleton::SingletonRegistry,
};

const DEFAULT_MAX_IDLE: u32 = 8;
const DEFAULT_MAX_ACTIVE: u32 = 8;
const DEFAULT_MIN_IDLE: u32 = 0;

/// Deployment shape of the backing redis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RedisMode {
    #[default]
    Standalone,
    Cluster,
    Sentinel,
}

fn default_max_idle() -> u32 {
    DEFAULT_MAX_IDLE
}

fn default_max_active() -> u32 {
    DEFAULT_MAX_ACTIVE
}

/// Raw pushed config blob, as serialized by the control plane.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimiterConfig {
    #[serde(default)]
    pub mode: RedisMode,
    /// `host:port`, or a `;`-separated node list for cluster and sentinel.
    pub url: String,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub database: i64,
    /// Sentinel master set name. Ignored for the other modes.
    #[serde(default)]
    pub master: Option<String>,
    #[serde(default = "default_max_idle")]
    pub max_idle: u32,
    #[serde(default)]
    pub min_idle: u32,
    #[serde(default = "default_max_active")]
    pub max_active: u32,
    /// Pool acquire deadline in humantime form ("1h", "500ms").
    #[serde(default)]
    pub max_wait: Option<String>,
}

/// One resolved redis endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedisNode {
    pub host: String,
    pub port: u16,
}

/// Mode-specific connection topology.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedisEndpoints {
    Standalone(RedisNode),
    Cluster(Vec<RedisNode>),
    Sentinel { master: String, nodes: Vec<RedisNode> },
}

/// Connection pool bounds, mirroring the control plane's pool model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSettings {
    pub max_idle: u32,
    pub min_idle: u32,
    pub max_active: u32,
    /// Milliseconds to wait for a pooled connection; -1 means unbounded.
    pub max_wait_ms: i64,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_idle: DEFAULT_MAX_IDLE,
            min_idle: DEFAULT_MIN_IDLE,
            max_active: DEFAULT_MAX_ACTIVE,
            max_wait_ms: -1,
        }
    }
}

/// Fully resolved settings published to the singleton registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedisSettings {
    pub endpoints: RedisEndpoints,
    pub password: Option<String>,
    pub database: i64,
    pub pool: PoolSettings,
}

impl RedisSettings {
    /// Resolve the pushed blob into connection settings, failing fast on any
    /// malformed node or duration.
    pub fn from_config(config: &RateLimiterConfig) -> Result<Self, GatewayError> {
        let nodes = parse_nodes(&config.url)?;
        let endpoints = match config.mode {
            RedisMode::Standalone => {
                let node = nodes.into_iter().next().ok_or_else(|| {
                    GatewayError::MalformedConfig("standalone redis url is empty".to_string())
                })?;
                RedisEndpoints::Standalone(node)
            }
            RedisMode::Cluster => RedisEndpoints::Cluster(nodes),
            RedisMode::Sentinel => {
                let master = config.master.clone().filter(|m| !m.is_empty()).ok_or_else(
                    || GatewayError::MalformedConfig("sentinel mode requires a master".to_string()),
                )?;
                RedisEndpoints::Sentinel { master, nodes }
            }
        };

        let max_wait_ms = match config.max_wait.as_deref() {
            None | Some("") => -1,
            Some(raw) => humantime::parse_duration(raw)
                .map_err(|err| {
                    GatewayError::MalformedConfig(format!("bad maxWait {raw:?}: {err}"))
                })?
                .as_millis() as i64,
        };

        Ok(Self {
            endpoints,
            password: config.password.clone().filter(|p| !p.is_empty()),
            database: config.database,
            pool: PoolSettings {
                max_idle: config.max_idle,
                min_idle: config.min_idle,
                max_active: config.max_active,
                max_wait_ms,
            },
        })
    }

    /// Connection urls in `redis://` form, one per node.
    pub fn connection_urls(&self) -> Vec<String> {
        let auth = self
            .password
            .as_deref()
            .map(|p| format!(":{p}@"))
            .unwrap_or_default();
        let render = |node: &RedisNode| {
            format!("redis://{auth}{}:{}/{}", node.host, node.port, self.database)
        };
        match &self.endpoints {
            RedisEndpoints::Standalone(node) => vec![render(node)],
            RedisEndpoints::Cluster(nodes) | RedisEndpoints::Sentinel { nodes, .. } => {
                nodes.iter().map(render).collect()
            }
        }
    }
}

fn parse_nodes(url: &str) -> Result<Vec<RedisNode>, GatewayError> {
    url.split(';')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            let (host, port) = part.split_once(':').ok_or_else(|| {
                GatewayError::MalformedConfig(format!("redis node {part:?} has no port"))
            })?;
            let port: u16 = port.parse().map_err(|_| {
                GatewayError::MalformedConfig(format!("redis node {part:?} has a bad port"))
            })?;
            Ok(RedisNode {
                host: host.to_string(),
                port,
            })
        })
        .collect()
}

/// Reacts to pushed rate limiter plugin config by (re)publishing the redis
/// settings.
pub struct RateLimiterConfigHandler {
    registry: Arc<SingletonRegistry>,
}

impl RateLimiterConfigHandler {
    pub fn new(registry: Arc<SingletonRegistry>) -> Self {
        Self { registry }
    }
}

impl PluginConfigHandler for RateLimiterConfigHandler {
    fn plugin_named(&self) -> &'static str {
        names::RATE_LIMITER
    }

    fn handle_plugin(&self, data: &PluginData) -> Result<(), GatewayError> {
        if data.config.trim().is_empty() {
            return Ok(());
        }
        let config: RateLimiterConfig = serde_json::from_str(&data.config).map_err(|err| {
            GatewayError::MalformedConfig(format!("rate limiter config: {err}"))
        })?;
        let settings = RedisSettings::from_config(&config)?;

        if self
            .registry
            .get::<RedisSettings>()
            .is_some_and(|current| *current == settings)
        {
            tracing::debug!("rate limiter settings unchanged");
            return Ok(());
        }
        tracing::info!(database = settings.database, "publishing rate limiter settings");
        self.registry.put(settings);
        Ok(())
    }

    fn remove_plugin(&self, _data: &PluginData) -> Result<(), GatewayError> {
        self.registry.remove::<RedisSettings>();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plugin_data(config: &str) -> PluginData {
        PluginData {
            id: String::new(),
            name: names::RATE_LIMITER.to_string(),
            config: config.to_string(),
            role: 0,
            enabled: true,
        }
    }

    #[test]
    fn standalone_settings_resolve() {
        let config: RateLimiterConfig = serde_json::from_str(
            r#"{"mode":"standalone","url":"localhost:2181","password":"password","database":1}"#,
        )
        .unwrap();
        let settings = RedisSettings::from_config(&config).unwrap();

        assert_eq!(
            settings.endpoints,
            RedisEndpoints::Standalone(RedisNode {
                host: "localhost".to_string(),
                port: 2181,
            })
        );
        assert_eq!(settings.database, 1);
        assert_eq!(settings.password.as_deref(), Some("password"));
        assert_eq!(settings.pool.max_idle, 8);
        assert_eq!(settings.pool.max_active, 8);
        assert_eq!(settings.pool.min_idle, 0);
        assert_eq!(settings.pool.max_wait_ms, -1);
        assert_eq!(
            settings.connection_urls(),
            vec!["redis://:password@localhost:2181/1"]
        );
    }

    #[test]
    fn sentinel_settings_resolve_node_list() {
        let config: RateLimiterConfig = serde_json::from_str(
            r#"{"mode":"sentinel","master":"master","url":"localhost:2181;localhost:2182","maxWait":"1h"}"#,
        )
        .unwrap();
        let settings = RedisSettings::from_config(&config).unwrap();

        match &settings.endpoints {
            RedisEndpoints::Sentinel { master, nodes } => {
                assert_eq!(master, "master");
                assert_eq!(
                    nodes.iter().map(|n| n.port).collect::<Vec<_>>(),
                    vec![2181, 2182]
                );
            }
            other => panic!("expected sentinel endpoints, got {other:?}"),
        }
        assert_eq!(settings.pool.max_wait_ms, 3_600_000);
    }

    #[test]
    fn sentinel_without_master_is_rejected() {
        let config: RateLimiterConfig =
            serde_json::from_str(r#"{"mode":"sentinel","url":"localhost:2181"}"#).unwrap();
        assert!(matches!(
            RedisSettings::from_config(&config),
            Err(GatewayError::MalformedConfig(_))
        ));
    }

    #[test]
    fn bad_node_fails_fast() {
        for url in ["localhost", "localhost:notaport", ""] {
            let config: RateLimiterConfig =
                serde_json::from_str(&format!(r#"{{"url":"{url}"}}"#)).unwrap();
            assert!(RedisSettings::from_config(&config).is_err(), "url {url:?}");
        }
    }

    #[test]
    fn handler_publishes_once_per_distinct_config() {
        let registry = Arc::new(SingletonRegistry::new());
        let handler = RateLimiterConfigHandler::new(registry.clone());
        let data = plugin_data(r#"{"mode":"standalone","url":"localhost:2181","database":1}"#);

        handler.handle_plugin(&data).unwrap();
        let first = registry.get::<RedisSettings>().unwrap();

        // Same blob again: the registry keeps the identical Arc untouched.
        handler.handle_plugin(&data).unwrap();
        let second = registry.get::<RedisSettings>().unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        let changed = plugin_data(r#"{"mode":"standalone","url":"localhost:2182","database":1}"#);
        handler.handle_plugin(&changed).unwrap();
        let third = registry.get::<RedisSettings>().unwrap();
        assert!(!Arc::ptr_eq(&first, &third));
    }

    #[test]
    fn handler_removal_clears_settings() {
        let registry = Arc::new(SingletonRegistry::new());
        let handler = RateLimiterConfigHandler::new(registry.clone());
        handler
            .handle_plugin(&plugin_data(r#"{"url":"localhost:2181"}"#))
            .unwrap();
        handler.remove_plugin(&plugin_data("")).unwrap();
        assert!(registry.get::<RedisSettings>().is_none());
    }

    #[test]
    fn empty_config_is_a_no_op() {
        let registry = Arc::new(SingletonRegistry::new());
        let handler = RateLimiterConfigHandler::new(registry.clone());
        handler.handle_plugin(&plugin_data("  ")).unwrap();
        assert!(registry.get::<RedisSettings>().is_none());
    }
}
