//! Bridge configuration
//!
//! [`BridgeConfig`] bundles the registry, emitter and cache options. It can be
//! built in code from the individual builders, or read from the gateway's JSON
//! configuration file:
//!
//! ```json
//! {
//!   "websocket": {
//!     "mq": { "host": "127.0.0.1", "port": 7902, "connectTimeout": 10000,
//!             "monitorInterval": 500, "monitorLoggingThrottle": 60000 }
//!   },
//!   "transactionCache": { "flushFrequency": 500 },
//!   "subscriptions": { "requireAddress": false, "requireType": false }
//! }
//! ```
//!
//! Durations are in milliseconds. Missing sections and keys keep their defaults,
//! unrelated keys are ignored.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::cache::CacheConfig;
use crate::emitter::EmitterConfig;
use crate::registry::RegistryConfig;

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 7902;

/// Configuration loading error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Parse(String),

    #[error("failed to read configuration: {0}")]
    Io(String),
}

/// Complete bridge configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BridgeConfig {
    pub registry: RegistryConfig,
    pub emitter: EmitterConfig,
    pub cache: CacheConfig,
}

impl BridgeConfig {
    /// Set the registry options
    pub fn registry(mut self, config: RegistryConfig) -> Self {
        self.registry = config;
        self
    }

    /// Set the emitter options
    pub fn emitter(mut self, config: EmitterConfig) -> Self {
        self.emitter = config;
        self
    }

    /// Set the cache options
    pub fn cache(mut self, config: CacheConfig) -> Self {
        self.cache = config;
        self
    }

    /// Parse a JSON configuration document
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let file: FileConfig =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        Ok(file.into())
    }

    /// Read and parse a JSON configuration file
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))?;

        let config = Self::from_json_str(&json)?;
        tracing::debug!(
            path = %path.display(),
            endpoint = %config.emitter.endpoint,
            flush_ms = config.cache.flush_frequency.as_millis() as u64,
            "Loaded bridge configuration"
        );
        Ok(config)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileConfig {
    #[serde(default)]
    websocket: WebsocketSection,
    #[serde(default)]
    transaction_cache: TransactionCacheSection,
    #[serde(default)]
    subscriptions: SubscriptionsSection,
}

#[derive(Debug, Default, Deserialize)]
struct WebsocketSection {
    #[serde(default)]
    mq: MqSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MqSection {
    host: Option<String>,
    port: Option<u16>,
    connect_timeout: Option<u64>,
    monitor_interval: Option<u64>,
    monitor_logging_throttle: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransactionCacheSection {
    flush_frequency: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubscriptionsSection {
    require_address: Option<bool>,
    require_type: Option<bool>,
}

impl From<FileConfig> for BridgeConfig {
    fn from(file: FileConfig) -> Self {
        let mq = file.websocket.mq;
        let mut emitter = EmitterConfig::with_endpoint(
            mq.host.as_deref().unwrap_or(DEFAULT_HOST),
            mq.port.unwrap_or(DEFAULT_PORT),
        );
        if let Some(ms) = mq.connect_timeout {
            emitter = emitter.connect_timeout(Duration::from_millis(ms));
        }
        if let Some(ms) = mq.monitor_interval {
            emitter = emitter.monitor_interval(Duration::from_millis(ms));
        }
        if let Some(ms) = mq.monitor_logging_throttle {
            emitter = emitter.monitor_logging_throttle(Duration::from_millis(ms));
        }

        let mut cache = CacheConfig::default();
        if let Some(ms) = file.transaction_cache.flush_frequency {
            cache = cache.flush_frequency(Duration::from_millis(ms));
        }

        let subscriptions = file.subscriptions;
        let registry = RegistryConfig::default()
            .require_address(subscriptions.require_address.unwrap_or(false))
            .require_type(subscriptions.require_type.unwrap_or(false));

        Self {
            registry,
            emitter,
            cache,
        }
    }
}
