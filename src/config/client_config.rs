use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::JanusError;

/// Configuration for JanusClient
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JanusClientConfig {
    /// Gateway WebSocket URL (Default: ws://localhost:8188)
    pub url: String,

    /// WebSocket subprotocol (Default: janus-protocol)
    pub protocol: String,

    /// Window for a transaction to produce a terminating frame (Default: 6s)
    #[serde(with = "duration_ms", rename = "request_timeout_ms")]
    pub request_timeout: Duration,

    /// Idle watchdog: the connection is closed when no frame arrives for this long (Default: 40s)
    #[serde(with = "duration_ms", rename = "connection_timeout_ms")]
    pub connection_timeout: Duration,

    /// Session keep-alive period (Default: 30s)
    #[serde(with = "duration_ms", rename = "keepalive_interval_ms")]
    pub keepalive_interval: Duration,

    /// Consecutive keep-alive failures before a session is declared dead (Default: 2)
    pub keepalive_failure_threshold: u32,

    /// Reconnect after the idle watchdog closes the connection (Default: true)
    pub reconnect: bool,

    /// Static token attached to every request
    pub token: Option<String>,

    /// Static API secret attached to every request
    pub api_secret: Option<String>,

    /// Maximum number of outstanding transactions (Default: 1000)
    pub max_pending_transactions: usize,
}

impl Default for JanusClientConfig {
    fn default() -> Self {
        Self {
            url: "ws://localhost:8188".to_string(),
            protocol: "janus-protocol".to_string(),
            request_timeout: Duration::from_secs(6),
            connection_timeout: Duration::from_secs(40),
            keepalive_interval: Duration::from_secs(30),
            keepalive_failure_threshold: 2,
            reconnect: true,
            token: None,
            api_secret: None,
            max_pending_transactions: 1000,
        }
    }
}

impl JanusClientConfig {
    /// Default configuration pointed at a specific gateway
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Short timeouts for quick detection of dead sessions and stalled sockets
    pub fn aggressive() -> Self {
        Self {
            request_timeout: Duration::from_secs(2),
            connection_timeout: Duration::from_secs(15),
            keepalive_interval: Duration::from_secs(10),
            keepalive_failure_threshold: 2,
            ..Self::default()
        }
    }

    pub fn with_credentials(mut self, token: Option<String>, api_secret: Option<String>) -> Self {
        self.token = token;
        self.api_secret = api_secret;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_reconnect(mut self, reconnect: bool) -> Self {
        self.reconnect = reconnect;
        self
    }

    pub fn from_json_str(json: &str) -> Result<Self, JanusError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| JanusError::Configuration(format!("invalid JSON configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    #[cfg(feature = "yaml-support")]
    pub fn from_yaml_str(yaml: &str) -> Result<Self, JanusError> {
        let config: Self = serde_yaml::from_str(yaml)
            .map_err(|e| JanusError::Configuration(format!("invalid YAML configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file, format chosen by extension
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, JanusError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            JanusError::Configuration(format!("cannot read {}: {}", path.display(), e))
        })?;

        match path.extension().and_then(|ext| ext.to_str()) {
            #[cfg(feature = "yaml-support")]
            Some("yaml") | Some("yml") => Self::from_yaml_str(&content),
            #[cfg(not(feature = "yaml-support"))]
            Some("yaml") | Some("yml") => Err(JanusError::Configuration(
                "YAML configuration requires the yaml-support feature".to_string(),
            )),
            _ => Self::from_json_str(&content),
        }
    }

    /// Validate the configuration values
    pub fn validate(&self) -> Result<(), JanusError> {
        if self.url.is_empty() {
            return Err(JanusError::Configuration("url must not be empty".to_string()));
        }

        if !(self.url.starts_with("ws://") || self.url.starts_with("wss://")) {
            return Err(JanusError::Configuration(format!(
                "url must use the ws:// or wss:// scheme, got '{}'",
                self.url
            )));
        }

        if self.request_timeout.is_zero() {
            return Err(JanusError::Configuration("request_timeout must be greater than 0".to_string()));
        }

        if self.connection_timeout.is_zero() {
            return Err(JanusError::Configuration("connection_timeout must be greater than 0".to_string()));
        }

        if self.keepalive_interval.is_zero() {
            return Err(JanusError::Configuration("keepalive_interval must be greater than 0".to_string()));
        }

        if self.keepalive_failure_threshold == 0 {
            return Err(JanusError::Configuration(
                "keepalive_failure_threshold must be greater than 0".to_string(),
            ));
        }

        if self.max_pending_transactions == 0 {
            return Err(JanusError::Configuration(
                "max_pending_transactions must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
