//! Application configuration
//!
//! Loaded from a TOML file. Every section and field has a default, so a
//! partial file (or none at all) is valid.
//!
//! ```toml
//! [server]
//! port = 8080
//!
//! [mqtt]
//! host = "broker.local"
//! topic = "devices/heartbeat"
//!
//! [streaming]
//! connection_timeout_secs = 0
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::application::broadcast::DEFAULT_CHANNEL_CAPACITY;
use crate::infrastructure::database::DEFAULT_DATABASE_URL;

/// Environment variable that points at an alternative config file
pub const CONFIG_ENV_VAR: &str = "HEARTBEAT_HUB_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseSettings,
    pub mqtt: MqttConfig,
    pub streaming: StreamingConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Seconds to wait for in-flight work on shutdown
    pub shutdown_timeout: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            shutdown_timeout: 30,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Sqlite,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub backend: StorageBackend,
    pub url: String,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Sqlite,
            url: DEFAULT_DATABASE_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub topic: String,
    /// 0, 1 or 2
    pub qos: u8,
    pub keep_alive_secs: u64,
    pub reconnect_delay_secs: u64,
    /// Request channel size of the MQTT client
    pub channel_capacity: usize,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "localhost".to_string(),
            port: 1883,
            client_id: "heartbeat-hub".to_string(),
            topic: "heartbeat".to_string(),
            qos: 1,
            keep_alive_secs: 15,
            reconnect_delay_secs: 2,
            channel_capacity: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamingConfig {
    /// Events buffered per subscriber before new ones are dropped for it
    pub channel_capacity: usize,
    /// Maximum session length; 0 keeps sessions open until the client leaves
    pub connection_timeout_secs: u64,
    /// Interval between SSE keep-alive comments
    pub keep_alive_secs: u64,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            connection_timeout_secs: 0,
            keep_alive_secs: 15,
        }
    }
}

impl StreamingConfig {
    pub fn connection_timeout(&self) -> Option<Duration> {
        match self.connection_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs.max(1))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, e.g. "info" or "heartbeat_hub=debug"
    pub level: String,
    /// "text" or "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

impl AppConfig {
    /// Load from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.streaming.channel_capacity == 0 {
            return Err(ConfigError::Invalid(
                "streaming.channel_capacity must be at least 1".into(),
            ));
        }
        if self.mqtt.qos > 2 {
            return Err(ConfigError::Invalid(format!(
                "mqtt.qos must be 0, 1 or 2 (got {})",
                self.mqtt.qos
            )));
        }
        if self.mqtt.enabled && self.mqtt.topic.trim().is_empty() {
            return Err(ConfigError::Invalid("mqtt.topic must not be empty".into()));
        }
        if self.database.backend == StorageBackend::Sqlite && self.database.url.is_empty() {
            return Err(ConfigError::Invalid("database.url must not be empty".into()));
        }
        Ok(())
    }

    pub fn api_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

/// `$HEARTBEAT_HUB_CONFIG`, else `~/.config/heartbeat-hub/config.toml`.
pub fn default_config_path() -> PathBuf {
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        return PathBuf::from(path);
    }
    dirs_next::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("heartbeat-hub")
        .join("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config = AppConfig::from_toml("").unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.database.backend, StorageBackend::Sqlite);
        assert_eq!(config.streaming.channel_capacity, DEFAULT_CHANNEL_CAPACITY);
        assert!(config.streaming.connection_timeout().is_none());
        assert!(config.mqtt.enabled);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = AppConfig::from_toml(
            r#"
            [database]
            backend = "memory"

            [streaming]
            connection_timeout_secs = 300

            [mqtt]
            topic = "devices/+/heartbeat"
            "#,
        )
        .unwrap();

        assert_eq!(config.database.backend, StorageBackend::Memory);
        assert_eq!(config.database.url, DEFAULT_DATABASE_URL);
        assert_eq!(
            config.streaming.connection_timeout(),
            Some(Duration::from_secs(300))
        );
        assert_eq!(config.mqtt.topic, "devices/+/heartbeat");
        assert_eq!(config.mqtt.port, 1883);
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let err = AppConfig::from_toml("[streaming]\nchannel_capacity = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn bad_qos_is_rejected() {
        let err = AppConfig::from_toml("[mqtt]\nqos = 3").unwrap_err();
        assert!(err.to_string().contains("mqtt.qos"));
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let err = AppConfig::from_toml("[server\nport = ").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn missing_file_gives_defaults() {
        let config = AppConfig::load(Path::new("/nonexistent/heartbeat-hub.toml")).unwrap();
        assert_eq!(config.api_address(), "0.0.0.0:8080");
    }

    #[test]
    fn serialized_config_parses_back() {
        let mut config = AppConfig::default();
        config.server.port = 9100;
        config.logging.format = "json".into();

        let parsed = AppConfig::from_toml(&config.to_toml().unwrap()).unwrap();
        assert_eq!(parsed.server.port, 9100);
        assert_eq!(parsed.logging.format, "json");
    }
}
