//! CLI configuration.
//!
//! Configuration is loaded in the following order (later overrides earlier):
//! 1. Default values
//! 2. YAML config file (if specified via KAFKACONN_CONFIG or --config)
//! 3. Environment variables
//! 4. Command-line flags

use kafkaconn_client::connection::{DEFAULT_CLIENT_ID, DEFAULT_READ_BUFFER_SIZE};
use kafkaconn_client::ConnectionConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// CLI configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Broker address (`host:port`).
    pub broker: String,
    /// Client id stamped into request headers.
    pub client_id: String,
    /// TCP dial timeout in milliseconds.
    pub dial_timeout_ms: u64,
    /// Per-request timeout in milliseconds.
    pub request_timeout_ms: u64,
    /// Socket read buffer size in bytes.
    pub read_buffer_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            broker: format!("127.0.0.1:{}", kafkaconn_protocol::DEFAULT_PORT),
            client_id: DEFAULT_CLIENT_ID.to_string(),
            dial_timeout_ms: 10_000,
            request_timeout_ms: 30_000,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
        }
    }
}

impl Config {
    /// Loads configuration from `path` (if any), then applies environment
    /// variable overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Loads configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(path.to_path_buf(), e))?;
        let config: Config = serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Applies `KAFKACONN_*` overrides looked up through `var`.
    /// Unparseable values are ignored.
    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(broker) = var("KAFKACONN_BROKER") {
            self.broker = broker;
        }

        if let Some(client_id) = var("KAFKACONN_CLIENT_ID") {
            self.client_id = client_id;
        }

        if let Some(timeout) = var("KAFKACONN_DIAL_TIMEOUT_MS") {
            if let Ok(ms) = timeout.parse() {
                self.dial_timeout_ms = ms;
            }
        }

        if let Some(timeout) = var("KAFKACONN_REQUEST_TIMEOUT_MS") {
            if let Ok(ms) = timeout.parse() {
                self.request_timeout_ms = ms;
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.broker.is_empty() {
            return Err(ConfigError::ValidationError(
                "broker address must not be empty".to_string(),
            ));
        }
        if self.dial_timeout_ms == 0 || self.request_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "timeouts must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn dial_timeout(&self) -> Duration {
        Duration::from_millis(self.dial_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Builds the library-level connection configuration.
    pub fn connection_config(&self) -> ConnectionConfig {
        let config = ConnectionConfig::new(&self.broker)
            .with_dial_timeout(self.dial_timeout())
            .with_read_buffer_size(self.read_buffer_size);
        if self.client_id.is_empty() {
            config.without_client_id()
        } else {
            config.with_client_id(&self.client_id)
        }
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    IoError(PathBuf, std::io::Error),
    ParseError(PathBuf, String),
    ValidationError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(path, e) => {
                write!(f, "failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::ParseError(path, e) => {
                write!(f, "failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::ValidationError(msg) => {
                write!(f, "configuration validation failed: {}", msg)
            }
        }
    }
}

impl std::error::Error for ConfigError {}
