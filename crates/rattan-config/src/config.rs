//! Configuration structures.

use serde::{Deserialize, Serialize};

/// Errors raised by the configuration layer.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Filesystem failure while reading or writing the config file
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Malformed JSON in the config file
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    /// Path could not be resolved
    #[error("invalid path: {0}")]
    InvalidPath(String),
    /// A field failed validation
    #[error("validation error: {0}")]
    Validation(String),
}

/// Shorthand result for config operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Config schema version, written on save
    pub version: String,
    /// Gateway listener settings
    pub gateway: GatewaySettings,
    /// Logging settings
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            gateway: GatewaySettings::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Check field constraints before the gateway starts.
    pub fn validate(&self) -> ConfigResult<()> {
        self.gateway.validate()
    }
}

/// Response policy selection.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    /// Push a fixed acknowledgment, then close the connection
    #[default]
    AckThenClose,
    /// Mirror each payload back and keep the connection open
    Echo,
}

/// Gateway listener settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GatewaySettings {
    /// Bind address, e.g. "127.0.0.1:9501"
    pub bind: String,
    /// Maximum concurrent connections before new ones are rejected
    pub max_connections: usize,
    /// Which response policy the dispatcher runs
    pub policy: PolicyKind,
    /// Acknowledgment payload for the ack_then_close policy
    pub ack_payload: String,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:9501".to_string(),
            max_connections: 1000,
            policy: PolicyKind::default(),
            ack_payload: "this is server".to_string(),
        }
    }
}

impl GatewaySettings {
    /// Check that the bind address parses and limits are sane.
    pub fn validate(&self) -> ConfigResult<()> {
        self.bind
            .parse::<std::net::SocketAddr>()
            .map_err(|e| ConfigError::Validation(format!("invalid bind address '{}': {}", self.bind, e)))?;
        if self.max_connections == 0 {
            return Err(ConfigError::Validation(
                "max_connections must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Log verbosity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Most verbose
    Trace,
    /// Verbose
    Debug,
    /// Default
    #[default]
    Info,
    /// Problems only
    Warn,
    /// Failures only
    Error,
}

impl LogLevel {
    /// The env-filter directive string for this level.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct LoggingConfig {
    /// Minimum level emitted
    pub level: LogLevel,
}
