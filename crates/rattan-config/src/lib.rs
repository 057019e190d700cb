//! Rattan configuration layer.
//!
//! JSON configuration on disk with defaults for every field. The binary
//! loads this once at startup; CLI flags override file values.

pub mod config;
pub mod manager;

pub use config::{
    Config, ConfigError, ConfigResult, GatewaySettings, LogLevel, LoggingConfig, PolicyKind,
};
pub use manager::ConfigManager;

use std::path::PathBuf;

/// Rattan home directory (`~/.rattan`).
pub fn rattan_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".rattan"))
}

/// Default configuration file path (`~/.rattan/config.json`).
pub fn default_config_path() -> Option<PathBuf> {
    rattan_dir().map(|dir| dir.join("config.json"))
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &str) -> Option<PathBuf> {
    if let Some(stripped) = path.strip_prefix("~/") {
        dirs::home_dir().map(|home| home.join(stripped))
    } else if path == "~" {
        dirs::home_dir()
    } else {
        Some(PathBuf::from(path))
    }
}
