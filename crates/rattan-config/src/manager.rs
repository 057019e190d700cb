//! Configuration manager.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::info;

use crate::config::{Config, ConfigError, ConfigResult};

/// Loads and owns the runtime configuration.
#[derive(Clone)]
pub struct ConfigManager {
    path: PathBuf,
    config: Arc<RwLock<Config>>,
}

impl ConfigManager {
    /// Load a config file, writing a default one if it does not exist.
    pub async fn load(path: &Path) -> ConfigResult<Self> {
        let config = if path.exists() {
            info!("loading config from {:?}", path);
            let content = tokio::fs::read_to_string(path).await?;
            let config: Config = serde_json::from_str(&content)?;
            config.validate()?;
            config
        } else {
            info!("config file not found, creating default at {:?}", path);
            let default_config = Config::default();
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            let content = serde_json::to_string_pretty(&default_config)?;
            tokio::fs::write(path, &content).await?;
            default_config
        };

        Ok(Self {
            path: path.to_path_buf(),
            config: Arc::new(RwLock::new(config)),
        })
    }

    /// Load from the default location (`~/.rattan/config.json`).
    pub async fn load_default() -> ConfigResult<Self> {
        let path = crate::default_config_path()
            .ok_or_else(|| ConfigError::InvalidPath("could not find home directory".to_string()))?;
        Self::load(&path).await
    }

    /// Wrap an in-memory config, for tests and overrides.
    pub fn new(config: Config, path: PathBuf) -> Self {
        Self {
            path,
            config: Arc::new(RwLock::new(config)),
        }
    }

    /// Shared handle to the current configuration.
    pub fn get(&self) -> Arc<RwLock<Config>> {
        Arc::clone(&self.config)
    }

    /// Path the config was loaded from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Persist the current configuration back to disk.
    pub async fn save(&self) -> ConfigResult<()> {
        let config = self.config.read().await;
        let content = serde_json::to_string_pretty(&*config)?;
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, &content).await?;
        info!("config saved to {:?}", self.path);
        Ok(())
    }
}
