//! Configuration management for primecache

pub mod schema;

pub use schema::Config;

use crate::error::{PrimeError, PrimeResult};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// Configuration manager
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a new config manager with default path
    pub fn new() -> Self {
        Self {
            config_path: Self::default_config_path(),
        }
    }

    /// Create a config manager with a custom path
    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("primecache")
            .join("config.toml")
    }

    /// Get the default data directory path
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("primecache")
    }

    /// Data directory from config, falling back to the default
    pub fn data_dir(config: &Config) -> PathBuf {
        config
            .storage
            .data_dir
            .clone()
            .unwrap_or_else(Self::default_data_dir)
    }

    /// Key-value store directory under a data directory
    pub fn store_dir(data_dir: &Path) -> PathBuf {
        data_dir.join("store")
    }

    /// Task spool directory under a data directory
    pub fn queue_dir(data_dir: &Path) -> PathBuf {
        data_dir.join("queue")
    }

    /// Event log path under a data directory
    pub fn event_log_path(data_dir: &Path) -> PathBuf {
        data_dir.join("events.log")
    }

    /// Load configuration, using defaults if the file does not exist
    pub async fn load(&self) -> PrimeResult<Config> {
        if !self.config_path.exists() {
            debug!("Config file not found, using defaults");
            return Ok(Config::default());
        }

        self.load_from_file(&self.config_path).await
    }

    /// Load configuration from a specific file
    pub async fn load_from_file(&self, path: &Path) -> PrimeResult<Config> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| PrimeError::io(format!("reading config from {}", path.display()), e))?;

        toml::from_str(&content).map_err(|e| PrimeError::ConfigInvalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Save configuration to file
    pub async fn save(&self, config: &Config) -> PrimeResult<()> {
        self.ensure_config_dir().await?;

        let content = toml::to_string_pretty(config)?;
        fs::write(&self.config_path, content).await.map_err(|e| {
            PrimeError::io(
                format!("writing config to {}", self.config_path.display()),
                e,
            )
        })?;

        info!("Configuration saved to {}", self.config_path.display());
        Ok(())
    }

    /// Ensure the config directory exists
    async fn ensure_config_dir(&self) -> PrimeResult<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| PrimeError::ConfigDirCreate {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
        }
        Ok(())
    }

    /// Get the config file path
    pub fn path(&self) -> &Path {
        &self.config_path
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}
