//! Configuration schema for primecache
//!
//! Configuration is stored at `~/.config/primecache/config.toml`

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Persistence settings
    pub storage: StorageConfig,

    /// Prime cache settings
    pub cache: CacheConfig,

    /// Worker settings
    pub worker: WorkerConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,

    /// Append core events to `<data_dir>/events.log`
    pub event_log: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
            event_log: true,
        }
    }
}

/// Persistence settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding the store and the queue (default: platform data dir)
    pub data_dir: Option<PathBuf>,
}

/// Prime cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Persist progress every N newly found primes
    pub checkpoint_interval: usize,

    /// Seconds to wait for the extension lock
    pub lock_timeout_secs: u64,

    /// Seconds an extension lease lasts without renewal
    pub lock_lease_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            checkpoint_interval: 100,
            lock_timeout_secs: 30,
            lock_lease_secs: 60,
        }
    }
}

/// Worker settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Workers per process
    pub concurrency: usize,

    /// Retries for contention and transient store errors
    pub max_retries: usize,

    /// First retry delay in milliseconds
    pub retry_initial_ms: u64,

    /// Largest retry delay in milliseconds
    pub retry_max_ms: u64,

    /// How often an idle worker checks the queue, in milliseconds
    pub poll_interval_ms: u64,

    /// Seconds in-flight tasks get to finish on shutdown
    pub shutdown_grace_secs: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: 2,
            max_retries: 5,
            retry_initial_ms: 100,
            retry_max_ms: 5_000,
            poll_interval_ms: 250,
            shutdown_grace_secs: 10,
        }
    }
}
