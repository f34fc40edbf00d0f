//! Error types for primecache
//!
//! All modules use `PrimeResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for primecache operations
pub type PrimeResult<T> = Result<T, PrimeError>;

/// All errors that can occur in primecache
#[derive(Error, Debug)]
pub enum PrimeError {
    // Submission errors
    #[error("Invalid prime count {0}: must be a positive integer")]
    InvalidCount(i64),

    // Ledger errors
    #[error("Request already exists: {0}")]
    DuplicateId(String),

    #[error("Request not found: {0}")]
    NotFound(String),

    #[error("Request {id} already claimed (status: {status})")]
    AlreadyClaimed { id: String, status: String },

    #[error("Invalid transition for request {id}: {reason}")]
    InvalidTransition { id: String, reason: String },

    #[error("Request {id} failed: {reason}")]
    RequestFailed { id: String, reason: String },

    #[error("Request {id} still {status} after {waited_secs}s")]
    WaitTimeout {
        id: String,
        status: String,
        waited_secs: u64,
    },

    // Cache errors
    #[error("Timed out after {waited_ms}ms waiting for extension lock {name}")]
    ExtensionLockTimeout { name: String, waited_ms: u64 },

    #[error("Failed to persist {key}: {reason}")]
    PersistenceWrite { key: String, reason: String },

    #[error("Prime cache changed concurrently (expected version {expected}, found {found})")]
    CacheConflict { expected: u64, found: u64 },

    #[error("Lost lease on extension lock {0}")]
    LeaseLost(String),

    #[error("Prime cache record is corrupt: {0}")]
    CorruptCache(String),

    #[error("Arithmetic overflow extending primes past {0}")]
    ArithmeticOverflow(u64),

    #[error("Extension interrupted by shutdown after {flushed} primes were checkpointed")]
    Interrupted { flushed: usize },

    // Infrastructure errors
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Queue error: {0}")]
    Queue(String),

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PrimeError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a persistence write error
    pub fn persistence(key: impl Into<String>, reason: impl ToString) -> Self {
        Self::PersistenceWrite {
            key: key.into(),
            reason: reason.to_string(),
        }
    }

    /// Create an invalid transition error
    pub fn transition(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidTransition {
            id: id.into(),
            reason: reason.into(),
        }
    }

    /// Check if error is retryable
    ///
    /// Contention and transient store failures are retried by the worker;
    /// everything else ends the request.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ExtensionLockTimeout { .. }
                | Self::LeaseLost(_)
                | Self::CacheConflict { .. }
                | Self::StoreUnavailable(_)
        )
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::InvalidCount(_) => Some("Pass a count of at least 1"),
            Self::NotFound(_) => Some("Run: primecache list"),
            Self::ExtensionLockTimeout { .. } => {
                Some("Another worker is extending the cache; raise cache.lock_timeout_secs")
            }
            Self::CorruptCache(_) => Some("Inspect the cache with: primecache cache info"),
            Self::StoreUnavailable(_) => Some("Check that storage.data_dir is writable"),
            Self::WaitTimeout { .. } => Some("Start a worker with: primecache worker"),
            _ => None,
        }
    }
}
