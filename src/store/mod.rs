//! Key-value persistence
//!
//! The cache and the ledger persist through [`KvStore`], which offers plain
//! reads and writes, compare-and-set on a per-key version, and named leases
//! for cross-process mutual exclusion.
//!
//! | Backend | Scope | Used by |
//! |---------|-------|---------|
//! | [`MemoryStore`] | one process | tests, embedding |
//! | [`FileStore`] | one data directory, many processes | CLI |

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use crate::error::PrimeResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A stored value with the version it was written at
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Versioned {
    /// Starts at 1 and grows by one on every write
    pub version: u64,

    /// Serialized payload
    pub value: String,
}

/// Result of a compare-and-set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CasOutcome {
    /// The value was written at this version
    Written(u64),
    /// The stored version did not match (`None` = key absent)
    Conflict { current: Option<u64> },
}

/// Key-value persistence interface
///
/// Implementations must make `compare_and_set`, `try_lock` and `unlock`
/// atomic with respect to every other caller sharing the same backing data.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Read a key
    async fn get(&self, key: &str) -> PrimeResult<Option<Versioned>>;

    /// Write a key unconditionally, returning the new version
    async fn put(&self, key: &str, value: String) -> PrimeResult<u64>;

    /// Write a key only if its version is `expected` (`None` = must not exist)
    async fn compare_and_set(
        &self,
        key: &str,
        expected: Option<u64>,
        value: String,
    ) -> PrimeResult<CasOutcome>;

    /// Take or renew the lease `name` for `owner`
    ///
    /// Succeeds when the lease is free, expired, or already held by `owner`.
    async fn try_lock(&self, name: &str, owner: &str, lease: Duration) -> PrimeResult<bool>;

    /// Drop the lease `name` if `owner` holds it
    async fn unlock(&self, name: &str, owner: &str) -> PrimeResult<bool>;

    /// Current holder of the lease `name`, if unexpired
    async fn lock_holder(&self, name: &str) -> PrimeResult<Option<String>>;

    /// All keys starting with `prefix`
    async fn keys(&self, prefix: &str) -> PrimeResult<Vec<String>>;

    /// Human-readable backend name for display
    fn backend_name(&self) -> &'static str;
}

/// Next version after `current`
pub(crate) fn next_version(current: Option<&Versioned>) -> u64 {
    current.map_or(1, |v| v.version + 1)
}
