//! In-process key-value store

use crate::error::PrimeResult;
use crate::store::{next_version, CasOutcome, KvStore, Versioned};
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;

#[derive(Debug)]
struct Lease {
    owner: String,
    expires_at: Instant,
}

/// Key-value store held in memory, shared by cloning an `Arc`
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<String, Versioned>>,
    leases: Mutex<HashMap<String, Lease>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> PrimeResult<Option<Versioned>> {
        Ok(self.records.read().await.get(key).cloned())
    }

    async fn put(&self, key: &str, value: String) -> PrimeResult<u64> {
        let mut records = self.records.write().await;
        let version = next_version(records.get(key));
        records.insert(key.to_string(), Versioned { version, value });
        Ok(version)
    }

    async fn compare_and_set(
        &self,
        key: &str,
        expected: Option<u64>,
        value: String,
    ) -> PrimeResult<CasOutcome> {
        let mut records = self.records.write().await;
        let current = records.get(key).map(|v| v.version);
        if current != expected {
            return Ok(CasOutcome::Conflict { current });
        }

        let version = next_version(records.get(key));
        records.insert(key.to_string(), Versioned { version, value });
        Ok(CasOutcome::Written(version))
    }

    async fn try_lock(&self, name: &str, owner: &str, lease: Duration) -> PrimeResult<bool> {
        let mut leases = self.leases.lock().await;
        let now = Instant::now();

        if let Some(held) = leases.get(name) {
            if held.owner != owner && held.expires_at > now {
                return Ok(false);
            }
        }

        leases.insert(
            name.to_string(),
            Lease {
                owner: owner.to_string(),
                expires_at: now + lease,
            },
        );
        Ok(true)
    }

    async fn unlock(&self, name: &str, owner: &str) -> PrimeResult<bool> {
        let mut leases = self.leases.lock().await;
        if leases.get(name).is_some_and(|l| l.owner == owner) {
            leases.remove(name);
            return Ok(true);
        }
        Ok(false)
    }

    async fn lock_holder(&self, name: &str) -> PrimeResult<Option<String>> {
        let leases = self.leases.lock().await;
        Ok(leases
            .get(name)
            .filter(|l| l.expires_at > Instant::now())
            .map(|l| l.owner.clone()))
    }

    async fn keys(&self, prefix: &str) -> PrimeResult<Vec<String>> {
        let records = self.records.read().await;
        let mut keys: Vec<String> = records
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
