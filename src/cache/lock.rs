//! Extension lock
//!
//! Serializes cache extension. Contenders in one process queue on an async
//! mutex; across processes the holder keeps a lease in the key-value store.
//! Each acquisition uses its own owner token, so a late release from an
//! earlier holder can never drop a newer holder's lease.

use crate::error::{PrimeError, PrimeResult};
use crate::store::KvStore;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard};
use tokio::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

const LEASE_POLL: Duration = Duration::from_millis(25);

/// Named lock with acquisition timeout and lease
pub struct ExtensionLock {
    name: String,
    instance: String,
    acquisitions: AtomicU64,
    kv: Arc<dyn KvStore>,
    local: Mutex<()>,
    timeout: Duration,
    lease: Duration,
}

/// Proof of holding an [`ExtensionLock`]
///
/// Call [`ExtensionGuard::release`] when done. A guard dropped without
/// release (panic, cancelled future) schedules the release on the runtime;
/// if that is impossible the lease simply expires.
pub struct ExtensionGuard<'a> {
    lock: &'a ExtensionLock,
    owner: String,
    released: bool,
    _local: MutexGuard<'a, ()>,
}

impl ExtensionLock {
    /// Create a lock stored under `lock:{name}`
    pub fn new(kv: Arc<dyn KvStore>, name: &str, timeout: Duration, lease: Duration) -> Self {
        Self {
            name: format!("lock:{}", name),
            instance: Uuid::new_v4().simple().to_string(),
            acquisitions: AtomicU64::new(0),
            kv,
            local: Mutex::new(()),
            timeout,
            lease,
        }
    }

    /// Lease key in the store
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Owner token of the current lease holder, if any
    pub async fn holder(&self) -> PrimeResult<Option<String>> {
        self.kv.lock_holder(&self.name).await
    }

    /// Wait up to the configured timeout for exclusive ownership
    pub async fn acquire(&self) -> PrimeResult<ExtensionGuard<'_>> {
        let started = Instant::now();

        let local = tokio::time::timeout(self.timeout, self.local.lock())
            .await
            .map_err(|_| self.timed_out(started))?;

        let seq = self.acquisitions.fetch_add(1, Ordering::Relaxed);
        let owner = format!("{}-{}", self.instance, seq);

        loop {
            if self.kv.try_lock(&self.name, &owner, self.lease).await? {
                debug!(lock = %self.name, owner = %owner, "Acquired extension lock");
                return Ok(ExtensionGuard {
                    lock: self,
                    owner,
                    released: false,
                    _local: local,
                });
            }

            let elapsed = started.elapsed();
            if elapsed >= self.timeout {
                return Err(self.timed_out(started));
            }
            tokio::time::sleep(LEASE_POLL.min(self.timeout - elapsed)).await;
        }
    }

    fn timed_out(&self, started: Instant) -> PrimeError {
        PrimeError::ExtensionLockTimeout {
            name: self.name.clone(),
            waited_ms: started.elapsed().as_millis() as u64,
        }
    }
}

impl ExtensionGuard<'_> {
    /// Owner token of this acquisition
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Extend the lease; fails if another owner has taken it over
    pub async fn renew(&self) -> PrimeResult<()> {
        if self
            .lock
            .kv
            .try_lock(&self.lock.name, &self.owner, self.lock.lease)
            .await?
        {
            Ok(())
        } else {
            Err(PrimeError::LeaseLost(self.lock.name.clone()))
        }
    }

    /// Release the lease and the in-process mutex
    pub async fn release(mut self) {
        self.released = true;
        match self.lock.kv.unlock(&self.lock.name, &self.owner).await {
            Ok(true) => debug!(lock = %self.lock.name, "Released extension lock"),
            Ok(false) => warn!(lock = %self.lock.name, "Extension lease already gone at release"),
            Err(e) => warn!(
                lock = %self.lock.name,
                "Failed to release extension lease, it will expire: {}", e
            ),
        }
    }
}

impl Drop for ExtensionGuard<'_> {
    fn drop(&mut self) {
        if self.released {
            return;
        }

        let kv = Arc::clone(&self.lock.kv);
        let name = self.lock.name.clone();
        let owner = std::mem::take(&mut self.owner);
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                if let Err(e) = kv.unlock(&name, &owner).await {
                    warn!(lock = %name, "Deferred release failed: {}", e);
                }
            });
        }
    }
}
