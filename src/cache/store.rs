//! Shared prime cache
//!
//! Readers see the last persisted sequence. Writers go through
//! [`PrimeCacheStore::extend_to`], which holds the extension lock, re-checks
//! the target, and appends in checkpointed batches. A batch is only kept once
//! it is durably written; the sequence is never truncated.

use crate::cache::lock::{ExtensionGuard, ExtensionLock};
use crate::cache::sequence::{self, CacheSnapshot, CACHE_KEY};
use crate::config::schema::CacheConfig;
use crate::error::{PrimeError, PrimeResult};
use crate::events::{CoreEvent, Events};
use crate::oracle::PrimeOracle;
use crate::store::{CasOutcome, KvStore};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, info};

/// Tuning for [`PrimeCacheStore`]
#[derive(Debug, Clone)]
pub struct CacheOptions {
    /// New primes per persisted batch
    pub checkpoint_interval: usize,
    /// How long `extend_to` waits for the extension lock
    pub lock_timeout: Duration,
    /// Lease length; renewed after every checkpoint
    pub lock_lease: Duration,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self::from(&CacheConfig::default())
    }
}

impl From<&CacheConfig> for CacheOptions {
    fn from(config: &CacheConfig) -> Self {
        Self {
            checkpoint_interval: config.checkpoint_interval.max(1),
            lock_timeout: Duration::from_secs(config.lock_timeout_secs),
            lock_lease: Duration::from_secs(config.lock_lease_secs.max(1)),
        }
    }
}

/// Result of [`PrimeCacheStore::read_prefix`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prefix {
    /// The cache holds at least the requested count
    pub sufficient: bool,
    /// The first n primes when sufficient, otherwise everything cached
    pub primes: Vec<u64>,
}

/// The shared, persisted prime sequence
pub struct PrimeCacheStore {
    kv: Arc<dyn KvStore>,
    oracle: PrimeOracle,
    lock: ExtensionLock,
    checkpoint_interval: usize,
    events: Events,
    interrupt: Option<watch::Receiver<bool>>,
}

impl PrimeCacheStore {
    /// Create a cache over `kv`
    pub fn new(kv: Arc<dyn KvStore>, options: CacheOptions) -> Self {
        let lock = ExtensionLock::new(
            Arc::clone(&kv),
            "primes",
            options.lock_timeout,
            options.lock_lease,
        );
        Self {
            kv,
            oracle: PrimeOracle::new(),
            lock,
            checkpoint_interval: options.checkpoint_interval.max(1),
            events: Events::new(),
            interrupt: None,
        }
    }

    /// Use a specific oracle (shares its candidate counter)
    pub fn with_oracle(mut self, oracle: PrimeOracle) -> Self {
        self.oracle = oracle;
        self
    }

    /// Report events to `events`
    pub fn with_events(mut self, events: Events) -> Self {
        self.events = events;
        self
    }

    /// Stop extensions at the next checkpoint once `rx` turns true
    pub fn with_interrupt(mut self, rx: watch::Receiver<bool>) -> Self {
        self.interrupt = Some(rx);
        self
    }

    /// The oracle used for extension
    pub fn oracle(&self) -> &PrimeOracle {
        &self.oracle
    }

    /// Backend name of the underlying store
    pub fn backend_name(&self) -> &'static str {
        self.kv.backend_name()
    }

    /// Owner token of the current extension lease, if any
    pub async fn lock_holder(&self) -> PrimeResult<Option<String>> {
        self.lock.holder().await
    }

    /// The whole persisted sequence and its version
    pub async fn snapshot(&self) -> PrimeResult<CacheSnapshot> {
        CacheSnapshot::from_record(self.kv.get(CACHE_KEY).await?)
    }

    /// Non-blocking read of the first `n` primes
    pub async fn read_prefix(&self, n: usize) -> PrimeResult<Prefix> {
        let mut primes = self.snapshot().await?.primes;
        let sufficient = primes.len() >= n;
        if sufficient {
            primes.truncate(n);
        }
        Ok(Prefix { sufficient, primes })
    }

    /// Grow the sequence to at least `n` primes and return all of it
    ///
    /// Callers contending for the same range wait on the extension lock and
    /// find their target already met once they get it.
    pub async fn extend_to(&self, n: usize) -> PrimeResult<Vec<u64>> {
        let guard = self.lock.acquire().await?;
        let result = self.extend_locked(n, &guard).await;
        guard.release().await;
        result
    }

    async fn extend_locked(&self, n: usize, guard: &ExtensionGuard<'_>) -> PrimeResult<Vec<u64>> {
        let snapshot = self.snapshot().await?;
        if snapshot.primes.len() >= n {
            debug!(
                have = snapshot.primes.len(),
                need = n,
                "Target met by an earlier extension"
            );
            return Ok(snapshot.primes);
        }

        let started = Instant::now();
        let tested_before = self.oracle.candidates_tested();
        let from = snapshot.primes.len();
        let mut expected = snapshot.expected_version();
        let mut working = snapshot.primes;
        let mut flushed = from;

        info!(
            from = working.len(),
            to = n,
            start = working.last().map_or(2, |p| p + 1),
            "Extending prime cache"
        );

        while working.len() < n {
            if self.interrupted() {
                return Err(self.abandon(flushed, PrimeError::Interrupted { flushed }).await);
            }

            let batch_target = (working.len() + self.checkpoint_interval).min(n);
            let oracle = self.oracle.clone();
            working = match tokio::task::spawn_blocking(move || oracle.extend(working, batch_target))
                .await
            {
                Ok(Ok(extended)) => extended,
                Ok(Err(e)) => return Err(self.abandon(flushed, e).await),
                Err(e) => {
                    let err = PrimeError::Internal(format!("oracle task failed: {}", e));
                    return Err(self.abandon(flushed, err).await);
                }
            };

            // On failure the unflushed tail is dropped with `working`; the
            // store still holds the previous checkpoint.
            let version = match self.checkpoint(&working, expected).await {
                Ok(v) => v,
                Err(e) => return Err(self.abandon(flushed, e).await),
            };
            expected = Some(version);
            flushed = working.len();

            self.events
                .emit(CoreEvent::CheckpointWritten {
                    primes: flushed,
                    version,
                })
                .await;

            if working.len() < n {
                if let Err(e) = guard.renew().await {
                    return Err(self.abandon(flushed, e).await);
                }
            }
        }

        self.events
            .emit(CoreEvent::ExtensionCompleted {
                from,
                to: working.len(),
                candidates: self.oracle.candidates_tested() - tested_before,
                elapsed_ms: started.elapsed().as_millis() as u64,
            })
            .await;
        Ok(working)
    }

    /// Persist `primes` if the record is still at `expected`
    async fn checkpoint(&self, primes: &[u64], expected: Option<u64>) -> PrimeResult<u64> {
        let value = sequence::encode(primes)?;

        match self.kv.compare_and_set(CACHE_KEY, expected, value).await {
            Ok(CasOutcome::Written(v)) => Ok(v),
            Ok(CasOutcome::Conflict { current }) => Err(PrimeError::CacheConflict {
                expected: expected.unwrap_or(0),
                found: current.unwrap_or(0),
            }),
            Err(e @ (PrimeError::PersistenceWrite { .. } | PrimeError::StoreUnavailable(_))) => {
                Err(e)
            }
            Err(e) => Err(PrimeError::persistence(CACHE_KEY, e)),
        }
    }

    async fn abandon(&self, flushed: usize, err: PrimeError) -> PrimeError {
        self.events
            .emit(CoreEvent::ExtensionFailed {
                flushed,
                reason: err.to_string(),
            })
            .await;
        err
    }

    fn interrupted(&self) -> bool {
        self.interrupt.as_ref().is_some_and(|rx| *rx.borrow())
    }
}
