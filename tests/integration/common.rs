//! Shared fixtures for integration tests

use async_trait::async_trait;
use primecache::cache::{CacheOptions, PrimeCacheStore};
use primecache::error::{PrimeError, PrimeResult};
use primecache::events::{EventCounters, Events};
use primecache::ledger::RequestLedger;
use primecache::queue::MemoryQueue;
use primecache::service::PrimeService;
use primecache::store::{CasOutcome, KvStore, MemoryStore, Versioned};
use primecache::worker::{PoolOptions, RetryPolicy, WorkerContext, WorkerPool, WorkerStats};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// How injected failures surface
#[derive(Debug, Clone, Copy)]
#[allow(dead_code)]
pub enum Fault {
    /// Permanent write failure
    Persistence,
    /// Transient outage the worker retries
    Unavailable,
}

/// Which conditional writes a [`FlakyStore`] may fail
#[derive(Debug, Clone, Copy)]
#[allow(dead_code)]
pub enum Target {
    /// Writes to the prime sequence
    Cache,
    /// Request records moving to the given status
    Status(&'static str),
}

impl Target {
    fn matches(&self, key: &str, value: &str) -> bool {
        match self {
            Self::Cache => key.starts_with("primes:"),
            Self::Status(status) => {
                key.starts_with("request:") && value.contains(&format!(r#""status":"{}""#, status))
            }
        }
    }
}

/// Store wrapper that fails selected conditional writes
///
/// The first `allowed` writes matching `target` succeed, the next `failures`
/// fail with `fault`, and everything after that succeeds again.
pub struct FlakyStore {
    inner: MemoryStore,
    target: Target,
    allowed: AtomicUsize,
    failures: AtomicUsize,
    fault: Fault,
}

#[allow(dead_code)]
impl FlakyStore {
    pub fn new(allowed: usize, failures: usize, fault: Fault) -> Arc<Self> {
        Self::targeting(Target::Cache, allowed, failures, fault)
    }

    pub fn targeting(target: Target, allowed: usize, failures: usize, fault: Fault) -> Arc<Self> {
        Arc::new(Self {
            inner: MemoryStore::new(),
            target,
            allowed: AtomicUsize::new(allowed),
            failures: AtomicUsize::new(failures),
            fault,
        })
    }

    /// Stop injecting failures
    pub fn heal(&self) {
        self.failures.store(0, Ordering::SeqCst);
    }

    fn should_fail(&self, key: &str, value: &str) -> bool {
        if !self.target.matches(key, value) {
            return false;
        }
        if self
            .allowed
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return false;
        }
        self.failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl KvStore for FlakyStore {
    async fn get(&self, key: &str) -> PrimeResult<Option<Versioned>> {
        self.inner.get(key).await
    }

    async fn put(&self, key: &str, value: String) -> PrimeResult<u64> {
        self.inner.put(key, value).await
    }

    async fn compare_and_set(
        &self,
        key: &str,
        expected: Option<u64>,
        value: String,
    ) -> PrimeResult<CasOutcome> {
        if self.should_fail(key, &value) {
            return Err(match self.fault {
                Fault::Persistence => PrimeError::persistence(key, "injected write failure"),
                Fault::Unavailable => PrimeError::StoreUnavailable("injected outage".into()),
            });
        }
        self.inner.compare_and_set(key, expected, value).await
    }

    async fn try_lock(&self, name: &str, owner: &str, lease: Duration) -> PrimeResult<bool> {
        self.inner.try_lock(name, owner, lease).await
    }

    async fn unlock(&self, name: &str, owner: &str) -> PrimeResult<bool> {
        self.inner.unlock(name, owner).await
    }

    async fn lock_holder(&self, name: &str) -> PrimeResult<Option<String>> {
        self.inner.lock_holder(name).await
    }

    async fn keys(&self, prefix: &str) -> PrimeResult<Vec<String>> {
        self.inner.keys(prefix).await
    }

    fn backend_name(&self) -> &'static str {
        "flaky"
    }
}

/// In-memory deployment: one store, one queue, shared by service and workers
pub struct Harness {
    pub service: PrimeService,
    pub ledger: Arc<RequestLedger>,
    pub queue: Arc<MemoryQueue>,
    pub cache: Arc<PrimeCacheStore>,
    pub counters: Arc<EventCounters>,
    events: Events,
    retry: RetryPolicy,
}

#[allow(dead_code)]
impl Harness {
    pub fn new(checkpoint_interval: usize) -> Self {
        Self::with_store(Arc::new(MemoryStore::new()), checkpoint_interval)
    }

    pub fn with_store(kv: Arc<dyn KvStore>, checkpoint_interval: usize) -> Self {
        let queue = Arc::new(MemoryQueue::new());
        let counters = Arc::new(EventCounters::new());
        let events = Events::new().with_sink(counters.clone());
        let ledger = Arc::new(RequestLedger::new(Arc::clone(&kv)));
        let cache = Arc::new(
            PrimeCacheStore::new(
                kv,
                CacheOptions {
                    checkpoint_interval,
                    lock_timeout: Duration::from_secs(5),
                    lock_lease: Duration::from_secs(5),
                },
            )
            .with_events(events.clone()),
        );

        Self {
            service: PrimeService::new(Arc::clone(&ledger), queue.clone()),
            ledger,
            queue,
            cache,
            counters,
            events,
            retry: RetryPolicy {
                max_retries: 3,
                initial_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(5),
            },
        }
    }

    pub fn without_retries(mut self) -> Self {
        self.retry = RetryPolicy::none();
        self
    }

    /// Run `concurrency` workers until the queue is empty
    pub async fn drain(&self, concurrency: usize) -> WorkerStats {
        let (interrupt, _) = watch::channel(false);
        let ctx = WorkerContext {
            ledger: Arc::clone(&self.ledger),
            cache: Arc::clone(&self.cache),
            queue: self.queue.clone(),
            events: self.events.clone(),
            retry: self.retry.clone(),
            poll_interval: Duration::from_millis(20),
        };
        let options = PoolOptions {
            concurrency,
            shutdown_grace: Duration::from_secs(1),
            drain: true,
        };

        WorkerPool::new(ctx, options, interrupt)
            .run(std::future::pending())
            .await
            .expect("worker pool")
    }
}

/// Primes by trial division against every smaller integer
pub fn is_prime_naive(n: u64) -> bool {
    n >= 2 && (2..n).all(|d| n % d != 0)
}
