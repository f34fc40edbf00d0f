//! Wiring of backends from configuration
//!
//! Every CLI command works against the same on-disk layout:
//!
//! | Path | Contents |
//! |------|----------|
//! | `<data_dir>/store/` | requests, the prime sequence, leases ([`FileStore`]) |
//! | `<data_dir>/queue/` | pending task messages ([`SpoolQueue`]) |
//! | `<data_dir>/events.log` | JSON-lines event log ([`EventLog`]) |

use crate::cache::{CacheOptions, PrimeCacheStore};
use crate::config::{Config, ConfigManager};
use crate::error::PrimeResult;
use crate::event_log::EventLog;
use crate::events::{EventCounters, Events, TracingSink};
use crate::ledger::RequestLedger;
use crate::queue::{SpoolQueue, TaskQueue};
use crate::service::PrimeService;
use crate::store::{FileStore, KvStore};
use crate::worker::{PoolOptions, RetryPolicy, WorkerContext, WorkerPool};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::debug;

/// Opened backends for one process
pub struct App {
    config: Config,
    data_dir: PathBuf,
    kv: Arc<dyn KvStore>,
    queue: Arc<dyn TaskQueue>,
    ledger: Arc<RequestLedger>,
    events: Events,
    counters: Arc<EventCounters>,
}

impl App {
    /// Open (creating if needed) the store and queue under `data_dir`
    pub async fn open(config: Config, data_dir: PathBuf) -> PrimeResult<Self> {
        let poll_interval = Duration::from_millis(config.worker.poll_interval_ms.max(1));
        let kv: Arc<dyn KvStore> =
            Arc::new(FileStore::open(ConfigManager::store_dir(&data_dir)).await?);
        let queue: Arc<dyn TaskQueue> =
            Arc::new(SpoolQueue::open(ConfigManager::queue_dir(&data_dir), poll_interval).await?);

        let counters = Arc::new(EventCounters::new());
        let events = Events::new()
            .with_sink(Arc::new(TracingSink))
            .with_sink(counters.clone())
            .with_sink(Arc::new(EventLog::new(
                ConfigManager::event_log_path(&data_dir),
                config.general.event_log,
            )));

        debug!(data_dir = %data_dir.display(), "Opened backends");
        Ok(Self {
            ledger: Arc::new(RequestLedger::new(Arc::clone(&kv))),
            config,
            data_dir,
            kv,
            queue,
            events,
            counters,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn queue(&self) -> &Arc<dyn TaskQueue> {
        &self.queue
    }

    pub fn ledger(&self) -> &Arc<RequestLedger> {
        &self.ledger
    }

    /// Totals of events emitted by this process
    pub fn counters(&self) -> &EventCounters {
        &self.counters
    }

    pub fn service(&self) -> PrimeService {
        PrimeService::new(Arc::clone(&self.ledger), Arc::clone(&self.queue))
    }

    /// Cache over the shared store, optionally interruptible
    pub fn cache(&self, interrupt: Option<watch::Receiver<bool>>) -> PrimeCacheStore {
        let cache = PrimeCacheStore::new(
            Arc::clone(&self.kv),
            CacheOptions::from(&self.config.cache),
        )
        .with_events(self.events.clone());

        match interrupt {
            Some(rx) => cache.with_interrupt(rx),
            None => cache,
        }
    }

    /// Worker pool sized from config unless `concurrency` overrides it
    pub fn worker_pool(&self, concurrency: Option<usize>, drain: bool) -> WorkerPool {
        let worker = &self.config.worker;
        let (interrupt_tx, interrupt_rx) = watch::channel(false);

        let ctx = WorkerContext {
            ledger: Arc::clone(&self.ledger),
            cache: Arc::new(self.cache(Some(interrupt_rx))),
            queue: Arc::clone(&self.queue),
            events: self.events.clone(),
            retry: RetryPolicy::from(worker),
            poll_interval: Duration::from_millis(worker.poll_interval_ms.max(1)),
        };
        let options = PoolOptions {
            concurrency: concurrency.unwrap_or(worker.concurrency).max(1),
            shutdown_grace: Duration::from_secs(worker.shutdown_grace_secs),
            drain,
        };

        WorkerPool::new(ctx, options, interrupt_tx)
    }
}
