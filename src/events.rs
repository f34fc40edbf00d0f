//! Core events
//!
//! The cache and the worker report what they do as [`CoreEvent`]s. Sinks
//! decide what to do with them; the core never depends on how (or whether)
//! they are exported.

use crate::ledger::RequestStatus;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Something observable happened in the core
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CoreEvent {
    /// A worker claimed a request
    TaskStarted { id: String, n: usize },

    /// The cache already covered the request
    CacheHit { id: String, n: usize, cached: usize },

    /// The cache had to be extended for the request
    CacheMiss { id: String, n: usize, cached: usize },

    /// A batch of new primes was persisted
    CheckpointWritten { primes: usize, version: u64 },

    /// An extension reached its target
    ExtensionCompleted {
        from: usize,
        to: usize,
        candidates: u64,
        elapsed_ms: u64,
    },

    /// An extension stopped early; `flushed` primes remain persisted
    ExtensionFailed { flushed: usize, reason: String },

    /// A request reached a terminal state
    TaskFinished {
        id: String,
        status: RequestStatus,
        elapsed_ms: u64,
    },
}

impl CoreEvent {
    /// Dotted event name used in logs
    pub fn name(&self) -> &'static str {
        match self {
            Self::TaskStarted { .. } => "task.started",
            Self::CacheHit { .. } => "cache.hit",
            Self::CacheMiss { .. } => "cache.miss",
            Self::CheckpointWritten { .. } => "cache.checkpoint",
            Self::ExtensionCompleted { .. } => "extension.completed",
            Self::ExtensionFailed { .. } => "extension.failed",
            Self::TaskFinished { .. } => "task.finished",
        }
    }
}

/// Receiver of core events
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Handle one event; must not fail the caller
    async fn emit(&self, event: &CoreEvent);
}

/// Fan-out to any number of sinks
#[derive(Clone, Default)]
pub struct Events {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl Events {
    /// No sinks; events are dropped
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sink
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Deliver an event to every sink in order
    pub async fn emit(&self, event: CoreEvent) {
        for sink in &self.sinks {
            sink.emit(&event).await;
        }
    }
}

/// Forwards events to `tracing`
pub struct TracingSink;

#[async_trait]
impl EventSink for TracingSink {
    async fn emit(&self, event: &CoreEvent) {
        match event {
            CoreEvent::TaskStarted { id, n } => info!(request_id = %id, n, "Task started"),
            CoreEvent::CacheHit { id, n, cached } => {
                info!(request_id = %id, n, cached, "Using cached primes")
            }
            CoreEvent::CacheMiss { id, n, cached } => {
                info!(request_id = %id, n, cached, "Cache miss, extending")
            }
            CoreEvent::CheckpointWritten { primes, version } => {
                debug!(primes, version, "Persisted progress")
            }
            CoreEvent::ExtensionCompleted {
                from,
                to,
                candidates,
                elapsed_ms,
            } => info!(from, to, candidates, elapsed_ms, "Extension finished"),
            CoreEvent::ExtensionFailed { flushed, reason } => {
                warn!(flushed, reason = %reason, "Extension failed")
            }
            CoreEvent::TaskFinished {
                id,
                status,
                elapsed_ms,
            } => info!(request_id = %id, status = %status, elapsed_ms, "Task finished"),
        }
    }
}

/// Running totals of core events
#[derive(Debug, Default)]
pub struct EventCounters {
    tasks_started: AtomicU64,
    tasks_done: AtomicU64,
    tasks_failed: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    checkpoints: AtomicU64,
    extensions_completed: AtomicU64,
    extensions_failed: AtomicU64,
    primes_computed: AtomicU64,
}

/// Point-in-time copy of [`EventCounters`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CounterSnapshot {
    pub tasks_started: u64,
    pub tasks_done: u64,
    pub tasks_failed: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub checkpoints: u64,
    pub extensions_completed: u64,
    pub extensions_failed: u64,
    pub primes_computed: u64,
}

impl EventCounters {
    /// Create zeroed counters
    pub fn new() -> Self {
        Self::default()
    }

    /// Read all counters
    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            tasks_started: self.tasks_started.load(Ordering::Relaxed),
            tasks_done: self.tasks_done.load(Ordering::Relaxed),
            tasks_failed: self.tasks_failed.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            checkpoints: self.checkpoints.load(Ordering::Relaxed),
            extensions_completed: self.extensions_completed.load(Ordering::Relaxed),
            extensions_failed: self.extensions_failed.load(Ordering::Relaxed),
            primes_computed: self.primes_computed.load(Ordering::Relaxed),
        }
    }
}

#[async_trait]
impl EventSink for EventCounters {
    async fn emit(&self, event: &CoreEvent) {
        let counter = match event {
            CoreEvent::TaskStarted { .. } => &self.tasks_started,
            CoreEvent::CacheHit { .. } => &self.cache_hits,
            CoreEvent::CacheMiss { .. } => &self.cache_misses,
            CoreEvent::CheckpointWritten { .. } => &self.checkpoints,
            CoreEvent::ExtensionCompleted { from, to, .. } => {
                let added = to.saturating_sub(*from) as u64;
                self.primes_computed.fetch_add(added, Ordering::Relaxed);
                &self.extensions_completed
            }
            CoreEvent::ExtensionFailed { .. } => &self.extensions_failed,
            CoreEvent::TaskFinished { status, .. } => match status {
                RequestStatus::Done => &self.tasks_done,
                _ => &self.tasks_failed,
            },
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}
