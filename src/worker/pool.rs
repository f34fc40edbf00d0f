//! Worker pool with phased shutdown
//!
//! Shutdown runs in three phases:
//!
//! 1. Workers stop taking new deliveries.
//! 2. In-flight tasks get the grace period to finish on their own.
//! 3. Extensions still running are interrupted at their next checkpoint,
//!    which keeps every batch already written. The interrupted request is
//!    recorded as failed.

use crate::error::PrimeResult;
use crate::worker::worker::{Worker, WorkerContext, WorkerStats};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

/// How a pool runs
#[derive(Debug, Clone)]
pub struct PoolOptions {
    /// Number of concurrent workers
    pub concurrency: usize,
    /// Time in-flight tasks get to finish after a shutdown request
    pub shutdown_grace: Duration,
    /// Exit once the queue is empty instead of waiting for more work
    pub drain: bool,
}

/// A set of workers sharing one [`WorkerContext`]
pub struct WorkerPool {
    ctx: Arc<WorkerContext>,
    options: PoolOptions,
    interrupt: watch::Sender<bool>,
}

impl WorkerPool {
    /// `interrupt` must be the sender whose receiver was given to the cache
    pub fn new(ctx: WorkerContext, options: PoolOptions, interrupt: watch::Sender<bool>) -> Self {
        Self {
            ctx: Arc::new(ctx),
            options,
            interrupt,
        }
    }

    /// Run workers until they drain the queue or `shutdown` resolves
    pub async fn run<F>(self, shutdown: F) -> PrimeResult<WorkerStats>
    where
        F: Future<Output = ()>,
    {
        let recovered = self.ctx.queue.recover().await?;
        if recovered > 0 {
            info!(recovered, "Requeued unacknowledged tasks");
        }

        let concurrency = self.options.concurrency.max(1);
        let (stop_tx, stop_rx) = watch::channel(false);
        let mut workers = JoinSet::new();
        for index in 0..concurrency {
            let worker = Worker::new(index, Arc::clone(&self.ctx));
            let stop = stop_rx.clone();
            let drain = self.options.drain;
            workers.spawn(async move { worker.run(stop, drain).await });
        }
        info!(
            concurrency,
            drain = self.options.drain,
            queue = self.ctx.queue.backend_name(),
            "Worker pool started"
        );

        let mut stats = WorkerStats::default();
        tokio::pin!(shutdown);

        // Running: until every worker exits or shutdown is requested
        loop {
            tokio::select! {
                joined = workers.join_next() => match joined {
                    Some(result) => collect(&mut stats, result),
                    None => {
                        info!(handled = stats.total(), "Queue drained");
                        return Ok(stats);
                    }
                },
                () = &mut shutdown => break,
            }
        }

        // === Phase 1: Stop taking new tasks ===
        info!("Shutdown requested, no new tasks will be taken");
        let _ = stop_tx.send(true);

        // === Phase 2: Let in-flight tasks finish ===
        debug!(grace = ?self.options.shutdown_grace, "Waiting for in-flight tasks");
        let finished = timeout(self.options.shutdown_grace, async {
            while let Some(result) = workers.join_next().await {
                collect(&mut stats, result);
            }
        })
        .await;

        // === Phase 3: Interrupt what is left ===
        if finished.is_err() {
            warn!(
                remaining = workers.len(),
                "Grace period expired, interrupting extensions at the next checkpoint"
            );
            let _ = self.interrupt.send(true);
            while let Some(result) = workers.join_next().await {
                collect(&mut stats, result);
            }
        }

        info!(handled = stats.total(), "Worker pool stopped");
        Ok(stats)
    }
}

fn collect(stats: &mut WorkerStats, result: Result<WorkerStats, tokio::task::JoinError>) {
    match result {
        Ok(worker) => stats.merge(worker),
        Err(e) => error!(error = %e, "Worker task panicked"),
    }
}
