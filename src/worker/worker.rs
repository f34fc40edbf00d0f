//! A single queue consumer

use crate::cache::PrimeCacheStore;
use crate::error::{PrimeError, PrimeResult};
use crate::events::{CoreEvent, Events};
use crate::ledger::{Claim, RequestLedger, RequestStatus, TaskRequest};
use crate::queue::{Delivery, TaskQueue};
use crate::worker::retry::RetryPolicy;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, error, warn};

/// Everything a worker needs, shared by all workers in a pool
pub struct WorkerContext {
    pub ledger: Arc<RequestLedger>,
    pub cache: Arc<PrimeCacheStore>,
    pub queue: Arc<dyn TaskQueue>,
    pub events: Events,
    pub retry: RetryPolicy,
    /// How long an idle dequeue waits before re-checking for shutdown
    pub poll_interval: Duration,
}

/// What happened to one delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    /// Request finished with a result
    Done,
    /// Request finished with an error recorded
    Failed,
    /// Delivery acknowledged without work (duplicate, missing, or settled)
    Skipped,
    /// Outcome could not be recorded; message returned to the queue
    Returned,
}

/// Per-worker tallies
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub done: u64,
    pub failed: u64,
    pub skipped: u64,
    pub returned: u64,
}

impl WorkerStats {
    pub fn record(&mut self, outcome: TaskOutcome) {
        match outcome {
            TaskOutcome::Done => self.done += 1,
            TaskOutcome::Failed => self.failed += 1,
            TaskOutcome::Skipped => self.skipped += 1,
            TaskOutcome::Returned => self.returned += 1,
        }
    }

    pub fn merge(&mut self, other: WorkerStats) {
        self.done += other.done;
        self.failed += other.failed;
        self.skipped += other.skipped;
        self.returned += other.returned;
    }

    /// Deliveries handled in total
    pub fn total(&self) -> u64 {
        self.done + self.failed + self.skipped + self.returned
    }
}

/// Consumes request IDs and drives each request to a terminal state
pub struct Worker {
    index: usize,
    ctx: Arc<WorkerContext>,
}

impl Worker {
    pub fn new(index: usize, ctx: Arc<WorkerContext>) -> Self {
        Self { index, ctx }
    }

    /// Consume until `stop` turns true, or until the queue is empty in drain mode
    ///
    /// A delivery in progress is always finished before the stop flag is
    /// checked again.
    pub async fn run(&self, stop: watch::Receiver<bool>, drain: bool) -> WorkerStats {
        let mut stats = WorkerStats::default();
        debug!(worker = self.index, drain, "Worker started");

        while !*stop.borrow() {
            let delivery = match self.ctx.queue.dequeue(self.ctx.poll_interval).await {
                Ok(Some(delivery)) => delivery,
                Ok(None) if drain => break,
                Ok(None) => continue,
                Err(e) => {
                    warn!(worker = self.index, error = %e, "Dequeue failed");
                    tokio::time::sleep(self.ctx.poll_interval).await;
                    continue;
                }
            };

            stats.record(self.process(&delivery).await);
        }

        debug!(worker = self.index, handled = stats.total(), "Worker stopped");
        stats
    }

    /// Handle one delivery and acknowledge or return it
    pub async fn process(&self, delivery: &Delivery) -> TaskOutcome {
        match self.handle(delivery).await {
            Ok(outcome) => {
                if let Err(e) = self.ctx.queue.ack(delivery).await {
                    warn!(request_id = %delivery.id, error = %e, "Acknowledgement failed");
                }
                outcome
            }
            Err(e) => {
                error!(
                    request_id = %delivery.id,
                    attempt = delivery.attempt,
                    error = %e,
                    "Could not record outcome, returning task to the queue"
                );
                if let Err(e) = self.ctx.queue.nack(delivery).await {
                    warn!(request_id = %delivery.id, error = %e, "Return to queue failed");
                }
                TaskOutcome::Returned
            }
        }
    }

    /// Run the request named by `delivery` to completion
    ///
    /// `Err` means the ledger could not be updated and the delivery should be
    /// retried later. Any computation failure is recorded on the request and
    /// reported as [`TaskOutcome::Failed`].
    pub async fn handle(&self, delivery: &Delivery) -> PrimeResult<TaskOutcome> {
        let ctx = &self.ctx;
        let id = delivery.id.as_str();
        let started = Instant::now();

        // A redelivery means the previous holder gave the request up
        let redelivered = delivery.attempt > 1;
        let claimed = if redelivered {
            ctx.retry.run("reclaim", || ctx.ledger.reclaim(id)).await
        } else {
            ctx.retry.run("claim", || ctx.ledger.claim(id)).await
        };

        let request = match claimed {
            Ok(Claim::Acquired(request)) => request,
            Ok(Claim::Settled(request)) => {
                debug!(request_id = %id, status = %request.status, "Already settled, skipping");
                return Ok(TaskOutcome::Skipped);
            }
            Err(PrimeError::AlreadyClaimed { .. }) => {
                warn!(request_id = %id, "Request is being processed elsewhere, skipping");
                return Ok(TaskOutcome::Skipped);
            }
            Err(PrimeError::NotFound(_)) => {
                warn!(request_id = %id, "No ledger record for queued request, dropping");
                return Ok(TaskOutcome::Skipped);
            }
            Err(e) => return Err(e),
        };

        ctx.events
            .emit(CoreEvent::TaskStarted {
                id: request.id.clone(),
                n: request.n,
            })
            .await;

        let (status, outcome, recorded) = match self.compute(&request).await {
            Ok(primes) => {
                let recorded = ctx
                    .retry
                    .run("complete", || ctx.ledger.complete(id, primes.clone()))
                    .await;
                (RequestStatus::Done, TaskOutcome::Done, recorded)
            }
            Err(cause) => {
                let message = cause.to_string();
                let recorded = ctx
                    .retry
                    .run("fail", || ctx.ledger.fail(id, &message))
                    .await;
                (RequestStatus::Failed, TaskOutcome::Failed, recorded)
            }
        };

        if let Err(e) = recorded {
            if matches!(e, PrimeError::InvalidTransition { .. }) && self.settled_elsewhere(id).await
            {
                debug!(request_id = %id, "Finished by another worker, skipping");
                return Ok(TaskOutcome::Skipped);
            }
            return Err(e);
        }

        ctx.events
            .emit(CoreEvent::TaskFinished {
                id: request.id.clone(),
                status,
                elapsed_ms: started.elapsed().as_millis() as u64,
            })
            .await;

        Ok(outcome)
    }

    /// Whether another worker already moved the request to a terminal state
    async fn settled_elsewhere(&self, id: &str) -> bool {
        matches!(self.ctx.ledger.get(id).await, Ok(request) if request.status.is_terminal())
    }

    /// First `request.n` primes, from the cache or by extending it
    async fn compute(&self, request: &TaskRequest) -> PrimeResult<Vec<u64>> {
        let ctx = &self.ctx;
        let n = request.n;

        let prefix = ctx
            .retry
            .run("read cache", || ctx.cache.read_prefix(n))
            .await?;

        if prefix.sufficient {
            ctx.events
                .emit(CoreEvent::CacheHit {
                    id: request.id.clone(),
                    n,
                    cached: prefix.primes.len(),
                })
                .await;
            return Ok(prefix.primes);
        }

        ctx.events
            .emit(CoreEvent::CacheMiss {
                id: request.id.clone(),
                n,
                cached: prefix.primes.len(),
            })
            .await;

        let mut primes = ctx
            .retry
            .run("extend cache", || ctx.cache.extend_to(n))
            .await?;
        primes.truncate(n);
        Ok(primes)
    }
}
