//! Submission boundary
//!
//! Validates the requested count, records a pending request, and hands its
//! ID to the queue. Status queries read straight from the ledger.

use crate::error::{PrimeError, PrimeResult};
use crate::ledger::{RequestLedger, TaskRequest};
use crate::queue::TaskQueue;
use std::sync::Arc;
use tracing::{debug, warn};

/// Front door for clients
#[derive(Clone)]
pub struct PrimeService {
    ledger: Arc<RequestLedger>,
    queue: Arc<dyn TaskQueue>,
}

impl PrimeService {
    pub fn new(ledger: Arc<RequestLedger>, queue: Arc<dyn TaskQueue>) -> Self {
        Self { ledger, queue }
    }

    /// Accept a request for the first `n` primes and return its ID
    ///
    /// Counts below 1 are rejected before anything is written.
    pub async fn submit(&self, n: i64) -> PrimeResult<String> {
        let count = usize::try_from(n)
            .ok()
            .filter(|&count| count > 0)
            .ok_or(PrimeError::InvalidCount(n))?;

        let id = TaskRequest::new_id();
        self.ledger.create(&id, count).await?;

        if let Err(e) = self.queue.enqueue(&id).await {
            warn!(request_id = %id, error = %e, "Request recorded but not queued");
            return Err(e);
        }

        debug!(request_id = %id, n = count, "Request submitted");
        Ok(id)
    }

    /// Current state of a request
    pub async fn status(&self, id: &str) -> PrimeResult<TaskRequest> {
        self.ledger.get(id).await
    }

    /// Every known request, newest first
    pub async fn list(&self) -> PrimeResult<Vec<TaskRequest>> {
        self.ledger.list().await
    }
}
