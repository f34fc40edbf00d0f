//! Task transport
//!
//! Carries request IDs from submission to workers with at-least-once
//! delivery: a dequeued message stays in flight until acknowledged, and is
//! redelivered if it is returned or its worker dies. Duplicate deliveries are
//! absorbed by the ledger's idempotent claim.

mod memory;
mod spool;

pub use memory::MemoryQueue;
pub use spool::SpoolQueue;

use crate::error::PrimeResult;
use async_trait::async_trait;
use std::time::Duration;

/// One delivery of a queued request ID
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Request ID carried by the message
    pub id: String,

    /// 1 on first delivery, incremented on every return to the queue
    pub attempt: u32,

    /// Backend handle used to ack or return this delivery
    pub receipt: String,
}

/// Queue interface consumed by submission and workers
#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// Append a request ID
    async fn enqueue(&self, id: &str) -> PrimeResult<()>;

    /// Take the next message, waiting up to `wait` for one to arrive
    async fn dequeue(&self, wait: Duration) -> PrimeResult<Option<Delivery>>;

    /// Remove a delivered message for good
    async fn ack(&self, delivery: &Delivery) -> PrimeResult<()>;

    /// Return a delivered message for redelivery
    async fn nack(&self, delivery: &Delivery) -> PrimeResult<()>;

    /// Move every in-flight message back to the queue
    ///
    /// Used at worker start-up to pick up messages orphaned by a crash.
    async fn recover(&self) -> PrimeResult<usize>;

    /// Messages waiting for delivery (excludes in-flight)
    async fn ready_count(&self) -> PrimeResult<usize>;

    /// Human-readable backend name for display
    fn backend_name(&self) -> &'static str;
}
