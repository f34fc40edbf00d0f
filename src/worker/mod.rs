//! Queue consumers
//!
//! A [`Worker`] takes request IDs off the [`TaskQueue`](crate::queue::TaskQueue),
//! claims them in the ledger, serves them from the prime cache (extending it
//! when needed), and records the outcome. Contention and transient store
//! errors are retried with backoff; anything else fails the request.

pub mod pool;
pub mod retry;
#[allow(clippy::module_inception)]
pub mod worker;

pub use pool::{PoolOptions, WorkerPool};
pub use retry::RetryPolicy;
pub use worker::{TaskOutcome, Worker, WorkerContext, WorkerStats};
