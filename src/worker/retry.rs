//! Retry with exponential backoff for contention and transient store errors

use crate::config::schema::WorkerConfig;
use crate::error::{PrimeError, PrimeResult};
use backon::{ExponentialBuilder, Retryable};
use std::future::Future;
use std::time::Duration;

/// Backoff settings for worker retries
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts
    pub max_retries: usize,
    /// Initial delay between retries
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&WorkerConfig::default())
    }
}

impl From<&WorkerConfig> for RetryPolicy {
    fn from(config: &WorkerConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_delay: Duration::from_millis(config.retry_initial_ms),
            max_delay: Duration::from_millis(config.retry_max_ms.max(config.retry_initial_ms)),
        }
    }
}

impl RetryPolicy {
    /// No retries at all
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Exponential backoff builder with jitter
    pub fn backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(self.initial_delay)
            .with_max_delay(self.max_delay)
            .with_max_times(self.max_retries)
            .with_jitter()
    }

    /// Run `op`, retrying while it fails with a retryable error
    pub async fn run<T, F, Fut>(&self, context: &str, op: F) -> PrimeResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = PrimeResult<T>>,
    {
        op.retry(self.backoff())
            .when(PrimeError::is_retryable)
            .notify(|err: &PrimeError, dur: Duration| {
                tracing::warn!(
                    context = %context,
                    error = %err,
                    retry_in = ?dur,
                    "Operation failed, retrying"
                );
            })
            .await
    }
}
