//! In-process task queue

use crate::error::{PrimeError, PrimeResult};
use crate::queue::{Delivery, TaskQueue};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct Message {
    id: String,
    attempt: u32,
}

#[derive(Debug, Default)]
struct State {
    ready: VecDeque<Message>,
    inflight: HashMap<String, Message>,
}

/// FIFO queue held in memory
#[derive(Debug, Default)]
pub struct MemoryQueue {
    state: Mutex<State>,
    arrivals: Notify,
    receipts: AtomicU64,
}

impl MemoryQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages delivered but not yet acknowledged
    pub async fn inflight_count(&self) -> usize {
        self.state.lock().await.inflight.len()
    }

    async fn try_pop(&self) -> Option<Delivery> {
        let mut state = self.state.lock().await;
        let mut message = state.ready.pop_front()?;
        message.attempt += 1;

        let receipt = self.receipts.fetch_add(1, Ordering::Relaxed).to_string();
        let delivery = Delivery {
            id: message.id.clone(),
            attempt: message.attempt,
            receipt: receipt.clone(),
        };
        state.inflight.insert(receipt, message);
        Some(delivery)
    }
}

#[async_trait]
impl TaskQueue for MemoryQueue {
    async fn enqueue(&self, id: &str) -> PrimeResult<()> {
        self.state.lock().await.ready.push_back(Message {
            id: id.to_string(),
            attempt: 0,
        });
        self.arrivals.notify_one();
        Ok(())
    }

    async fn dequeue(&self, wait: Duration) -> PrimeResult<Option<Delivery>> {
        let deadline = Instant::now() + wait;
        loop {
            let arrived = self.arrivals.notified();
            if let Some(delivery) = self.try_pop().await {
                return Ok(Some(delivery));
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() || tokio::time::timeout(remaining, arrived).await.is_err() {
                return Ok(None);
            }
        }
    }

    async fn ack(&self, delivery: &Delivery) -> PrimeResult<()> {
        self.state.lock().await.inflight.remove(&delivery.receipt);
        Ok(())
    }

    async fn nack(&self, delivery: &Delivery) -> PrimeResult<()> {
        let mut state = self.state.lock().await;
        let message = state.inflight.remove(&delivery.receipt).ok_or_else(|| {
            PrimeError::Queue(format!("unknown delivery receipt {}", delivery.receipt))
        })?;
        state.ready.push_back(message);
        drop(state);
        self.arrivals.notify_one();
        Ok(())
    }

    async fn recover(&self) -> PrimeResult<usize> {
        let mut state = self.state.lock().await;
        let orphaned: Vec<Message> = state.inflight.drain().map(|(_, m)| m).collect();
        let count = orphaned.len();
        state.ready.extend(orphaned);
        drop(state);

        for _ in 0..count {
            self.arrivals.notify_one();
        }
        Ok(count)
    }

    async fn ready_count(&self) -> PrimeResult<usize> {
        Ok(self.state.lock().await.ready.len())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
