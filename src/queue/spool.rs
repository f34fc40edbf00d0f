//! Directory-backed task queue
//!
//! Each message is a small JSON file. Enqueue writes into `ready/`; dequeue
//! claims the oldest file by renaming it into `inflight/`, which only one
//! process can win; ack deletes it; nack and recover write it back with the
//! attempt bumped.

use crate::error::{PrimeError, PrimeResult};
use crate::queue::{Delivery, TaskQueue};
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tokio::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

const MESSAGE_EXT: &str = "task";

#[derive(Debug, Serialize, Deserialize)]
struct SpoolMessage {
    id: String,
    attempt: u32,
}

/// Queue stored as files under a directory
pub struct SpoolQueue {
    ready: PathBuf,
    inflight: PathBuf,
    poll_interval: Duration,
}

impl SpoolQueue {
    /// Open (creating if needed) a spool rooted at `root`
    pub async fn open(root: impl AsRef<Path>, poll_interval: Duration) -> PrimeResult<Self> {
        let root = root.as_ref();
        let queue = Self {
            ready: root.join("ready"),
            inflight: root.join("inflight"),
            poll_interval,
        };

        for dir in [&queue.ready, &queue.inflight] {
            fs::create_dir_all(dir)
                .await
                .map_err(|e| PrimeError::io(format!("creating directory {}", dir.display()), e))?;
        }
        Ok(queue)
    }

    /// Message files in `dir`, oldest first
    async fn list(dir: &Path) -> PrimeResult<Vec<String>> {
        let mut entries = fs::read_dir(dir)
            .await
            .map_err(|e| PrimeError::io(format!("reading queue directory {}", dir.display()), e))?;

        let mut names = vec![];
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| PrimeError::io("reading queue entry", e))?
        {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == MESSAGE_EXT) {
                if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                    names.push(name.to_string());
                }
            }
        }

        names.sort();
        Ok(names)
    }

    /// Sortable, unique file name
    fn message_name() -> String {
        let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
        format!("{:020}-{}.{}", nanos, Uuid::new_v4().simple(), MESSAGE_EXT)
    }

    async fn write_message(&self, message: &SpoolMessage) -> PrimeResult<()> {
        let name = Self::message_name();
        let tmp = self.ready.join(format!("{}.tmp", name));
        let content = serde_json::to_string(message)?;

        fs::write(&tmp, content)
            .await
            .map_err(|e| PrimeError::Queue(format!("writing {}: {}", tmp.display(), e)))?;
        fs::rename(&tmp, self.ready.join(&name))
            .await
            .map_err(|e| PrimeError::Queue(format!("publishing {}: {}", name, e)))?;
        Ok(())
    }

    async fn try_pop(&self) -> PrimeResult<Option<Delivery>> {
        for name in Self::list(&self.ready).await? {
            let claimed = self.inflight.join(&name);
            match fs::rename(self.ready.join(&name), &claimed).await {
                Ok(()) => {}
                // another consumer won the rename
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(PrimeError::Queue(format!("claiming {}: {}", name, e))),
            }

            let content = fs::read_to_string(&claimed)
                .await
                .map_err(|e| PrimeError::Queue(format!("reading {}: {}", name, e)))?;
            let message: SpoolMessage = match serde_json::from_str(&content) {
                Ok(m) => m,
                Err(e) => {
                    warn!("Dropping unreadable queue message {}: {}", name, e);
                    let _ = fs::remove_file(&claimed).await;
                    continue;
                }
            };

            return Ok(Some(Delivery {
                id: message.id,
                attempt: message.attempt + 1,
                receipt: name,
            }));
        }
        Ok(None)
    }
}

#[async_trait]
impl TaskQueue for SpoolQueue {
    async fn enqueue(&self, id: &str) -> PrimeResult<()> {
        self.write_message(&SpoolMessage {
            id: id.to_string(),
            attempt: 0,
        })
        .await?;
        debug!(request_id = %id, "Enqueued task");
        Ok(())
    }

    async fn dequeue(&self, wait: Duration) -> PrimeResult<Option<Delivery>> {
        let deadline = Instant::now() + wait;
        loop {
            if let Some(delivery) = self.try_pop().await? {
                return Ok(Some(delivery));
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }
            tokio::time::sleep(self.poll_interval.min(remaining)).await;
        }
    }

    async fn ack(&self, delivery: &Delivery) -> PrimeResult<()> {
        match fs::remove_file(self.inflight.join(&delivery.receipt)).await {
            Ok(()) => Ok(()),
            // already recovered and handled elsewhere
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(PrimeError::Queue(format!(
                "acknowledging {}: {}",
                delivery.receipt, e
            ))),
        }
    }

    async fn nack(&self, delivery: &Delivery) -> PrimeResult<()> {
        self.write_message(&SpoolMessage {
            id: delivery.id.clone(),
            attempt: delivery.attempt,
        })
        .await?;
        self.ack(delivery).await
    }

    async fn recover(&self) -> PrimeResult<usize> {
        let mut recovered = 0;
        for name in Self::list(&self.inflight).await? {
            let orphan = self.inflight.join(&name);
            let content = match fs::read_to_string(&orphan).await {
                Ok(content) => content,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(PrimeError::Queue(format!("recovering {}: {}", name, e))),
            };

            match serde_json::from_str::<SpoolMessage>(&content) {
                // the orphaned delivery counts as an attempt
                Ok(message) => {
                    self.write_message(&SpoolMessage {
                        id: message.id,
                        attempt: message.attempt + 1,
                    })
                    .await?;
                }
                Err(e) => warn!("Dropping unreadable queue message {}: {}", name, e),
            }

            match fs::remove_file(&orphan).await {
                Ok(()) => recovered += 1,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(PrimeError::Queue(format!("recovering {}: {}", name, e))),
            }
        }

        if recovered > 0 {
            debug!(recovered, "Returned in-flight messages to the queue");
        }
        Ok(recovered)
    }

    async fn ready_count(&self) -> PrimeResult<usize> {
        Ok(Self::list(&self.ready).await?.len())
    }

    fn backend_name(&self) -> &'static str {
        "spool"
    }
}
