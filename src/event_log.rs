//! JSON-lines event log
//!
//! Appends every core event to `<data_dir>/events.log` with a timestamp.
//! Enabled by `general.event_log`.

use crate::events::{CoreEvent, EventSink};
use async_trait::async_trait;
use chrono::Utc;
use std::path::PathBuf;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::warn;

/// File-based event sink that appends JSON lines
pub struct EventLog {
    enabled: bool,
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl EventLog {
    /// Create an event log writing to `path`
    pub fn new(path: PathBuf, enabled: bool) -> Self {
        Self {
            enabled,
            path,
            write_lock: Mutex::new(()),
        }
    }

    async fn append(&self, line: &str) -> std::io::Result<()> {
        let _serialized = self.write_lock.lock().await;

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;

        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl EventSink for EventLog {
    /// Write failures are logged and dropped; the event log never fails a
    /// request.
    async fn emit(&self, event: &CoreEvent) {
        if !self.enabled {
            return;
        }

        let entry = serde_json::json!({
            "timestamp": Utc::now().to_rfc3339(),
            "name": event.name(),
            "data": event,
        });

        let mut line = match serde_json::to_string(&entry) {
            Ok(s) => s,
            Err(e) => {
                warn!("Failed to serialize event: {}", e);
                return;
            }
        };
        line.push('\n');

        if let Err(e) = self.append(&line).await {
            warn!("Failed to write event log {}: {}", self.path.display(), e);
        }
    }
}
