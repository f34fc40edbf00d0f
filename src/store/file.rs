//! Filesystem key-value store
//!
//! One JSON file per key under `<root>/records`, one per lease under
//! `<root>/leases`. Writes go to a temp file and are renamed into place, so
//! readers never see a partial record. Mutations that must be atomic across
//! processes (compare-and-set, leases, version bumps) are serialized by a
//! guard file created with `create_new`.

use crate::error::{PrimeError, PrimeResult};
use crate::store::{next_version, CasOutcome, KvStore, Versioned};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

/// How long to wait for the guard before reporting the store unavailable
const GUARD_TIMEOUT: Duration = Duration::from_secs(5);

/// A guard older than this belongs to a crashed process and is broken
const GUARD_STALE_AFTER: Duration = Duration::from_secs(10);

const GUARD_POLL: Duration = Duration::from_millis(5);

#[derive(Debug, Serialize, Deserialize)]
struct LeaseFile {
    owner: String,
    expires_at: DateTime<Utc>,
}

/// Key-value store backed by a directory
pub struct FileStore {
    root: PathBuf,
    local: Mutex<()>,
}

impl FileStore {
    /// Open (creating if needed) a store rooted at `root`
    pub async fn open(root: impl Into<PathBuf>) -> PrimeResult<Self> {
        let root = root.into();
        for dir in [root.join("records"), root.join("leases")] {
            fs::create_dir_all(&dir)
                .await
                .map_err(|e| PrimeError::io(format!("creating directory {}", dir.display()), e))?;
        }

        debug!("Opened file store at {}", root.display());
        Ok(Self {
            root,
            local: Mutex::new(()),
        })
    }

    /// Root directory of the store
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn record_path(&self, key: &str) -> PathBuf {
        self.root
            .join("records")
            .join(format!("{}.json", encode_key(key)))
    }

    fn lease_path(&self, name: &str) -> PathBuf {
        self.root
            .join("leases")
            .join(format!("{}.json", encode_key(name)))
    }

    /// Run `op` while holding the local mutex and the cross-process guard
    ///
    /// The guard is removed whatever `op` returns. A guard left behind by a
    /// cancelled or crashed mutation is broken once it turns stale.
    async fn guarded<T, F, Fut>(&self, op: F) -> PrimeResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = PrimeResult<T>>,
    {
        let _local = self.local.lock().await;
        let guard = self.acquire_guard().await?;

        let result = op().await;

        if let Err(e) = fs::remove_file(&guard).await {
            warn!("Failed to remove store guard {}: {}", guard.display(), e);
        }
        result
    }

    async fn acquire_guard(&self) -> PrimeResult<PathBuf> {
        let path = self.root.join(".guard");
        let deadline = tokio::time::Instant::now() + GUARD_TIMEOUT;

        loop {
            match fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(_) => return Ok(path),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    if guard_is_stale(&path).await {
                        warn!("Breaking stale store guard {}", path.display());
                        let _ = fs::remove_file(&path).await;
                        continue;
                    }
                }
                Err(e) => {
                    return Err(PrimeError::StoreUnavailable(format!(
                        "creating guard {}: {}",
                        path.display(),
                        e
                    )))
                }
            }

            if tokio::time::Instant::now() >= deadline {
                return Err(PrimeError::StoreUnavailable(format!(
                    "guard {} held for more than {}s",
                    path.display(),
                    GUARD_TIMEOUT.as_secs()
                )));
            }
            tokio::time::sleep(GUARD_POLL).await;
        }
    }

    async fn read_record(&self, key: &str) -> PrimeResult<Option<Versioned>> {
        let path = self.record_path(key);
        match fs::read_to_string(&path).await {
            Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(PrimeError::StoreUnavailable(format!(
                "reading {}: {}",
                path.display(),
                e
            ))),
        }
    }

    async fn write_record(&self, key: &str, record: &Versioned) -> PrimeResult<()> {
        let path = self.record_path(key);
        let content = serde_json::to_string(record)?;
        write_atomic(&path, content.as_bytes())
            .await
            .map_err(|e| PrimeError::persistence(key, e))
    }

    async fn read_lease(&self, name: &str) -> PrimeResult<Option<LeaseFile>> {
        let path = self.lease_path(name);
        match fs::read_to_string(&path).await {
            Ok(content) => Ok(serde_json::from_str(&content).ok()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(PrimeError::io(format!("reading lease {}", path.display()), e)),
        }
    }
}

#[async_trait]
impl KvStore for FileStore {
    async fn get(&self, key: &str) -> PrimeResult<Option<Versioned>> {
        self.read_record(key).await
    }

    async fn put(&self, key: &str, value: String) -> PrimeResult<u64> {
        self.guarded(|| async move {
            let current = self.read_record(key).await?;
            let record = Versioned {
                version: next_version(current.as_ref()),
                value,
            };
            self.write_record(key, &record).await?;
            Ok(record.version)
        })
        .await
    }

    async fn compare_and_set(
        &self,
        key: &str,
        expected: Option<u64>,
        value: String,
    ) -> PrimeResult<CasOutcome> {
        self.guarded(|| async move {
            let current = self.read_record(key).await?;
            let found = current.as_ref().map(|v| v.version);
            if found != expected {
                return Ok(CasOutcome::Conflict { current: found });
            }

            let record = Versioned {
                version: next_version(current.as_ref()),
                value,
            };
            self.write_record(key, &record).await?;
            Ok(CasOutcome::Written(record.version))
        })
        .await
    }

    async fn try_lock(&self, name: &str, owner: &str, lease: Duration) -> PrimeResult<bool> {
        let ttl = chrono::Duration::from_std(lease)
            .map_err(|e| PrimeError::Internal(format!("lease duration out of range: {}", e)))?;

        self.guarded(|| async move {
            let now = Utc::now();
            if let Some(held) = self.read_lease(name).await? {
                if held.owner != owner && held.expires_at > now {
                    return Ok(false);
                }
            }

            let content = serde_json::to_string(&LeaseFile {
                owner: owner.to_string(),
                expires_at: now + ttl,
            })?;
            let path = self.lease_path(name);
            write_atomic(&path, content.as_bytes())
                .await
                .map_err(|e| PrimeError::io(format!("writing lease {}", path.display()), e))?;
            Ok(true)
        })
        .await
    }

    async fn unlock(&self, name: &str, owner: &str) -> PrimeResult<bool> {
        self.guarded(|| async move {
            match self.read_lease(name).await? {
                Some(held) if held.owner == owner => {
                    let path = self.lease_path(name);
                    fs::remove_file(&path).await.map_err(|e| {
                        PrimeError::io(format!("removing lease {}", path.display()), e)
                    })?;
                    Ok(true)
                }
                _ => Ok(false),
            }
        })
        .await
    }

    async fn lock_holder(&self, name: &str) -> PrimeResult<Option<String>> {
        Ok(self
            .read_lease(name)
            .await?
            .filter(|l| l.expires_at > Utc::now())
            .map(|l| l.owner))
    }

    async fn keys(&self, prefix: &str) -> PrimeResult<Vec<String>> {
        let dir = self.root.join("records");
        let mut entries = fs::read_dir(&dir)
            .await
            .map_err(|e| PrimeError::io(format!("reading directory {}", dir.display()), e))?;

        let mut keys = vec![];
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| PrimeError::io("reading record entry", e))?
        {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                if let Some(key) = path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .and_then(decode_key)
                {
                    if key.starts_with(prefix) {
                        keys.push(key);
                    }
                }
            }
        }

        keys.sort();
        Ok(keys)
    }

    fn backend_name(&self) -> &'static str {
        "file"
    }
}

async fn guard_is_stale(path: &Path) -> bool {
    fs::metadata(path)
        .await
        .and_then(|m| m.modified())
        .ok()
        .and_then(|modified| modified.elapsed().ok())
        .is_some_and(|age| age > GUARD_STALE_AFTER)
}

/// Write via a sibling temp file and rename into place
async fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let tmp = path.with_extension(format!("tmp-{}", Uuid::new_v4().simple()));
    fs::write(&tmp, bytes).await?;
    if let Err(e) = fs::rename(&tmp, path).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(e);
    }
    Ok(())
}

/// Escape characters that are unsafe in file names
fn encode_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for c in key.chars() {
        match c {
            '%' => out.push_str("%25"),
            ':' => out.push_str("%3A"),
            '/' => out.push_str("%2F"),
            '\\' => out.push_str("%5C"),
            '.' => out.push_str("%2E"),
            _ => out.push(c),
        }
    }
    out
}

fn decode_key(name: &str) -> Option<String> {
    let mut out = String::with_capacity(name.len());
    let mut rest = name;
    while let Some(idx) = rest.find('%') {
        out.push_str(&rest[..idx]);
        let code = rest.get(idx + 1..idx + 3)?;
        out.push(u8::from_str_radix(code, 16).ok()? as char);
        rest = &rest[idx + 3..];
    }
    out.push_str(rest);
    Some(out)
}
