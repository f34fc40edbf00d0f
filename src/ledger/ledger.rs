//! Request lifecycle management

use crate::error::{PrimeError, PrimeResult};
use crate::ledger::request::{RequestStatus, TaskRequest, REQUEST_PREFIX};
use crate::store::{CasOutcome, KvStore};
use chrono::Utc;
use futures_util::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::{debug, info};

/// Attempts per transition before giving up on a contended record
const MAX_CAS_ATTEMPTS: usize = 16;

/// Records read concurrently by `list`
const LIST_READ_AHEAD: usize = 8;

/// Substituted when a failure arrives without a description
const UNKNOWN_ERROR: &str = "unknown error";

/// Outcome of [`RequestLedger::claim`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Claim {
    /// The caller now owns the request (status: processing)
    Acquired(TaskRequest),
    /// The request had already finished; nothing changed
    Settled(TaskRequest),
}

/// Persisted per-request state machine
///
/// `pending → processing → {done, failed}`. Each transition is a
/// compare-and-set on the request record, so concurrent workers cannot both
/// move the same request.
pub struct RequestLedger {
    kv: Arc<dyn KvStore>,
}

impl RequestLedger {
    /// Create a ledger over `kv`
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    /// Record a new pending request
    pub async fn create(&self, id: &str, n: usize) -> PrimeResult<TaskRequest> {
        let request = TaskRequest::new(id, n);
        let value = serde_json::to_string(&request)?;

        match self
            .kv
            .compare_and_set(&TaskRequest::key(id), None, value)
            .await?
        {
            CasOutcome::Written(_) => {
                info!(request_id = %id, n, "Created request");
                Ok(request)
            }
            CasOutcome::Conflict { .. } => Err(PrimeError::DuplicateId(id.to_string())),
        }
    }

    /// Look up a request
    pub async fn get(&self, id: &str) -> PrimeResult<TaskRequest> {
        self.load(id).await.map(|(_, request)| request)
    }

    /// Take ownership of a pending request
    ///
    /// A processing request is refused with `AlreadyClaimed`; a finished one
    /// is returned untouched as [`Claim::Settled`], which makes duplicate
    /// deliveries harmless.
    pub async fn claim(&self, id: &str) -> PrimeResult<Claim> {
        self.acquire(id, false).await
    }

    /// Take ownership of a request whose previous owner gave it up
    ///
    /// Like [`claim`](Self::claim), but a processing request is taken over
    /// instead of refused. Used for redelivered messages: the worker that
    /// returned the message, or died holding it, is no longer working on the
    /// request.
    pub async fn reclaim(&self, id: &str) -> PrimeResult<Claim> {
        self.acquire(id, true).await
    }

    async fn acquire(&self, id: &str, takeover: bool) -> PrimeResult<Claim> {
        let request = self
            .transition(id, |mut request| match request.status {
                RequestStatus::Pending => {
                    request.status = RequestStatus::Processing;
                    Ok(Some(request))
                }
                RequestStatus::Processing if takeover => Ok(Some(request)),
                RequestStatus::Processing => Err(PrimeError::AlreadyClaimed {
                    id: request.id,
                    status: RequestStatus::Processing.to_string(),
                }),
                RequestStatus::Done | RequestStatus::Failed => Ok(None),
            })
            .await?;

        if request.status.is_terminal() {
            debug!(request_id = %id, status = %request.status, "Claim on finished request");
            Ok(Claim::Settled(request))
        } else {
            debug!(request_id = %id, takeover, "Claimed request");
            Ok(Claim::Acquired(request))
        }
    }

    /// Move a processing request to done with its result
    pub async fn complete(&self, id: &str, result: Vec<u64>) -> PrimeResult<TaskRequest> {
        let request = self
            .transition(id, |mut request| {
                require_processing(&request, "complete")?;
                if result.len() != request.n {
                    return Err(PrimeError::transition(
                        &request.id,
                        format!(
                            "result has {} primes, request asked for {}",
                            result.len(),
                            request.n
                        ),
                    ));
                }
                request.status = RequestStatus::Done;
                request.result = Some(result.clone());
                Ok(Some(request))
            })
            .await?;

        info!(request_id = %id, n = request.n, "Request done");
        Ok(request)
    }

    /// Move a processing request to failed with a cause
    pub async fn fail(&self, id: &str, error: &str) -> PrimeResult<TaskRequest> {
        let cause = match error.trim() {
            "" => UNKNOWN_ERROR.to_string(),
            trimmed => trimmed.to_string(),
        };

        let request = self
            .transition(id, |mut request| {
                require_processing(&request, "fail")?;
                request.status = RequestStatus::Failed;
                request.error = Some(cause.clone());
                Ok(Some(request))
            })
            .await?;

        info!(request_id = %id, error = %cause, "Request failed");
        Ok(request)
    }

    /// All requests, newest first
    pub async fn list(&self) -> PrimeResult<Vec<TaskRequest>> {
        let keys = self.kv.keys(REQUEST_PREFIX).await?;
        let records: Vec<_> = stream::iter(keys)
            .map(|key| async move { (self.kv.get(&key).await, key) })
            .buffered(LIST_READ_AHEAD)
            .collect()
            .await;

        let mut requests = Vec::with_capacity(records.len());
        for (record, key) in records {
            let Some(record) = record? else { continue };
            match serde_json::from_str::<TaskRequest>(&record.value) {
                Ok(request) => requests.push(request),
                Err(e) => debug!("Skipping unreadable record {}: {}", key, e),
            }
        }

        requests.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(requests)
    }

    async fn load(&self, id: &str) -> PrimeResult<(u64, TaskRequest)> {
        let record = self
            .kv
            .get(&TaskRequest::key(id))
            .await?
            .ok_or_else(|| PrimeError::NotFound(id.to_string()))?;
        let request = serde_json::from_str(&record.value)?;
        Ok((record.version, request))
    }

    /// Apply `step` to the current record and write it back atomically
    ///
    /// `step` returns `None` to leave the record unchanged. On a concurrent
    /// write the record is reloaded and `step` runs again.
    async fn transition<F>(&self, id: &str, mut step: F) -> PrimeResult<TaskRequest>
    where
        F: FnMut(TaskRequest) -> PrimeResult<Option<TaskRequest>>,
    {
        let key = TaskRequest::key(id);

        for _ in 0..MAX_CAS_ATTEMPTS {
            let (version, current) = self.load(id).await?;
            let Some(mut next) = step(current.clone())? else {
                return Ok(current);
            };

            next.updated_at = Utc::now();
            let value = serde_json::to_string(&next)?;
            match self.kv.compare_and_set(&key, Some(version), value).await? {
                CasOutcome::Written(_) => return Ok(next),
                CasOutcome::Conflict { .. } => {
                    debug!(request_id = %id, "Request changed concurrently, retrying transition");
                }
            }
        }

        Err(PrimeError::StoreUnavailable(format!(
            "request {} kept changing during {} transition attempts",
            id, MAX_CAS_ATTEMPTS
        )))
    }
}

fn require_processing(request: &TaskRequest, action: &str) -> PrimeResult<()> {
    if request.status == RequestStatus::Processing {
        return Ok(());
    }
    Err(PrimeError::transition(
        &request.id,
        format!("cannot {} a {} request", action, request.status),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn ledger() -> RequestLedger {
        RequestLedger::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn create_and_get() {
        let ledger = ledger();
        ledger.create("a", 5).await.unwrap();

        let request = ledger.get("a").await.unwrap();
        assert_eq!(request.status, RequestStatus::Pending);
        assert_eq!(request.n, 5);
    }

    #[tokio::test]
    async fn duplicate_create_rejected() {
        let ledger = ledger();
        ledger.create("a", 5).await.unwrap();
        let err = ledger.create("a", 7).await.unwrap_err();
        assert!(matches!(err, PrimeError::DuplicateId(_)));
        assert_eq!(ledger.get("a").await.unwrap().n, 5);
    }

    #[tokio::test]
    async fn get_missing() {
        let err = ledger().get("nope").await.unwrap_err();
        assert!(matches!(err, PrimeError::NotFound(_)));
    }

    #[tokio::test]
    async fn claim_missing() {
        let err = ledger().claim("nope").await.unwrap_err();
        assert!(matches!(err, PrimeError::NotFound(_)));
    }

    #[tokio::test]
    async fn second_claim_is_refused() {
        let ledger = ledger();
        ledger.create("a", 2).await.unwrap();

        let first = ledger.claim("a").await.unwrap();
        assert!(matches!(first, Claim::Acquired(ref r) if r.status == RequestStatus::Processing));

        let err = ledger.claim("a").await.unwrap_err();
        assert!(matches!(err, PrimeError::AlreadyClaimed { .. }));
    }

    #[tokio::test]
    async fn claim_after_completion_returns_terminal_state() {
        let ledger = ledger();
        ledger.create("a", 2).await.unwrap();
        ledger.claim("a").await.unwrap();
        let done = ledger.complete("a", vec![2, 3]).await.unwrap();

        match ledger.claim("a").await.unwrap() {
            Claim::Settled(request) => assert_eq!(request, done),
            other => panic!("expected settled claim, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn reclaim_takes_over_processing_request() {
        let ledger = ledger();
        ledger.create("a", 2).await.unwrap();
        ledger.claim("a").await.unwrap();

        match ledger.reclaim("a").await.unwrap() {
            Claim::Acquired(request) => assert_eq!(request.status, RequestStatus::Processing),
            other => panic!("expected takeover, got {:?}", other),
        }

        let done = ledger.complete("a", vec![2, 3]).await.unwrap();
        assert_eq!(done.status, RequestStatus::Done);
    }

    #[tokio::test]
    async fn reclaim_pending_and_settled() {
        let ledger = ledger();
        ledger.create("a", 1).await.unwrap();
        assert!(matches!(
            ledger.reclaim("a").await.unwrap(),
            Claim::Acquired(_)
        ));

        ledger.fail("a", "boom").await.unwrap();
        match ledger.reclaim("a").await.unwrap() {
            Claim::Settled(request) => assert_eq!(request.status, RequestStatus::Failed),
            other => panic!("expected settled claim, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn complete_requires_processing() {
        let ledger = ledger();
        ledger.create("a", 1).await.unwrap();

        let err = ledger.complete("a", vec![2]).await.unwrap_err();
        assert!(matches!(err, PrimeError::InvalidTransition { .. }));
        assert_eq!(ledger.get("a").await.unwrap().status, RequestStatus::Pending);
    }

    #[tokio::test]
    async fn complete_checks_result_length() {
        let ledger = ledger();
        ledger.create("a", 3).await.unwrap();
        ledger.claim("a").await.unwrap();

        let err = ledger.complete("a", vec![2, 3]).await.unwrap_err();
        assert!(err.to_string().contains("asked for 3"));

        let done = ledger.complete("a", vec![2, 3, 5]).await.unwrap();
        assert_eq!(done.status, RequestStatus::Done);
        assert_eq!(done.result, Some(vec![2, 3, 5]));
        assert!(done.error.is_none());
    }

    #[tokio::test]
    async fn terminal_states_are_immutable() {
        let ledger = ledger();
        ledger.create("a", 1).await.unwrap();
        ledger.claim("a").await.unwrap();
        ledger.fail("a", "boom").await.unwrap();

        assert!(ledger.complete("a", vec![2]).await.is_err());
        assert!(ledger.fail("a", "again").await.is_err());

        let request = ledger.get("a").await.unwrap();
        assert_eq!(request.status, RequestStatus::Failed);
        assert_eq!(request.error.as_deref(), Some("boom"));
        assert!(request.result.is_none());
    }

    #[tokio::test]
    async fn empty_failure_message_is_replaced() {
        let ledger = ledger();
        ledger.create("a", 1).await.unwrap();
        ledger.claim("a").await.unwrap();

        let failed = ledger.fail("a", "  ").await.unwrap();
        assert_eq!(failed.error.as_deref(), Some(UNKNOWN_ERROR));
    }

    #[tokio::test]
    async fn concurrent_claims_have_one_winner() {
        let ledger = Arc::new(ledger());
        ledger.create("a", 1).await.unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ledger = Arc::clone(&ledger);
                tokio::spawn(async move { ledger.claim("a").await })
            })
            .collect();

        let mut acquired = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(Claim::Acquired(_)) => acquired += 1,
                Err(PrimeError::AlreadyClaimed { .. }) => {}
                other => panic!("unexpected claim outcome: {:?}", other),
            }
        }
        assert_eq!(acquired, 1);
    }

    #[tokio::test]
    async fn list_newest_first() {
        let ledger = ledger();
        ledger.create("first", 1).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        ledger.create("second", 1).await.unwrap();

        let ids: Vec<String> = ledger
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec!["second".to_string(), "first".to_string()]);
    }
}
