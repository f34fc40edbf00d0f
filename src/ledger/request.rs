//! Request record

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Key prefix for request records
pub const REQUEST_PREFIX: &str = "request:";

/// Request status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Processing,
    Done,
    Failed,
}

impl RequestStatus {
    /// Done and failed requests never change again
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

/// One submitted computation and its lifecycle state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRequest {
    /// Opaque request ID (32 hex chars)
    pub id: String,

    /// Number of primes requested
    pub n: usize,

    /// Current status
    pub status: RequestStatus,

    /// First `n` primes, present iff done
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Vec<u64>>,

    /// Failure cause, present iff failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// When the request was submitted
    pub created_at: DateTime<Utc>,

    /// When the status last changed
    pub updated_at: DateTime<Utc>,
}

impl TaskRequest {
    /// Create a pending request
    pub fn new(id: impl Into<String>, n: usize) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            n,
            status: RequestStatus::Pending,
            result: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Generate a fresh request ID
    pub fn new_id() -> String {
        Uuid::new_v4().simple().to_string()
    }

    /// Store key for a request ID
    pub fn key(id: &str) -> String {
        format!("{}{}", REQUEST_PREFIX, id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_new() {
        let request = TaskRequest::new("abc", 10);
        assert_eq!(request.status, RequestStatus::Pending);
        assert_eq!(request.n, 10);
        assert!(request.result.is_none());
        assert!(request.error.is_none());
        assert_eq!(request.created_at, request.updated_at);
    }

    #[test]
    fn ids_are_hex() {
        let id = TaskRequest::new_id();
        assert_eq!(id.len(), 32);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(id, TaskRequest::new_id());
    }

    #[test]
    fn request_serialize() {
        let request = TaskRequest::new("abc", 3);
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("\"pending\""));
        assert!(!json.contains("result"));

        let parsed: TaskRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, request);
    }

    #[test]
    fn terminal_statuses() {
        assert!(!RequestStatus::Pending.is_terminal());
        assert!(!RequestStatus::Processing.is_terminal());
        assert!(RequestStatus::Done.is_terminal());
        assert!(RequestStatus::Failed.is_terminal());
        assert_eq!(RequestStatus::Processing.to_string(), "processing");
    }
}
