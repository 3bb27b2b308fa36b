//! Durable append-only log of login failures
//!
//! The rate limiter derives everything from this log: there is no separate
//! "blocked" flag to get out of sync. Records are appended, never mutated,
//! and filtered by age on read, so the limiter survives process restarts and
//! the log doubles as an audit trail.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

use crate::Error;

/// One failed login attempt, keyed by source identifier (an IP address).
/// Immutable once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub identifier: String,
    pub attempted_at: DateTime<Utc>,
}

/// Storage for the failure log.
///
/// Implementations must serialize appends so concurrent writers cannot
/// corrupt or lose records; a single global lock is acceptable since
/// operations are infrequent and I/O-bound. Reads must never be destructive.
#[async_trait]
pub trait FailureLogRepository: Send + Sync + 'static {
    /// Append a record to the log.
    async fn append(&self, record: FailureRecord) -> Result<(), Error>;

    /// Return all records for `identifier` with `attempted_at >= since`.
    async fn scan_recent(
        &self,
        identifier: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<FailureRecord>, Error>;
}

/// Log held in process memory. Reference implementation, useful in tests and
/// in single-process deployments that accept losing throttle state on
/// restart.
#[derive(Debug, Default)]
pub struct InMemoryFailureLog {
    records: Mutex<Vec<FailureRecord>>,
}

impl InMemoryFailureLog {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FailureLogRepository for InMemoryFailureLog {
    async fn append(&self, record: FailureRecord) -> Result<(), Error> {
        self.records.lock().unwrap().push(record);
        Ok(())
    }

    async fn scan_recent(
        &self,
        identifier: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<FailureRecord>, Error> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.identifier == identifier && r.attempted_at >= since)
            .cloned()
            .collect())
    }
}
