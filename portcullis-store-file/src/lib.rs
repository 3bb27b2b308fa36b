//! Append-only file backing for the failure log
//!
//! Records are JSON, one per line, appended and never rewritten. The file is
//! the durable state: a process restart loses nothing, and the log doubles
//! as an audit trail an operator can grep. A single async mutex serializes
//! every access — contention is not a concern at login-failure rates, and a
//! torn interleaved write would be.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use portcullis_core::{
    Error,
    error::StorageError,
    repositories::{FailureLogRepository, FailureRecord},
};

/// Failure log stored as a JSON-lines file.
///
/// The file is created on first append. Reads of a missing file report an
/// empty log; any other I/O problem surfaces as an error for the caller (the
/// rate limiter) to apply its own degradation policy to.
pub struct FileFailureLog {
    path: PathBuf,
    guard: Mutex<()>,
}

impl FileFailureLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            guard: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl FailureLogRepository for FileFailureLog {
    async fn append(&self, record: FailureRecord) -> Result<(), Error> {
        let mut line = serde_json::to_string(&record)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        line.push('\n');

        let _guard = self.guard.lock().await;

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| StorageError::Io(e.to_string()))?;

        file.write_all(line.as_bytes())
            .await
            .map_err(|e| StorageError::Io(e.to_string()))?;
        file.flush()
            .await
            .map_err(|e| StorageError::Io(e.to_string()))?;

        Ok(())
    }

    async fn scan_recent(
        &self,
        identifier: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<FailureRecord>, Error> {
        let _guard = self.guard.lock().await;

        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StorageError::Io(e.to_string()).into()),
        };

        let mut records = Vec::new();
        for line in contents.lines() {
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<FailureRecord>(line) {
                Ok(record) => {
                    if record.identifier == identifier && record.attempted_at >= since {
                        records.push(record);
                    }
                }
                Err(e) => {
                    // A torn write from a crash mid-append. Skip the line
                    // rather than wedge every login on one bad record.
                    tracing::warn!(
                        error = %e,
                        path = %self.path.display(),
                        "skipping unparseable failure log line"
                    );
                }
            }
        }

        Ok(records)
    }
}
