//! IP-scoped sliding-window throttling of failed logins
//!
//! Lockout state is a pure function of the log: an identifier is blocked iff
//! the number of its failure records inside `[now - window, now]` has reached
//! the configured maximum. Nothing is ever flipped back; records simply age
//! out of the window.
//!
//! # Availability over accuracy
//!
//! When the durable log itself is unavailable, reads fail open (zero recent
//! failures) and writes degrade to best effort, each with an operational
//! warning. Degraded throttling is preferred to denying every login because
//! a disk filled up.

use std::sync::Arc;

use chrono::Duration;

use crate::{
    clock::Clock,
    repositories::{FailureLogRepository, FailureRecord},
};

/// Configuration for the sliding-window limiter.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// How far back failures count against an identifier.
    pub window: Duration,
    /// Number of in-window failures at which the identifier is blocked.
    pub max_attempts: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window: Duration::seconds(300),
            max_attempts: 5,
        }
    }
}

/// Sliding-window failure counter over a durable append-only log.
///
/// Thread-safe; the repository serializes log access.
pub struct RateLimiter<L: FailureLogRepository> {
    log: Arc<L>,
    config: RateLimitConfig,
    clock: Arc<dyn Clock>,
}

impl<L: FailureLogRepository> RateLimiter<L> {
    pub fn new(log: Arc<L>, config: RateLimitConfig, clock: Arc<dyn Clock>) -> Self {
        Self { log, config, clock }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Append a failure record for `identifier`, stamped now.
    ///
    /// Best effort: an unwritable log is logged as a warning and otherwise
    /// ignored.
    pub async fn record_failure(&self, identifier: &str) {
        let record = FailureRecord {
            identifier: identifier.to_string(),
            attempted_at: self.clock.now(),
        };
        if let Err(e) = self.log.append(record).await {
            tracing::warn!(
                error = %e,
                identifier,
                "failed to append login failure record, throttling accuracy degraded"
            );
        }
    }

    /// Number of failures for `identifier` inside the window.
    ///
    /// Fails open: an unreadable log counts as zero recent failures.
    pub async fn count_recent(&self, identifier: &str) -> u32 {
        self.recent_records(identifier).await.len() as u32
    }

    /// Whether `identifier` is currently locked out.
    pub async fn is_blocked(&self, identifier: &str) -> bool {
        self.count_recent(identifier).await >= self.config.max_attempts
    }

    /// Seconds until the oldest in-window failure ages out, or 0 when not
    /// blocked. Rounded up, so callers backing off for this long always land
    /// after the unlock.
    pub async fn seconds_until_unlock(&self, identifier: &str) -> u64 {
        let records = self.recent_records(identifier).await;
        if (records.len() as u32) < self.config.max_attempts {
            return 0;
        }

        let Some(oldest) = records.iter().map(|r| r.attempted_at).min() else {
            return 0;
        };

        let remaining_ms = (oldest + self.config.window - self.clock.now()).num_milliseconds();
        if remaining_ms <= 0 {
            0
        } else {
            (remaining_ms as u64).div_ceil(1000)
        }
    }

    async fn recent_records(&self, identifier: &str) -> Vec<FailureRecord> {
        let since = self.clock.now() - self.config.window;
        match self.log.scan_recent(identifier, since).await {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    identifier,
                    "failure log unreadable, treating identifier as unthrottled"
                );
                Vec::new()
            }
        }
    }
}
