//! Short-lived human-solvable challenges
//!
//! A challenge is an opaque token bound to a random code; how the code
//! reaches the solver (image, audio, out-of-band) is the presentation
//! layer's business. The token is never derivable from the code or vice
//! versa. Entries are single-use and expire lazily: every operation purges
//! stale entries before doing its work, so no background sweeper is needed.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::sync::Arc;

use crate::{clock::Clock, crypto, id::generate_prefixed_id, user::UserId};

/// Configuration for challenge generation.
#[derive(Debug, Clone)]
pub struct CaptchaConfig {
    /// Characters per code.
    pub code_length: usize,
    /// How long a challenge stays solvable.
    pub ttl: Duration,
}

impl Default for CaptchaConfig {
    fn default() -> Self {
        Self {
            code_length: 6,
            ttl: Duration::minutes(5),
        }
    }
}

/// A freshly issued challenge: the token identifies it, the code is what the
/// presentation layer renders for the solver.
#[derive(Debug, Clone)]
pub struct CaptchaChallenge {
    pub token: String,
    pub code: String,
}

/// Result of a verification attempt.
///
/// Expired and never-existed tokens are indistinguishable from a wrong
/// answer; nothing about the failure mode is leaked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptchaVerification {
    /// The answer matched; the entry has been consumed.
    Solved { bound_user: Option<UserId> },
    NoMatch,
}

#[derive(Debug, Clone)]
struct CaptchaEntry {
    code: String,
    expires_at: DateTime<Utc>,
    bound_user: Option<UserId>,
}

/// In-memory table of live challenges.
///
/// Concurrent solvers racing on the same token are safe: consumption is an
/// atomic remove-on-match, so at most one wins.
pub struct CaptchaChallengeStore {
    entries: DashMap<String, CaptchaEntry>,
    config: CaptchaConfig,
    clock: Arc<dyn Clock>,
}

impl CaptchaChallengeStore {
    pub fn new(config: CaptchaConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            config,
            clock,
        }
    }

    /// Issue a new challenge, optionally bound to a pending user identity
    /// that is handed back when the challenge is solved.
    pub fn generate(&self, bound_user: Option<UserId>) -> CaptchaChallenge {
        self.purge_expired();

        let code = crypto::generate_code(self.config.code_length);
        let token = generate_prefixed_id("cap");
        self.entries.insert(
            token.clone(),
            CaptchaEntry {
                code: code.clone(),
                expires_at: self.clock.now() + self.config.ttl,
                bound_user,
            },
        );

        CaptchaChallenge { token, code }
    }

    /// Check `answer` against the challenge behind `token`.
    ///
    /// Comparison is case-insensitive and ignores surrounding whitespace. On
    /// a match the entry is removed in the same step, so a replay of the
    /// same token and answer fails. On anything else nothing is modified.
    pub fn verify_and_consume(&self, token: &str, answer: &str) -> CaptchaVerification {
        self.purge_expired();

        let submitted = answer.trim().to_ascii_uppercase();
        let now = self.clock.now();

        // remove_if is atomic: of any number of concurrent correct answers,
        // exactly one observes the entry. The expiry re-check covers entries
        // that lapsed between the purge above and this call.
        match self.entries.remove_if(token, |_, entry| {
            now <= entry.expires_at
                && crypto::constant_time_compare(submitted.as_bytes(), entry.code.as_bytes())
        }) {
            Some((_, entry)) => CaptchaVerification::Solved {
                bound_user: entry.bound_user,
            },
            None => CaptchaVerification::NoMatch,
        }
    }

    /// Replace `old_token`'s challenge with a fresh one, carrying any bound
    /// user forward. The old token stops working immediately.
    pub fn rotate(&self, old_token: &str) -> CaptchaChallenge {
        self.purge_expired();

        let carried = self
            .entries
            .remove(old_token)
            .and_then(|(_, entry)| entry.bound_user);

        self.generate(carried)
    }

    /// Number of live (unexpired) entries.
    pub fn len(&self) -> usize {
        self.purge_expired();
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn purge_expired(&self) {
        let now = self.clock.now();
        self.entries.retain(|_, entry| now <= entry.expires_at);
    }
}
