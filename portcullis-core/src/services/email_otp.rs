//! Single-use login codes delivered by email
//!
//! The code travels out-of-band; only its SHA-256 digest and expiry are kept
//! on the user record. A code matches at most once: the digest is cleared in
//! the same save that precedes a success result.

use std::sync::Arc;

use chrono::Duration;

use crate::{
    Error, User, UserId,
    clock::Clock,
    crypto,
    repositories::UserRepository,
    services::Mailer,
};

#[derive(Debug, Clone)]
pub struct EmailOtpConfig {
    /// How long an issued code stays valid.
    pub ttl: Duration,
    /// Characters per code.
    pub code_length: usize,
}

impl Default for EmailOtpConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::minutes(10),
            code_length: 6,
        }
    }
}

/// Result of a verification attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailOtpOutcome {
    /// Matched; the pending code has been consumed.
    Verified,
    /// A code is pending but the submission does not match it.
    Mismatch,
    /// A code is pending but its validity window has passed.
    Expired,
    /// No code is outstanding for this user.
    NotPending,
}

/// Issues and verifies emailed one-time codes.
pub struct EmailOtpService<U: UserRepository, M: Mailer> {
    users: Arc<U>,
    mailer: Arc<M>,
    config: EmailOtpConfig,
    clock: Arc<dyn Clock>,
}

impl<U: UserRepository, M: Mailer> EmailOtpService<U, M> {
    pub fn new(
        users: Arc<U>,
        mailer: Arc<M>,
        config: EmailOtpConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            users,
            mailer,
            config,
            clock,
        }
    }

    /// Generate a code for `user_id`, record its digest and expiry, and hand
    /// the plaintext to the mailer on a detached task.
    ///
    /// Returns the plaintext code for operator-driven flows; the usual caller
    /// discards it. Delivery is not awaited and a delivery failure is only a
    /// warning — the code simply expires unredeemed.
    pub async fn issue(&self, user_id: &UserId) -> Result<String, Error> {
        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(crate::error::AuthError::UserNotFound)?;

        let code = crypto::generate_code(self.config.code_length);

        let mut updated = user;
        updated.mfa.pending_code_hash = Some(crypto::hash_code(&code));
        updated.mfa.code_expires_at = Some(self.clock.now() + self.config.ttl);
        let updated = self.users.save(&updated).await?;

        let mailer = Arc::clone(&self.mailer);
        let to = updated.email.clone();
        let outbound = code.clone();
        tokio::spawn(async move {
            if let Err(e) = mailer.send_otp_email(&to, &outbound).await {
                tracing::warn!(error = %e, "failed to deliver one-time login code");
            }
        });

        Ok(code)
    }

    /// Check `submitted` against the user's pending code.
    ///
    /// On a match the pending digest and expiry are cleared and persisted
    /// before `Verified` is returned, so resubmitting the same code fails.
    /// Expired or absent codes are left untouched.
    pub async fn verify_and_consume(
        &self,
        user_id: &UserId,
        submitted: &str,
    ) -> Result<EmailOtpOutcome, Error> {
        let Some(user) = self.users.find_by_id(user_id).await? else {
            return Ok(EmailOtpOutcome::NotPending);
        };
        self.verify_and_consume_for(&user, submitted).await
    }

    /// Same as [`verify_and_consume`](Self::verify_and_consume) for a record
    /// the caller already holds.
    pub async fn verify_and_consume_for(
        &self,
        user: &User,
        submitted: &str,
    ) -> Result<EmailOtpOutcome, Error> {
        let (Some(stored_hash), Some(expires_at)) =
            (user.mfa.pending_code_hash.as_deref(), user.mfa.code_expires_at)
        else {
            return Ok(EmailOtpOutcome::NotPending);
        };

        if self.clock.now() > expires_at {
            return Ok(EmailOtpOutcome::Expired);
        }

        let normalized = submitted.trim().to_ascii_uppercase();
        if !crypto::verify_code_hash(&normalized, stored_hash) {
            return Ok(EmailOtpOutcome::Mismatch);
        }

        let mut updated = user.clone();
        updated.mfa.clear_pending_code();
        self.users.save(&updated).await?;

        Ok(EmailOtpOutcome::Verified)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::repositories::InMemoryUserRepository;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Mailer that records what it was asked to send.
    #[derive(Default)]
    struct CaptureMailer {
        sent: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl Mailer for CaptureMailer {
        async fn send_otp_email(&self, to: &str, code: &str) -> Result<(), Error> {
            self.sent
                .lock()
                .unwrap()
                .push((to.to_string(), code.to_string()));
            Ok(())
        }
    }

    async fn setup() -> (
        EmailOtpService<InMemoryUserRepository, CaptureMailer>,
        Arc<InMemoryUserRepository>,
        Arc<CaptureMailer>,
        Arc<FixedClock>,
        User,
    ) {
        let users = Arc::new(InMemoryUserRepository::new());
        let mailer = Arc::new(CaptureMailer::default());
        let clock = Arc::new(FixedClock::default());
        let service = EmailOtpService::new(
            users.clone(),
            mailer.clone(),
            EmailOtpConfig::default(),
            clock.clone(),
        );

        let user = User::builder()
            .email("alice@example.com".to_string())
            .build()
            .unwrap();
        users.save(&user).await.unwrap();

        (service, users, mailer, clock, user)
    }

    /// The mailer runs on a detached task; give it a moment.
    async fn wait_for_send(mailer: &CaptureMailer) -> (String, String) {
        for _ in 0..100 {
            if let Some(sent) = mailer.sent.lock().unwrap().first().cloned() {
                return sent;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        panic!("mailer was never invoked");
    }

    #[tokio::test]
    async fn test_issue_stores_digest_and_mails_plaintext() {
        let (service, users, mailer, _clock, user) = setup().await;

        let code = service.issue(&user.id).await.unwrap();
        assert_eq!(code.len(), 6);

        let (to, mailed) = wait_for_send(&mailer).await;
        assert_eq!(to, "alice@example.com");
        assert_eq!(mailed, code);

        let stored = users.find_by_id(&user.id).await.unwrap().unwrap();
        let hash = stored.mfa.pending_code_hash.unwrap();
        // The record holds a digest, never the code itself
        assert_ne!(hash, code);
        assert!(crypto::verify_code_hash(&code, &hash));
        assert!(stored.mfa.code_expires_at.is_some());
    }

    #[tokio::test]
    async fn test_verify_consumes_exactly_once() {
        let (service, _users, _mailer, _clock, user) = setup().await;

        let code = service.issue(&user.id).await.unwrap();

        let first = service.verify_and_consume(&user.id, &code).await.unwrap();
        assert_eq!(first, EmailOtpOutcome::Verified);

        let second = service.verify_and_consume(&user.id, &code).await.unwrap();
        assert_eq!(second, EmailOtpOutcome::NotPending);
    }

    #[tokio::test]
    async fn test_verify_rejects_wrong_code_without_consuming() {
        let (service, _users, _mailer, _clock, user) = setup().await;

        let code = service.issue(&user.id).await.unwrap();

        let wrong = service.verify_and_consume(&user.id, "XXXXXX").await.unwrap();
        assert_eq!(wrong, EmailOtpOutcome::Mismatch);

        // The real code still works afterwards
        let right = service.verify_and_consume(&user.id, &code).await.unwrap();
        assert_eq!(right, EmailOtpOutcome::Verified);
    }

    #[tokio::test]
    async fn test_verify_rejects_expired_code() {
        let (service, _users, _mailer, clock, user) = setup().await;

        let code = service.issue(&user.id).await.unwrap();

        clock.advance(Duration::minutes(10) + Duration::seconds(1));
        let outcome = service.verify_and_consume(&user.id, &code).await.unwrap();
        assert_eq!(outcome, EmailOtpOutcome::Expired);
    }

    #[tokio::test]
    async fn test_verify_is_case_insensitive() {
        let (service, _users, _mailer, _clock, user) = setup().await;

        let code = service.issue(&user.id).await.unwrap();
        let outcome = service
            .verify_and_consume(&user.id, &format!(" {} ", code.to_lowercase()))
            .await
            .unwrap();
        assert_eq!(outcome, EmailOtpOutcome::Verified);
    }

    #[tokio::test]
    async fn test_verify_without_pending_code() {
        let (service, _users, _mailer, _clock, user) = setup().await;

        let outcome = service.verify_and_consume(&user.id, "ABC123").await.unwrap();
        assert_eq!(outcome, EmailOtpOutcome::NotPending);
    }

    #[tokio::test]
    async fn test_issue_for_unknown_user_errors() {
        let (service, _users, _mailer, _clock, _user) = setup().await;

        let missing = UserId::new_random();
        assert!(service.issue(&missing).await.is_err());
    }
}
