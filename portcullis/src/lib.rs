//! Login hardening behind one handle
//!
//! Portcullis wraps credential verification, IP-scoped failure throttling,
//! MFA (authenticator apps and emailed one-time codes), and a CAPTCHA
//! challenge store into a single library for a request-handling layer to
//! call. Storage and mail delivery are injected collaborators; every login
//! outcome comes back as a verdict value, never an error.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use portcullis::{FileFailureLog, LoginVerdict, Portcullis};
//! use portcullis_core::{repositories::InMemoryUserRepository, services::NoopMailer};
//!
//! let portcullis = Portcullis::builder(
//!     Arc::new(InMemoryUserRepository::new()),
//!     Arc::new(FileFailureLog::new("/var/lib/app/login-failures.log")),
//!     Arc::new(NoopMailer),
//! )
//! .build();
//!
//! match portcullis.login("user@example.com", "password", "203.0.113.7").await? {
//!     LoginVerdict::Authenticated(user) => { /* issue a session */ }
//!     LoginVerdict::MfaRequired { user_id, method } => { /* prompt for a code */ }
//!     LoginVerdict::Denied(reason) => { /* report, with retry-after if throttled */ }
//! }
//! ```

mod builder;

pub use builder::PortcullisBuilder;
pub use portcullis_core::{
    Clock, Error, MfaMethod, MfaSettings, SystemClock, User, UserId, UserRole,
    clock::FixedClock,
    repositories::{
        FailureLogRepository, FailureRecord, InMemoryFailureLog, InMemoryUserRepository,
        UserRepository,
    },
    services::{
        CaptchaChallenge, CaptchaConfig, CaptchaVerification, DenyReason, EmailOtpConfig,
        LoginVerdict, Mailer, MfaDenyReason, MfaPolicy, MfaVerdict, NoopMailer, RateLimitConfig,
        TotpConfig, TotpVerifier,
    },
};
pub use portcullis_store_file::FileFailureLog;

use portcullis_core::repositories as repos;
use portcullis_core::services::{AuthService, CaptchaChallengeStore};
use std::sync::Arc;

/// The assembled login-hardening stack.
///
/// Construct through [`Portcullis::builder`]. Cheap to share behind an
/// `Arc`; all methods take `&self`.
pub struct Portcullis<U, L, M>
where
    U: repos::UserRepository,
    L: repos::FailureLogRepository,
    M: Mailer,
{
    pub(crate) auth: AuthService<U, L, M>,
    pub(crate) captcha: CaptchaChallengeStore,
}

impl<U, L, M> Portcullis<U, L, M>
where
    U: repos::UserRepository,
    L: repos::FailureLogRepository,
    M: Mailer,
{
    /// Start building an instance around the three collaborators.
    pub fn builder(
        users: Arc<U>,
        failure_log: Arc<L>,
        mailer: Arc<M>,
    ) -> PortcullisBuilder<U, L, M> {
        PortcullisBuilder::new(users, failure_log, mailer)
    }

    /// Process a login attempt. See
    /// [`AuthService::login`](portcullis_core::services::AuthService::login).
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        ip: &str,
    ) -> Result<LoginVerdict, Error> {
        self.auth.login(email, password, ip).await
    }

    /// Verify a second-factor code for a user in the MFA-pending state.
    pub async fn verify_mfa(&self, user_id: &UserId, code: &str) -> Result<MfaVerdict, Error> {
        self.auth.verify_mfa(user_id, code).await
    }

    /// Register a new user with a password.
    pub async fn register_user(
        &self,
        email: &str,
        password: &str,
        name: Option<String>,
        role: UserRole,
    ) -> Result<User, Error> {
        self.auth.register_user(email, password, name, role).await
    }

    /// Enroll a user in authenticator-app MFA and return the fresh secret.
    pub async fn enroll_totp(&self, user_id: &UserId) -> Result<String, Error> {
        self.auth.enroll_totp(user_id).await
    }

    /// Clear a user's failure counter and administrative block.
    pub async fn reset_login_state(&self, user_id: &UserId) -> Result<(), Error> {
        self.auth.reset_login_state(user_id).await
    }

    /// Issue a CAPTCHA challenge, optionally bound to a pending user.
    pub fn generate_captcha(&self, bound_user: Option<UserId>) -> CaptchaChallenge {
        self.captcha.generate(bound_user)
    }

    /// Check a CAPTCHA answer, consuming the challenge on success.
    pub fn verify_captcha(&self, token: &str, answer: &str) -> CaptchaVerification {
        self.captcha.verify_and_consume(token, answer)
    }

    /// Swap a CAPTCHA challenge for a fresh one, keeping any bound user.
    pub fn rotate_captcha(&self, old_token: &str) -> CaptchaChallenge {
        self.captcha.rotate(old_token)
    }
}
