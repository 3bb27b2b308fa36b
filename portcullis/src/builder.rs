//! Builder for wiring a [`Portcullis`] instance
//!
//! The three collaborators (user store, failure log, mailer) are fixed when
//! the builder is created; everything else has a safe default and can be
//! overridden before [`build`](PortcullisBuilder::build).

use std::sync::Arc;

use portcullis_core::{
    Clock, SystemClock,
    repositories::{FailureLogRepository, UserRepository},
    services::{
        AuthService, CaptchaChallengeStore, CaptchaConfig, EmailOtpConfig, EmailOtpService,
        Mailer, MfaPolicy, RateLimitConfig, RateLimiter, TotpConfig, TotpVerifier,
    },
};

use crate::Portcullis;

/// Builder returned by [`Portcullis::builder`].
///
/// # Defaults
///
/// - Rate limit: 5 failures per 300 second window
/// - CAPTCHA: 6 characters, 5 minute TTL
/// - Email OTP: 6 characters, 10 minute TTL
/// - TOTP: 30 second steps, 6 digits, ±1 step of skew
/// - MFA policy: admins and content managers always challenged
/// - Clock: the system wall clock
pub struct PortcullisBuilder<U, L, M>
where
    U: UserRepository,
    L: FailureLogRepository,
    M: Mailer,
{
    users: Arc<U>,
    failure_log: Arc<L>,
    mailer: Arc<M>,
    clock: Arc<dyn Clock>,
    rate_limit: RateLimitConfig,
    captcha: CaptchaConfig,
    email_otp: EmailOtpConfig,
    totp: TotpConfig,
    policy: MfaPolicy,
}

impl<U, L, M> PortcullisBuilder<U, L, M>
where
    U: UserRepository,
    L: FailureLogRepository,
    M: Mailer,
{
    pub(crate) fn new(users: Arc<U>, failure_log: Arc<L>, mailer: Arc<M>) -> Self {
        Self {
            users,
            failure_log,
            mailer,
            clock: Arc::new(SystemClock),
            rate_limit: RateLimitConfig::default(),
            captcha: CaptchaConfig::default(),
            email_otp: EmailOtpConfig::default(),
            totp: TotpConfig::default(),
            policy: MfaPolicy::default(),
        }
    }

    /// Substitute the time source. Tests drive expiry with a fixed clock.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn rate_limit(mut self, config: RateLimitConfig) -> Self {
        self.rate_limit = config;
        self
    }

    pub fn captcha(mut self, config: CaptchaConfig) -> Self {
        self.captcha = config;
        self
    }

    pub fn email_otp(mut self, config: EmailOtpConfig) -> Self {
        self.email_otp = config;
        self
    }

    pub fn totp(mut self, config: TotpConfig) -> Self {
        self.totp = config;
        self
    }

    pub fn mfa_policy(mut self, policy: MfaPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn build(self) -> Portcullis<U, L, M> {
        let rate_limiter = RateLimiter::new(self.failure_log, self.rate_limit, self.clock.clone());
        let email_otp = EmailOtpService::new(
            self.users.clone(),
            self.mailer,
            self.email_otp,
            self.clock.clone(),
        );
        let totp = TotpVerifier::new(self.totp, self.clock.clone());
        let auth = AuthService::new(
            self.users,
            rate_limiter,
            email_otp,
            totp,
            self.policy,
            self.clock.clone(),
        );
        let captcha = CaptchaChallengeStore::new(self.captcha, self.clock);

        Portcullis { auth, captcha }
    }
}
