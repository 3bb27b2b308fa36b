//! Service layer for the login-hardening logic
//!
//! Each service owns one concern and composes through the orchestrator in
//! [`auth`].

pub mod auth;
pub mod captcha;
pub mod email_otp;
pub mod mailer;
pub mod rate_limit;
pub mod totp;

pub use auth::{AuthService, DenyReason, LoginVerdict, MfaDenyReason, MfaPolicy, MfaVerdict};
pub use captcha::{CaptchaChallenge, CaptchaChallengeStore, CaptchaConfig, CaptchaVerification};
pub use email_otp::{EmailOtpConfig, EmailOtpOutcome, EmailOtpService};
pub use mailer::{Mailer, NoopMailer};
pub use rate_limit::{RateLimitConfig, RateLimiter};
pub use totp::{TotpConfig, TotpVerifier};
