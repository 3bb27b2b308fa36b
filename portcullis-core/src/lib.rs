//! Core functionality for the portcullis project
//!
//! This crate holds the login-hardening services: sliding-window throttling
//! of failed logins over a durable log, credential verification with
//! enumeration-resistant timing, MFA orchestration (authenticator-app codes
//! and emailed one-time codes), and a short-lived CAPTCHA challenge store.
//!
//! It is a library for a request-handling layer to consume: the user store
//! and mail delivery are injected collaborators (see [`repositories`] and
//! [`services::Mailer`]), and every login outcome is reported as a verdict
//! value rather than an error.
//!
//! See [`services::AuthService`] for the top-level state machine and
//! [`User`] for the record it operates on.

pub mod clock;
pub mod crypto;
pub mod error;
pub mod id;
pub mod repositories;
pub mod services;
pub mod user;
pub mod validation;

pub use clock::{Clock, SystemClock};
pub use error::Error;
pub use user::{MfaMethod, MfaSettings, User, UserId, UserRole};
