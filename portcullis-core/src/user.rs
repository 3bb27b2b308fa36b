//! User records and the login state they carry
//!
//! The user record is owned by an external store; this crate reads and writes
//! it through the [`UserRepository`](crate::repositories::UserRepository)
//! collaborator. Besides identity fields it carries the per-user login state
//! (failure counter, administrative block flag) and the user's MFA
//! configuration.
//!
//! The per-user failure counter is advisory: concurrent logins racing on the
//! same record may lose an increment. The IP-scoped rate limiter, backed by an
//! append-only log, is the authoritative throttle.

use crate::{
    Error,
    error::ValidationError,
    id::{generate_prefixed_id, validate_prefixed_id},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A unique, stable identifier for a specific user.
/// This value should be treated as opaque.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: &str) -> Self {
        UserId(id.to_string())
    }

    pub fn new_random() -> Self {
        UserId(generate_prefixed_id("usr"))
    }

    pub fn into_inner(self) -> String {
        self.0
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Validate that this ID has the correct format for a user ID
    pub fn is_valid(&self) -> bool {
        validate_prefixed_id(&self.0, "usr")
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new_random()
    }
}

impl From<String> for UserId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Coarse role attached to a user record.
///
/// Roles matter to this crate only through the MFA policy: some roles are
/// always challenged regardless of their personal MFA toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UserRole {
    Admin,
    ContentManager,
    Member,
}

/// The second factor a user verifies with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MfaMethod {
    /// No method configured.
    #[default]
    None,
    /// Authenticator-app codes derived from a shared secret.
    Totp,
    /// Single-use codes delivered by email.
    EmailOtp,
}

/// Per-user MFA configuration and in-flight challenge state.
///
/// `pending_code_hash`/`code_expires_at` are populated only while an emailed
/// code is outstanding and are cleared together on the first successful
/// verification. The TOTP secret persists across sessions and is never
/// consumed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MfaSettings {
    pub enabled: bool,
    pub method: MfaMethod,
    pub totp_secret: Option<String>,
    pub pending_code_hash: Option<String>,
    pub code_expires_at: Option<DateTime<Utc>>,
}

impl MfaSettings {
    pub fn totp(secret: String) -> Self {
        Self {
            enabled: true,
            method: MfaMethod::Totp,
            totp_secret: Some(secret),
            ..Default::default()
        }
    }

    pub fn email_otp() -> Self {
        Self {
            enabled: true,
            method: MfaMethod::EmailOtp,
            ..Default::default()
        }
    }

    pub fn has_pending_code(&self) -> bool {
        self.pending_code_hash.is_some()
    }

    /// Drop any outstanding emailed code. Both fields go together.
    pub fn clear_pending_code(&mut self) {
        self.pending_code_hash = None;
        self.code_expires_at = None;
    }
}

/// A user record as seen by this crate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,

    pub name: Option<String>,

    pub email: String,

    // Argon2 hash of the user's password, absent for users that have never
    // set one (they can never pass credential verification).
    pub password_hash: Option<String>,

    pub role: UserRole,

    // Administrative block, independent of the rate limiter. Both lockout
    // layers apply at the same time.
    pub blocked: bool,

    pub failed_attempts: u32,

    pub last_failed_at: Option<DateTime<Utc>>,

    pub mfa: MfaSettings,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn builder() -> UserBuilder {
        UserBuilder::default()
    }
}

#[derive(Default)]
pub struct UserBuilder {
    id: Option<UserId>,
    name: Option<String>,
    email: Option<String>,
    password_hash: Option<String>,
    role: Option<UserRole>,
    blocked: bool,
    mfa: Option<MfaSettings>,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
}

impl UserBuilder {
    pub fn id(mut self, id: UserId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn name(mut self, name: Option<String>) -> Self {
        self.name = name;
        self
    }

    pub fn email(mut self, email: String) -> Self {
        self.email = Some(email);
        self
    }

    pub fn password_hash(mut self, password_hash: Option<String>) -> Self {
        self.password_hash = password_hash;
        self
    }

    pub fn role(mut self, role: UserRole) -> Self {
        self.role = Some(role);
        self
    }

    pub fn blocked(mut self, blocked: bool) -> Self {
        self.blocked = blocked;
        self
    }

    pub fn mfa(mut self, mfa: MfaSettings) -> Self {
        self.mfa = Some(mfa);
        self
    }

    pub fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    pub fn updated_at(mut self, updated_at: DateTime<Utc>) -> Self {
        self.updated_at = Some(updated_at);
        self
    }

    pub fn build(self) -> Result<User, Error> {
        let now = Utc::now();
        Ok(User {
            id: self.id.unwrap_or_default(),
            name: self.name,
            email: self.email.ok_or(ValidationError::MissingField(
                "Email is required".to_string(),
            ))?,
            password_hash: self.password_hash,
            role: self.role.unwrap_or(UserRole::Member),
            blocked: self.blocked,
            failed_attempts: 0,
            last_failed_at: None,
            mfa: self.mfa.unwrap_or_default(),
            created_at: self.created_at.unwrap_or(now),
            updated_at: self.updated_at.unwrap_or(now),
        })
    }
}
