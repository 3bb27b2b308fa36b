//! Login orchestration
//!
//! Drives a login attempt through rate check, credential verification, and
//! MFA dispatch, and reports the result as a verdict value. Denials are data,
//! not errors: the taxonomy of ways a login can end is part of the return
//! type, and every counter increment or code consumption is persisted before
//! the verdict leaves this module.
//!
//! # Enumeration resistance
//!
//! A login against an unknown email and a login with a wrong password must
//! not be separable — not by the response value (both are
//! [`DenyReason::InvalidCredentials`]) and not by response time. When the
//! lookup misses, the orchestrator still performs one full password
//! verification against a fixed reference hash. This equalizes timing only
//! approximately (allocation and store traffic differ slightly between the
//! paths), which matches the protection the scheme is meant to provide;
//! a stricter contract would select real-or-decoy hash branchlessly and is
//! deliberately not attempted here.

use std::collections::HashSet;
use std::sync::{Arc, LazyLock};

use crate::{
    Error, User, UserId,
    clock::Clock,
    repositories::{FailureLogRepository, UserRepository},
    services::{
        EmailOtpOutcome, EmailOtpService, Mailer, RateLimiter, TotpVerifier,
    },
    user::MfaMethod,
    user::UserRole,
    validation::{normalize_email, validate_email, validate_password},
};

/// Where a login attempt ended up.
#[derive(Debug, Clone)]
pub enum LoginVerdict {
    /// Credentials verified and no second factor required.
    Authenticated(User),
    /// Credentials verified; a second factor must be presented next.
    /// For [`MfaMethod::EmailOtp`] a code has already been issued.
    MfaRequired { user_id: UserId, method: MfaMethod },
    Denied(DenyReason),
}

/// Why a login attempt was turned away.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DenyReason {
    /// Unknown email or wrong password; deliberately indistinguishable.
    InvalidCredentials,
    /// The account carries an administrative block.
    Blocked,
    /// The source address has exhausted its allowed failures for the window.
    /// `retry_after_seconds` lets the caller back off without re-probing.
    RateLimited { retry_after_seconds: u64 },
}

/// Where a second-factor attempt ended up.
#[derive(Debug, Clone)]
pub enum MfaVerdict {
    /// Terminal success, equivalent to a fully authenticated login.
    Verified(User),
    Denied(MfaDenyReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MfaDenyReason {
    /// Wrong code, or nothing to verify against. Each attempt fails hard;
    /// there is no retry counter on the MFA step itself.
    VerificationFailed,
    /// The emailed code's validity window has passed.
    ChallengeExpired,
}

/// Which users must present a second factor.
///
/// Kept as an explicit table so the rule is testable on its own: MFA is
/// required iff the user has it enabled and either holds a mandatory role or
/// has configured a method.
#[derive(Debug, Clone)]
pub struct MfaPolicy {
    mandatory_roles: HashSet<UserRole>,
}

impl Default for MfaPolicy {
    /// Administrators and content managers are always challenged.
    fn default() -> Self {
        Self::new([UserRole::Admin, UserRole::ContentManager])
    }
}

impl MfaPolicy {
    pub fn new(mandatory_roles: impl IntoIterator<Item = UserRole>) -> Self {
        Self {
            mandatory_roles: mandatory_roles.into_iter().collect(),
        }
    }

    pub fn requires_mfa(&self, user: &User) -> bool {
        user.mfa.enabled
            && (self.mandatory_roles.contains(&user.role) || user.mfa.method != MfaMethod::None)
    }

    /// The method to challenge with. A mandated user who never configured a
    /// method falls back to emailed codes, the only factor deliverable
    /// without prior enrollment.
    pub fn effective_method(&self, user: &User) -> MfaMethod {
        match user.mfa.method {
            MfaMethod::None => MfaMethod::EmailOtp,
            configured => configured,
        }
    }
}

/// Reference hash burned on the absent-user path. Computed once so every
/// dummy verification costs the same as a real one.
static REFERENCE_HASH: LazyLock<String> =
    LazyLock::new(|| password_auth::generate_hash("reference-password-never-accepted"));

/// Run one password verification whose result is discarded.
fn burn_password_verification(password: &str) {
    let _ = password_auth::verify_password(password, &REFERENCE_HASH);
}

/// Top-level login state machine.
///
/// Composes the rate limiter, the credential check, and both MFA verifiers.
/// Thread-safe; shared state lives behind the injected repositories.
pub struct AuthService<U, L, M>
where
    U: UserRepository,
    L: FailureLogRepository,
    M: Mailer,
{
    users: Arc<U>,
    rate_limiter: RateLimiter<L>,
    email_otp: EmailOtpService<U, M>,
    totp: TotpVerifier,
    policy: MfaPolicy,
    clock: Arc<dyn Clock>,
}

impl<U, L, M> AuthService<U, L, M>
where
    U: UserRepository,
    L: FailureLogRepository,
    M: Mailer,
{
    pub fn new(
        users: Arc<U>,
        rate_limiter: RateLimiter<L>,
        email_otp: EmailOtpService<U, M>,
        totp: TotpVerifier,
        policy: MfaPolicy,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            users,
            rate_limiter,
            email_otp,
            totp,
            policy,
            clock,
        }
    }

    pub fn policy(&self) -> &MfaPolicy {
        &self.policy
    }

    /// Process a login attempt from `ip` and return its verdict.
    ///
    /// # Errors
    ///
    /// Returns `Err` only for infrastructure faults (user store unreachable);
    /// every outcome of the attempt itself is a [`LoginVerdict`].
    pub async fn login(&self, email: &str, password: &str, ip: &str) -> Result<LoginVerdict, Error> {
        if self.rate_limiter.is_blocked(ip).await {
            let retry_after_seconds = self.rate_limiter.seconds_until_unlock(ip).await;
            tracing::info!(ip, retry_after_seconds, "login rejected, source throttled");
            return Ok(LoginVerdict::Denied(DenyReason::RateLimited {
                retry_after_seconds,
            }));
        }

        let email = normalize_email(email);
        let Some(user) = self.users.find_by_email(&email).await? else {
            // Unknown email: burn a verification anyway so this path costs
            // what a wrong password costs, and charge the source the same
            // failure it would be charged for one.
            burn_password_verification(password);
            self.rate_limiter.record_failure(ip).await;
            return Ok(LoginVerdict::Denied(DenyReason::InvalidCredentials));
        };

        if user.blocked {
            // Already gated permanently; nothing to count.
            return Ok(LoginVerdict::Denied(DenyReason::Blocked));
        }

        let verified = match user.password_hash.as_deref() {
            Some(hash) => password_auth::verify_password(password, hash).is_ok(),
            None => {
                // Password-less records can never verify, but cost the same.
                burn_password_verification(password);
                false
            }
        };

        if !verified {
            let mut updated = user;
            updated.failed_attempts = updated.failed_attempts.saturating_add(1);
            updated.last_failed_at = Some(self.clock.now());
            self.users.save(&updated).await?;
            self.rate_limiter.record_failure(ip).await;
            return Ok(LoginVerdict::Denied(DenyReason::InvalidCredentials));
        }

        let mut updated = user;
        updated.failed_attempts = 0;
        updated.last_failed_at = None;
        let user = self.users.save(&updated).await?;

        if !self.policy.requires_mfa(&user) {
            return Ok(LoginVerdict::Authenticated(user));
        }

        let method = self.policy.effective_method(&user);
        if method == MfaMethod::EmailOtp {
            self.email_otp.issue(&user.id).await?;
        }

        Ok(LoginVerdict::MfaRequired {
            user_id: user.id,
            method,
        })
    }

    /// Verify a submitted second-factor code for a user in the MFA-pending
    /// state.
    ///
    /// Dispatches on the user's effective method. Any mismatch is a hard
    /// failure for this attempt; the caller decides whether to allow another.
    pub async fn verify_mfa(&self, user_id: &UserId, code: &str) -> Result<MfaVerdict, Error> {
        let Some(user) = self.users.find_by_id(user_id).await? else {
            return Ok(MfaVerdict::Denied(MfaDenyReason::VerificationFailed));
        };

        match self.policy.effective_method(&user) {
            MfaMethod::Totp => {
                let Some(secret) = user.mfa.totp_secret.as_deref() else {
                    return Ok(MfaVerdict::Denied(MfaDenyReason::VerificationFailed));
                };
                if self.totp.verify(secret, code)? {
                    Ok(MfaVerdict::Verified(user))
                } else {
                    Ok(MfaVerdict::Denied(MfaDenyReason::VerificationFailed))
                }
            }
            MfaMethod::EmailOtp | MfaMethod::None => {
                match self.email_otp.verify_and_consume_for(&user, code).await? {
                    EmailOtpOutcome::Verified => {
                        let mut verified = user;
                        verified.mfa.clear_pending_code();
                        Ok(MfaVerdict::Verified(verified))
                    }
                    EmailOtpOutcome::Expired => {
                        Ok(MfaVerdict::Denied(MfaDenyReason::ChallengeExpired))
                    }
                    EmailOtpOutcome::Mismatch | EmailOtpOutcome::NotPending => {
                        Ok(MfaVerdict::Denied(MfaDenyReason::VerificationFailed))
                    }
                }
            }
        }
    }

    /// Register a new user with a password.
    ///
    /// Returns the existing record unchanged when the email is already taken:
    /// registration must not reveal which addresses are in use, and must
    /// never overwrite an existing password.
    pub async fn register_user(
        &self,
        email: &str,
        password: &str,
        name: Option<String>,
        role: UserRole,
    ) -> Result<User, Error> {
        let email = normalize_email(email);
        validate_email(&email)?;
        validate_password(password)?;

        if let Some(existing) = self.users.find_by_email(&email).await? {
            return Ok(existing);
        }

        let password_hash = password_auth::generate_hash(password);
        let user = User::builder()
            .email(email)
            .name(name)
            .role(role)
            .password_hash(Some(password_hash))
            .build()?;

        self.users.save(&user).await
    }

    /// Enroll `user_id` in authenticator-app MFA.
    ///
    /// Generates and stores a fresh shared secret and returns it for display
    /// to the user exactly once.
    pub async fn enroll_totp(&self, user_id: &UserId) -> Result<String, Error> {
        let mut user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(crate::error::AuthError::UserNotFound)?;

        let secret = TotpVerifier::generate_secret();
        user.mfa.enabled = true;
        user.mfa.method = MfaMethod::Totp;
        user.mfa.totp_secret = Some(secret.clone());
        self.users.save(&user).await?;

        Ok(secret)
    }

    /// Administrative reset of a user's login state: clears the failure
    /// counter and the block flag. Does not touch the IP-scoped limiter,
    /// which only ever ages out.
    pub async fn reset_login_state(&self, user_id: &UserId) -> Result<(), Error> {
        let mut user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(crate::error::AuthError::UserNotFound)?;

        user.failed_attempts = 0;
        user.last_failed_at = None;
        user.blocked = false;
        self.users.save(&user).await?;

        tracing::info!(user_id = %user_id, "login state reset");
        Ok(())
    }
}
