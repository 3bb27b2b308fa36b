//! Time-based one-time password verification (RFC 6238)
//!
//! Codes are derived from a shared base32 secret and the current 30-second
//! time step, the scheme standard authenticator apps implement. Verification
//! is a stateless predicate: nothing is consumed, and a code remains valid
//! for every step inside the configured skew tolerance.

use std::sync::Arc;

use hmac::{Hmac, Mac};
use rand::{TryRngCore, rngs::OsRng};
use sha1::Sha1;

use crate::{
    Error,
    clock::Clock,
    crypto::constant_time_compare,
    error::{CryptoError, ValidationError},
};

/// Time-step parameters, RFC 6238 defaults.
#[derive(Debug, Clone)]
pub struct TotpConfig {
    /// Length of one time step in seconds.
    pub step_seconds: u64,
    /// Steps of clock skew accepted on either side of the current one.
    pub skew_steps: u8,
    /// Digits per code.
    pub digits: u32,
}

impl TotpConfig {
    pub const DEFAULT_STEP_SECONDS: u64 = 30;
    pub const DEFAULT_SKEW_STEPS: u8 = 1;
    pub const DEFAULT_DIGITS: u32 = 6;

    /// Create a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns `Err` if `step_seconds` is zero or `digits` lies outside the
    /// 4 to 8 range supported by authenticator apps.
    pub fn new(step_seconds: u64, skew_steps: u8, digits: u32) -> Result<Self, Error> {
        if step_seconds == 0 {
            return Err(ValidationError::InvalidField(
                "step_seconds must be greater than 0".to_string(),
            )
            .into());
        }
        if !(4..=8).contains(&digits) {
            return Err(ValidationError::InvalidField(
                "digits must be between 4 and 8".to_string(),
            )
            .into());
        }
        Ok(Self {
            step_seconds,
            skew_steps,
            digits,
        })
    }
}

impl Default for TotpConfig {
    fn default() -> Self {
        Self {
            step_seconds: Self::DEFAULT_STEP_SECONDS,
            skew_steps: Self::DEFAULT_SKEW_STEPS,
            digits: Self::DEFAULT_DIGITS,
        }
    }
}

/// Verifier for authenticator-app codes.
pub struct TotpVerifier {
    config: TotpConfig,
    clock: Arc<dyn Clock>,
}

impl TotpVerifier {
    pub fn new(config: TotpConfig, clock: Arc<dyn Clock>) -> Self {
        Self { config, clock }
    }

    /// Generate a fresh shared secret: 160 bits from the OS RNG, base32
    /// encoded (RFC 4648, no padding) for authenticator-app enrollment.
    ///
    /// # Panics
    ///
    /// Panics if the OS random number generator fails.
    pub fn generate_secret() -> String {
        let mut bytes = [0u8; 20];
        OsRng
            .try_fill_bytes(&mut bytes)
            .expect("OS RNG failure - system entropy source unavailable");
        base32::encode(base32::Alphabet::Rfc4648 { padding: false }, &bytes)
    }

    /// Check `submitted` against the codes for the current step and every
    /// step within the skew tolerance.
    ///
    /// Every candidate is derived and compared in constant structure; the
    /// loop never exits early on a match, so timing reveals neither which
    /// step matched nor how close a wrong guess was.
    ///
    /// # Errors
    ///
    /// Returns `Err` only for a malformed secret; a wrong code is `Ok(false)`.
    pub fn verify(&self, secret: &str, submitted: &str) -> Result<bool, Error> {
        let key = decode_secret(secret)?;
        let submitted = submitted.trim();

        let step = self.current_step();
        let skew = i64::from(self.config.skew_steps);

        let mut matched = false;
        for candidate_step in (step - skew)..=(step + skew) {
            if candidate_step < 0 {
                continue;
            }
            let candidate = derive_code(&key, candidate_step as u64, self.config.digits)?;
            matched |= constant_time_compare(candidate.as_bytes(), submitted.as_bytes());
        }

        Ok(matched)
    }

    /// The code an in-sync authenticator app displays right now.
    ///
    /// # Errors
    ///
    /// Returns `Err` for a malformed secret.
    pub fn current_code(&self, secret: &str) -> Result<String, Error> {
        let key = decode_secret(secret)?;
        derive_code(&key, self.current_step() as u64, self.config.digits)
    }

    fn current_step(&self) -> i64 {
        self.clock
            .now()
            .timestamp()
            .div_euclid(self.config.step_seconds as i64)
    }
}

fn decode_secret(secret: &str) -> Result<Vec<u8>, Error> {
    base32::decode(
        base32::Alphabet::Rfc4648 { padding: false },
        secret.trim().to_ascii_uppercase().as_str(),
    )
    .ok_or_else(|| CryptoError::InvalidSecret("secret is not valid base32".to_string()).into())
}

/// HOTP code derivation (RFC 4226): HMAC-SHA-1 over the big-endian counter,
/// dynamic truncation, reduced modulo `10^digits` and zero-padded.
fn derive_code(key: &[u8], counter: u64, digits: u32) -> Result<String, Error> {
    let mut mac = Hmac::<Sha1>::new_from_slice(key)
        .map_err(|e| CryptoError::InvalidSecret(e.to_string()))?;
    mac.update(&counter.to_be_bytes());
    let digest = mac.finalize().into_bytes();

    let offset = (digest[19] & 0x0f) as usize;
    let binary = (u32::from(digest[offset]) & 0x7f) << 24
        | u32::from(digest[offset + 1]) << 16
        | u32::from(digest[offset + 2]) << 8
        | u32::from(digest[offset + 3]);

    let code = binary % 10u32.pow(digits);
    Ok(format!("{code:0width$}", width = digits as usize))
}
