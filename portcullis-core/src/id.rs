//! Prefixed, URL-safe identifier generation
//!
//! Identifiers look like `usr_3q2xJd…` and carry at least 96 bits of entropy,
//! so they are unguessable and never reused in practice.

use base64::{Engine, prelude::BASE64_URL_SAFE_NO_PAD};
use rand::{TryRngCore, rngs::OsRng};

/// Generate a prefixed ID with 96 bits of entropy.
///
/// The format is `{prefix}_{random}` where the random part is base64
/// URL-safe encoded without padding.
///
/// # Panics
///
/// Panics if the OS random number generator fails; there is no safe way to
/// continue issuing identifiers without an entropy source.
pub fn generate_prefixed_id(prefix: &str) -> String {
    let mut bytes = [0u8; 12];
    OsRng
        .try_fill_bytes(&mut bytes)
        .expect("OS RNG failure - system entropy source unavailable");

    let encoded = BASE64_URL_SAFE_NO_PAD.encode(bytes);

    format!("{prefix}_{encoded}")
}

/// Validate that an ID consists of the expected prefix followed by at least
/// 96 bits of base64 URL-safe data.
pub fn validate_prefixed_id(id: &str, expected_prefix: &str) -> bool {
    let Some(rest) = id.strip_prefix(expected_prefix) else {
        return false;
    };
    let Some(random_part) = rest.strip_prefix('_') else {
        return false;
    };

    match BASE64_URL_SAFE_NO_PAD.decode(random_part) {
        Ok(decoded) => decoded.len() >= 12,
        Err(_) => false,
    }
}
