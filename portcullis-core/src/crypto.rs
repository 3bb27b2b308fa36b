//! Code generation, hashing, and constant-time verification
//!
//! Short human-facing codes (CAPTCHA answers, emailed one-time codes) are
//! drawn from a restricted alphabet and, where persisted, stored as SHA-256
//! digests rather than plaintext. Verification always goes through a
//! constant-time comparison so that response time does not depend on how many
//! leading characters of a guess were correct.

use rand::{TryRngCore, rngs::OsRng};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Alphabet for human-facing codes.
///
/// Excludes visually confusable characters (I, L, O, 0, 1) so a code can be
/// read back from a noisy rendering or typed from a phone screen without
/// ambiguity.
pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";

/// Generate a random code of `length` characters from [`CODE_ALPHABET`].
///
/// # Panics
///
/// Panics if the OS random number generator fails. This indicates a critical
/// system failure from which recovery is not possible for security-sensitive
/// operations.
pub fn generate_code(length: usize) -> String {
    let mut bytes = vec![0u8; length];
    OsRng
        .try_fill_bytes(&mut bytes)
        .expect("OS RNG failure - system entropy source unavailable");

    bytes
        .iter()
        .map(|b| CODE_ALPHABET[*b as usize % CODE_ALPHABET.len()] as char)
        .collect()
}

/// Hash a code for storage, as a hex-encoded SHA-256 digest.
///
/// Callers are expected to normalize (trim, uppercase) before hashing so the
/// stored digest and the digest of a submitted answer line up.
pub fn hash_code(code: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(code.as_bytes());
    hex::encode(hasher.finalize())
}

/// Verify a submitted code against a stored digest in constant time.
pub fn verify_code_hash(code: &str, stored_hash: &str) -> bool {
    constant_time_compare(hash_code(code).as_bytes(), stored_hash.as_bytes())
}

/// Constant-time equality over byte slices.
///
/// The comparison takes the same amount of time regardless of where (or
/// whether) the inputs differ. A length mismatch returns early, which is fine:
/// code and digest lengths are public information.
pub fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}
