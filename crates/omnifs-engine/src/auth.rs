//! Password hashing and token generation.
//!
//! Stored credentials use the `salt:digest` form, where the digest is the
//! hex SHA-256 of `password || salt` and the salt is 16 random bytes as hex.
//! This pins the only property the container needs: `verify(p, hash(p))`
//! holds, two hashes of the same password differ, and comparison leaks no
//! timing.

use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Generates a 16-byte random salt as 32 hex characters.
#[must_use]
pub fn generate_salt() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Generates a 32-byte random session token as 64 hex characters.
#[must_use]
pub fn generate_token() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}

fn digest(password: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    hasher.update(salt.as_bytes());
    hex::encode(hasher.finalize())
}

/// Hashes a password with a fresh salt into the `salt:digest` form.
#[must_use]
pub fn hash_password(password: &str) -> String {
    let salt = generate_salt();
    let digest = digest(password, &salt);
    format!("{salt}:{digest}")
}

/// Verifies a password against a stored `salt:digest` value.
#[must_use]
pub fn verify_password(password: &str, stored: &str) -> bool {
    let Some((salt, stored_digest)) = stored.split_once(':') else {
        return false;
    };
    let computed = digest(password, salt);
    constant_time_eq(computed.as_bytes(), stored_digest.as_bytes())
}

/// Compares two byte strings without an early exit on mismatch.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}
