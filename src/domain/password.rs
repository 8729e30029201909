//! Password hashing and verification.
//!
//! Argon2id with a random per-password salt, stored as a PHC-format
//! string. Verification parses the stored string back and lets the
//! `argon2` crate do the constant-time comparison; a mismatch is a normal
//! `Ok(false)`, a malformed stored hash is an error.

use anyhow::{anyhow, Result};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

/// Hash a password. Deliberately expensive; never used for tokens.
///
/// # Errors
/// Hashing failure is fatal to the surrounding operation.
pub fn hash(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let digest = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|err| anyhow!("failed to hash password: {err}"))?;
    Ok(digest.to_string())
}

/// Verify a candidate password against a stored PHC string.
///
/// # Errors
/// Only when the stored hash cannot be parsed; a wrong password is
/// `Ok(false)`.
pub fn verify(stored_hash: &str, candidate: &str) -> Result<bool> {
    let parsed = PasswordHash::new(stored_hash)
        .map_err(|err| anyhow!("invalid stored password hash: {err}"))?;
    Ok(Argon2::default()
        .verify_password(candidate.as_bytes(), &parsed)
        .is_ok())
}
