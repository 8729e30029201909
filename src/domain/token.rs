//! Single-use verification tokens.
//!
//! The plaintext is 26 characters of unpadded RFC 4648 base32 over 16
//! bytes from the operating system CSPRNG. It is returned to the caller
//! exactly once; only its SHA-256 digest is ever persisted, so a stored
//! row can never be turned back into a redeemable secret.

use anyhow::{Context, Result};
use base32::Alphabet;
use chrono::{DateTime, Duration, Utc};
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Exact plaintext length produced by encoding 16 random bytes.
pub const TOKEN_PLAINTEXT_LENGTH: usize = 26;

/// Purpose tag on a token. A token minted for one purpose can never be
/// redeemed for another: lookups always match on scope.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenScope {
    Activation,
    PasswordReset,
    Authentication,
}

impl TokenScope {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Activation => "activation",
            Self::PasswordReset => "password-reset",
            Self::Authentication => "authentication",
        }
    }
}

impl std::fmt::Display for TokenScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A freshly minted token. `plaintext` goes to the user, `hash` to the
/// database; the two never travel together again.
#[derive(Clone, Debug)]
pub struct Token {
    pub plaintext: String,
    pub hash: Vec<u8>,
    pub user_id: Uuid,
    pub expiry: DateTime<Utc>,
    pub scope: TokenScope,
}

impl Token {
    /// Mint a new token for `user_id` with the given time-to-live.
    ///
    /// # Errors
    /// Fails when the CSPRNG cannot produce bytes; issuance must abort
    /// rather than fall back to a weaker source.
    pub fn generate(user_id: Uuid, ttl: std::time::Duration, scope: TokenScope) -> Result<Self> {
        let mut bytes = [0u8; 16];
        OsRng
            .try_fill_bytes(&mut bytes)
            .context("failed to generate token")?;

        let plaintext = base32::encode(Alphabet::Rfc4648 { padding: false }, &bytes);
        let hash = hash_token(&plaintext);
        let ttl = Duration::from_std(ttl).context("token ttl out of range")?;

        Ok(Self {
            plaintext,
            hash,
            user_id,
            expiry: Utc::now() + ttl,
            scope,
        })
    }
}

/// Storage digest of a plaintext token. Tokens are high-entropy already,
/// so a fast hash suffices for the lookup column; the slow adaptive hash
/// is reserved for passwords.
#[must_use]
pub fn hash_token(plaintext: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(plaintext.as_bytes());
    hasher.finalize().to_vec()
}

/// Format check applied before any lookup: present and exactly 26 bytes.
#[must_use]
pub fn valid_plaintext(plaintext: &str) -> bool {
    !plaintext.is_empty() && plaintext.len() == TOKEN_PLAINTEXT_LENGTH
}
