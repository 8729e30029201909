//! Stateless sessions: signed claims in a cookie or bearer header.
//!
//! A verified user is turned into an HS256-signed claims payload carried
//! by the client and verified per-request against a server-held secret.
//! The secret is injected at startup through [`SessionKeys::new`]; there
//! is no process-wide codec. Nothing here is persisted and nothing here
//! is single-use; single-use semantics belong to the token store.

use axum::http::{
    header::{InvalidHeaderValue, AUTHORIZATION, COOKIE},
    HeaderMap, HeaderValue,
};
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

pub const SESSION_COOKIE_NAME: &str = "identeco_session";

/// One week, matching the cookie Max-Age.
pub const SESSION_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// The signed payload identifying the authenticated user.
#[derive(Serialize, Deserialize, Debug)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub iat: i64,
    pub exp: i64,
}

/// Every failure mode collapses to this one outcome; the specific cause
/// is log-only so callers cannot probe signature vs. expiry vs. garbage.
#[derive(Debug, Error)]
#[error("invalid or missing authentication credentials")]
pub struct Unauthenticated;

/// Signing/verification key pair derived from the injected secret.
pub struct SessionKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
    cookie_secure: bool,
}

impl SessionKeys {
    #[must_use]
    pub fn new(secret: &SecretString, cookie_secure: bool) -> Self {
        let bytes = secret.expose_secret().as_bytes();
        Self {
            encoding: EncodingKey::from_secret(bytes),
            decoding: DecodingKey::from_secret(bytes),
            ttl: SESSION_TTL,
            cookie_secure,
        }
    }

    /// Sign a claims payload for the user.
    ///
    /// # Errors
    /// Signing failure is an internal error; no artifact is produced.
    pub fn issue(&self, user_id: Uuid, email: &str) -> anyhow::Result<String> {
        let now = Utc::now().timestamp();
        let ttl = i64::try_from(self.ttl.as_secs()).unwrap_or(i64::MAX);
        let claims = Claims {
            sub: user_id,
            email: email.to_string(),
            iat: now,
            exp: now + ttl,
        };
        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|err| anyhow::anyhow!("failed to sign session claims: {err}"))
    }

    /// Verify a presented artifact and return its claims.
    ///
    /// # Errors
    /// Bad signature, malformed payload, and expiry all return the same
    /// [`Unauthenticated`] value.
    pub fn verify(&self, artifact: &str) -> Result<Claims, Unauthenticated> {
        let validation = Validation::new(Algorithm::HS256);
        match decode::<Claims>(artifact, &self.decoding, &validation) {
            Ok(data) => Ok(data.claims),
            Err(err) => {
                debug!("session verification failed: {err}");
                Err(Unauthenticated)
            }
        }
    }

    /// Build the `Set-Cookie` value carrying a freshly issued artifact.
    ///
    /// # Errors
    /// Returns an error if the artifact cannot be encoded as a header value.
    pub fn session_cookie(&self, artifact: &str) -> Result<HeaderValue, InvalidHeaderValue> {
        let ttl_seconds = self.ttl.as_secs();
        let mut cookie = format!(
            "{SESSION_COOKIE_NAME}={artifact}; Path=/; HttpOnly; SameSite=Lax; Max-Age={ttl_seconds}"
        );
        if self.cookie_secure {
            cookie.push_str("; Secure");
        }
        HeaderValue::from_str(&cookie)
    }
}

/// Pull the session artifact from a bearer header or the session cookie,
/// in that order.
#[must_use]
pub fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = extract_bearer_token(headers) {
        return Some(token);
    }
    let header = headers.get(COOKIE)?;
    let value = header.to_str().ok()?;
    for pair in value.split(';') {
        let trimmed = pair.trim();
        let mut parts = trimmed.splitn(2, '=');
        let key = parts.next()?.trim();
        let val = parts.next()?.trim();
        if key == SESSION_COOKIE_NAME {
            return Some(val.to_string());
        }
    }
    None
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}
