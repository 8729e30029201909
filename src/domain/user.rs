//! User record and input validation.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use utoipa::ToSchema;
use uuid::Uuid;

pub const PASSWORD_MIN_LENGTH: usize = 6;

/// A user row as the stores see it. The password is only ever held as an
/// argon2 PHC string; [`UserResponse`] is the only outward shape.
#[derive(Clone, Debug)]
pub struct User {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password_hash: String,
    pub activated: bool,
    pub version: i32,
    pub created_at: DateTime<Utc>,
}

/// Input for `UserStore::create`. The id is minted by the store.
#[derive(Clone, Debug)]
pub struct NewUser {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password_hash: String,
}

/// The outward user shape. There is deliberately no password field of any
/// kind here, so a hash can never leak through serialization.
#[derive(ToSchema, Serialize, Debug)]
pub struct UserResponse {
    pub id: Uuid,
    #[serde(rename = "firstName")]
    pub first_name: String,
    #[serde(rename = "lastName")]
    pub last_name: String,
    pub email: String,
    pub activated: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            email: user.email.clone(),
            activated: user.activated,
            created_at: user.created_at,
        }
    }
}

/// Normalize an email for lookup/uniqueness checks.
#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Basic email format check on already-normalized input.
#[must_use]
pub fn valid_email(email_normalized: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|regex| regex.is_match(email_normalized))
}

/// Field-level validation for registration input. Keys are field names as
/// they appear in the request body.
#[must_use]
pub fn validate_registration(
    first_name: &str,
    last_name: &str,
    email_normalized: &str,
    password: &str,
) -> BTreeMap<String, String> {
    let mut errors = BTreeMap::new();
    if first_name.trim().is_empty() {
        errors.insert("firstName".to_string(), "must be provided".to_string());
    }
    if last_name.trim().is_empty() {
        errors.insert("lastName".to_string(), "must be provided".to_string());
    }
    if !valid_email(email_normalized) {
        errors.insert("email".to_string(), "invalid email".to_string());
    }
    if password.chars().count() < PASSWORD_MIN_LENGTH {
        errors.insert(
            "password".to_string(),
            format!("password must be at least {PASSWORD_MIN_LENGTH} characters"),
        );
    }
    errors
}
