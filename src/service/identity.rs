//! Identity workflows: registration, login, activation, password reset.
//!
//! The only component with branching business logic. Each workflow is a
//! single pass over the stores, with no internal retries, and returns a
//! typed [`IdentityError`] the handlers translate to HTTP. Store "not
//! found" outcomes are rewritten here into generic validation messages so
//! responses never disclose whether a token or credential ever existed.

use anyhow::anyhow;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::error;
use uuid::Uuid;

use crate::domain::token::{valid_plaintext, TOKEN_PLAINTEXT_LENGTH};
use crate::domain::user::{normalize_email, valid_email, validate_registration, PASSWORD_MIN_LENGTH};
use crate::domain::{password, NewUser, TokenScope, User};
use crate::mailer::Mailer;
use crate::store::{StoreError, TokenStore, UserStore};

/// Activation links live for three days.
pub const ACTIVATION_TOKEN_TTL: Duration = Duration::from_secs(3 * 24 * 60 * 60);

/// Password-reset links live for 45 minutes.
pub const PASSWORD_RESET_TOKEN_TTL: Duration = Duration::from_secs(45 * 60);

#[derive(Debug, Error)]
pub enum IdentityError {
    /// Caller-fixable input problems, keyed by field name. Also the shape
    /// invalid/expired tokens take, so a probing caller learns nothing.
    #[error("validation failed")]
    Validation(BTreeMap<String, String>),
    #[error("a user with this email address already exists")]
    DuplicateEmail,
    /// One outcome for unknown email and wrong password alike.
    #[error("invalid credentials")]
    InvalidCredentials,
    /// Distinguishable on purpose: the user should go check their inbox.
    #[error("account has not been activated")]
    NotActivated,
    #[error("unable to update the record due to an edit conflict, please try again")]
    EditConflict,
    #[error("the requested resource could not be found")]
    NotFound,
    #[error(transparent)]
    Internal(anyhow::Error),
}

impl IdentityError {
    fn field(name: &str, message: &str) -> Self {
        let mut errors = BTreeMap::new();
        errors.insert(name.to_string(), message.to_string());
        Self::Validation(errors)
    }

    fn internal(err: StoreError, context: &'static str) -> Self {
        Self::Internal(anyhow!(err).context(context))
    }
}

#[derive(Clone, Debug)]
pub struct RegisterInput {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
}

/// Orchestrates the stores, hasher, and mailer. Stores are capability
/// interfaces, so tests run the same workflows over in-memory fakes.
pub struct IdentityService {
    users: Arc<dyn UserStore>,
    tokens: Arc<dyn TokenStore>,
    mailer: Arc<dyn Mailer>,
}

impl IdentityService {
    #[must_use]
    pub fn new(
        users: Arc<dyn UserStore>,
        tokens: Arc<dyn TokenStore>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        Self {
            users,
            tokens,
            mailer,
        }
    }

    /// Register a new, unactivated user and email them an activation
    /// token. Email availability is enforced by the store's unique
    /// constraint, not a pre-read, so there is no check-then-act window.
    ///
    /// # Errors
    /// `Validation` for malformed input, `DuplicateEmail` when the
    /// address is taken, `Internal` for store or hashing failures.
    pub async fn register(&self, input: RegisterInput) -> Result<User, IdentityError> {
        let first_name = input.first_name.trim().to_string();
        let last_name = input.last_name.trim().to_string();
        let email = normalize_email(&input.email);

        let errors = validate_registration(&first_name, &last_name, &email, &input.password);
        if !errors.is_empty() {
            return Err(IdentityError::Validation(errors));
        }

        let password_hash = password::hash(&input.password).map_err(IdentityError::Internal)?;

        let user = match self
            .users
            .create(NewUser {
                first_name,
                last_name,
                email,
                password_hash,
            })
            .await
        {
            Ok(user) => user,
            Err(StoreError::DuplicateEmail) => return Err(IdentityError::DuplicateEmail),
            Err(err) => return Err(IdentityError::internal(err, "failed to create user")),
        };

        let token = self
            .tokens
            .create(user.id, ACTIVATION_TOKEN_TTL, TokenScope::Activation)
            .await
            .map_err(|err| IdentityError::internal(err, "failed to issue activation token"))?;

        self.dispatch_mail(
            user.email.clone(),
            "user_welcome.tmpl",
            json!({
                "userID": user.id,
                "activationToken": token.plaintext,
            }),
        );

        Ok(user)
    }

    /// Verify credentials and return the user for session issuance.
    ///
    /// # Errors
    /// `InvalidCredentials` for unknown email or wrong password (the two
    /// are indistinguishable), `NotActivated` for a correct login against
    /// a pending account, `Internal` otherwise.
    pub async fn login(&self, email: &str, candidate: &str) -> Result<User, IdentityError> {
        let email = normalize_email(email);

        let user = match self.users.get_by_email(&email).await {
            Ok(user) => user,
            Err(StoreError::NotFound) => return Err(IdentityError::InvalidCredentials),
            Err(err) => return Err(IdentityError::internal(err, "failed to lookup user")),
        };

        let matches =
            password::verify(&user.password_hash, candidate).map_err(IdentityError::Internal)?;
        if !matches {
            return Err(IdentityError::InvalidCredentials);
        }

        if !user.activated {
            return Err(IdentityError::NotActivated);
        }

        Ok(user)
    }

    /// Redeem an activation token: mark the user activated and burn every
    /// activation token they hold.
    ///
    /// # Errors
    /// `Validation` for a malformed or unredeemable token, `EditConflict`
    /// when a concurrent writer got to the user row first.
    pub async fn activate(&self, token_plaintext: &str) -> Result<User, IdentityError> {
        let token_plaintext = token_plaintext.trim();
        if let Some(err) = validate_token_format(token_plaintext) {
            return Err(err);
        }

        let mut user = match self
            .tokens
            .find_user_by_token(TokenScope::Activation, token_plaintext)
            .await
        {
            Ok(user) => user,
            Err(StoreError::NotFound) => {
                return Err(IdentityError::field(
                    "token",
                    "invalid or expired activation token",
                ))
            }
            Err(err) => return Err(IdentityError::internal(err, "failed to lookup token")),
        };

        user.activated = true;
        let user = match self.users.update(&user).await {
            Ok(user) => user,
            Err(StoreError::EditConflict) => return Err(IdentityError::EditConflict),
            Err(err) => return Err(IdentityError::internal(err, "failed to activate user")),
        };

        self.tokens
            .delete_all_for_user(TokenScope::Activation, user.id)
            .await
            .map_err(|err| IdentityError::internal(err, "failed to delete activation tokens"))?;

        Ok(user)
    }

    /// Issue a password-reset token and email it.
    ///
    /// Unknown and not-yet-activated emails surface as field-level
    /// validation errors, unlike login's generic outcome. That asymmetry
    /// is deliberate and inherited; see DESIGN.md.
    ///
    /// # Errors
    /// `Validation` for bad/unknown/unactivated email, `Internal` for
    /// store failures.
    pub async fn request_password_reset(&self, email: &str) -> Result<(), IdentityError> {
        let email = normalize_email(email);
        if !valid_email(&email) {
            return Err(IdentityError::field("email", "invalid email"));
        }

        let user = match self.users.get_by_email(&email).await {
            Ok(user) => user,
            Err(StoreError::NotFound) => {
                return Err(IdentityError::field("email", "no matching email found"))
            }
            Err(err) => return Err(IdentityError::internal(err, "failed to lookup user")),
        };

        if !user.activated {
            return Err(IdentityError::field("email", "an account must be activated"));
        }

        let token = self
            .tokens
            .create(user.id, PASSWORD_RESET_TOKEN_TTL, TokenScope::PasswordReset)
            .await
            .map_err(|err| IdentityError::internal(err, "failed to issue password reset token"))?;

        self.dispatch_mail(
            user.email,
            "password_reset.tmpl",
            json!({
                "passwordResetToken": token.plaintext,
            }),
        );

        Ok(())
    }

    /// Redeem a password-reset token and set the new password, burning
    /// every reset token the user holds, including siblings from earlier
    /// reset emails that were never submitted.
    ///
    /// # Errors
    /// `Validation` for malformed input or an unredeemable token,
    /// `EditConflict` on a concurrent user update.
    pub async fn confirm_password_reset(
        &self,
        token_plaintext: &str,
        new_password: &str,
    ) -> Result<(), IdentityError> {
        let token_plaintext = token_plaintext.trim();
        let mut errors = BTreeMap::new();
        if let Some(IdentityError::Validation(token_errors)) = validate_token_format(token_plaintext)
        {
            errors.extend(token_errors);
        }
        if new_password.chars().count() < PASSWORD_MIN_LENGTH {
            errors.insert(
                "password".to_string(),
                format!("password must be at least {PASSWORD_MIN_LENGTH} characters"),
            );
        }
        if !errors.is_empty() {
            return Err(IdentityError::Validation(errors));
        }

        let mut user = match self
            .tokens
            .find_user_by_token(TokenScope::PasswordReset, token_plaintext)
            .await
        {
            Ok(user) => user,
            Err(StoreError::NotFound) => {
                return Err(IdentityError::field("token", "invalid or expired token"))
            }
            Err(err) => return Err(IdentityError::internal(err, "failed to lookup token")),
        };

        user.password_hash = password::hash(new_password).map_err(IdentityError::Internal)?;
        let user = match self.users.update(&user).await {
            Ok(user) => user,
            Err(StoreError::EditConflict) => return Err(IdentityError::EditConflict),
            Err(err) => return Err(IdentityError::internal(err, "failed to update password")),
        };

        self.tokens
            .delete_all_for_user(TokenScope::PasswordReset, user.id)
            .await
            .map_err(|err| IdentityError::internal(err, "failed to delete reset tokens"))?;

        Ok(())
    }

    /// Resolve the user behind a verified session.
    ///
    /// # Errors
    /// `NotFound` when the row no longer exists.
    pub async fn current_user(&self, user_id: Uuid) -> Result<User, IdentityError> {
        match self.users.get_by_id(user_id).await {
            Ok(user) => Ok(user),
            Err(StoreError::NotFound) => Err(IdentityError::NotFound),
            Err(err) => Err(IdentityError::internal(err, "failed to lookup user")),
        }
    }

    /// Hand a message to the mailer on a detached task. The task outlives
    /// the HTTP response; a panic or error inside it is contained by the
    /// task boundary and logged, never surfaced to the client.
    fn dispatch_mail(&self, to: String, template: &'static str, payload: serde_json::Value) {
        let mailer = Arc::clone(&self.mailer);
        tokio::spawn(async move {
            if let Err(err) = mailer.send(&to, template, &payload).await {
                error!("failed to send {template} email: {err}");
            }
        });
    }
}

fn validate_token_format(token_plaintext: &str) -> Option<IdentityError> {
    if token_plaintext.is_empty() {
        return Some(IdentityError::field("token", "must be provided"));
    }
    if !valid_plaintext(token_plaintext) {
        return Some(IdentityError::field(
            "token",
            &format!("must be {TOKEN_PLAINTEXT_LENGTH} bytes long"),
        ));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mailer::recording::RecordingMailer;
    use crate::store::memory::{MemoryTokenStore, MemoryUserStore};

    struct Harness {
        service: IdentityService,
        users: Arc<MemoryUserStore>,
        tokens: Arc<MemoryTokenStore>,
        mailer: Arc<RecordingMailer>,
    }

    fn harness() -> Harness {
        let users = MemoryUserStore::new();
        let tokens = MemoryTokenStore::new(Arc::clone(&users));
        let mailer = RecordingMailer::new();
        let service = IdentityService::new(
            Arc::clone(&users) as Arc<dyn UserStore>,
            Arc::clone(&tokens) as Arc<dyn TokenStore>,
            Arc::clone(&mailer) as Arc<dyn Mailer>,
        );
        Harness {
            service,
            users,
            tokens,
            mailer,
        }
    }

    fn register_input(email: &str) -> RegisterInput {
        RegisterInput {
            first_name: "Alice".to_string(),
            last_name: "Walker".to_string(),
            email: email.to_string(),
            password: "longpass".to_string(),
        }
    }

    async fn activation_token(harness: &Harness) -> String {
        let sent = harness.mailer.wait_for(1).await;
        sent.last().expect("welcome mail").payload["activationToken"]
            .as_str()
            .expect("token in payload")
            .to_string()
    }

    #[tokio::test]
    async fn register_creates_unactivated_user_and_emails_token() {
        let h = harness();
        let user = h
            .service
            .register(register_input("a@b.com"))
            .await
            .expect("register");

        assert!(!user.activated);
        assert_eq!(user.email, "a@b.com");

        let sent = h.mailer.wait_for(1).await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "a@b.com");
        assert_eq!(sent[0].template, "user_welcome.tmpl");
        let token = sent[0].payload["activationToken"].as_str().expect("token");
        assert_eq!(token.len(), TOKEN_PLAINTEXT_LENGTH);
        assert_eq!(
            h.tokens.count_for_user(TokenScope::Activation, user.id).await,
            1
        );
    }

    #[tokio::test]
    async fn register_normalizes_email() {
        let h = harness();
        let user = h
            .service
            .register(register_input(" Alice@Example.COM "))
            .await
            .expect("register");
        assert_eq!(user.email, "alice@example.com");
    }

    #[tokio::test]
    async fn register_rejects_short_password_without_creating_user() {
        let h = harness();
        let mut input = register_input("a@b.com");
        input.password = "short".to_string();

        match h.service.register(input).await {
            Err(IdentityError::Validation(errors)) => assert!(errors.contains_key("password")),
            other => panic!("expected validation error, got {other:?}"),
        }
        assert!(matches!(
            h.users.get_by_email("a@b.com").await,
            Err(StoreError::NotFound)
        ));
    }

    #[tokio::test]
    async fn register_rejects_duplicate_email() {
        let h = harness();
        h.service
            .register(register_input("a@b.com"))
            .await
            .expect("first register");

        assert!(matches!(
            h.service.register(register_input("a@b.com")).await,
            Err(IdentityError::DuplicateEmail)
        ));
    }

    #[tokio::test]
    async fn login_before_activation_is_rejected_distinctly() {
        let h = harness();
        h.service
            .register(register_input("a@b.com"))
            .await
            .expect("register");

        assert!(matches!(
            h.service.login("a@b.com", "longpass").await,
            Err(IdentityError::NotActivated)
        ));
    }

    #[tokio::test]
    async fn login_missing_email_and_wrong_password_are_indistinguishable() {
        let h = harness();
        h.service
            .register(register_input("a@b.com"))
            .await
            .expect("register");

        let missing = h.service.login("nobody@b.com", "longpass").await;
        let wrong = h.service.login("a@b.com", "wrongpass").await;

        assert!(matches!(missing, Err(IdentityError::InvalidCredentials)));
        assert!(matches!(wrong, Err(IdentityError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn full_activation_flow_then_login() {
        let h = harness();
        let registered = h
            .service
            .register(register_input("a@b.com"))
            .await
            .expect("register");
        let token = activation_token(&h).await;

        let activated = h.service.activate(&token).await.expect("activate");
        assert!(activated.activated);
        assert_eq!(activated.id, registered.id);

        let user = h.service.login("a@b.com", "longpass").await.expect("login");
        assert_eq!(user.id, registered.id);
    }

    #[tokio::test]
    async fn activation_token_is_single_use() {
        let h = harness();
        h.service
            .register(register_input("a@b.com"))
            .await
            .expect("register");
        let token = activation_token(&h).await;

        h.service.activate(&token).await.expect("first activation");

        match h.service.activate(&token).await {
            Err(IdentityError::Validation(errors)) => assert!(errors.contains_key("token")),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn activate_rejects_malformed_token_before_lookup() {
        let h = harness();
        for bad in ["", "too-short", &"A".repeat(27)] {
            match h.service.activate(bad).await {
                Err(IdentityError::Validation(errors)) => assert!(errors.contains_key("token")),
                other => panic!("expected validation error for {bad:?}, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn activate_rejects_token_of_wrong_scope() {
        let h = harness();
        let user = h
            .service
            .register(register_input("a@b.com"))
            .await
            .expect("register");

        let reset_token = h
            .tokens
            .create(user.id, PASSWORD_RESET_TOKEN_TTL, TokenScope::PasswordReset)
            .await
            .expect("mint reset token");

        assert!(matches!(
            h.service.activate(&reset_token.plaintext).await,
            Err(IdentityError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn expired_token_is_indistinguishable_from_a_wrong_one() {
        let h = harness();
        let user = h
            .service
            .register(register_input("a@b.com"))
            .await
            .expect("register");

        // Zero ttl: expired the instant it was minted.
        let expired = h
            .tokens
            .create(user.id, Duration::from_secs(0), TokenScope::Activation)
            .await
            .expect("mint expired token");

        match h.service.activate(&expired.plaintext).await {
            Err(IdentityError::Validation(errors)) => assert!(errors.contains_key("token")),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn reset_request_for_unknown_email_is_a_validation_error() {
        let h = harness();
        match h.service.request_password_reset("nobody@b.com").await {
            Err(IdentityError::Validation(errors)) => {
                assert_eq!(errors.get("email").map(String::as_str), Some("no matching email found"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn reset_request_requires_activated_account() {
        let h = harness();
        h.service
            .register(register_input("a@b.com"))
            .await
            .expect("register");

        match h.service.request_password_reset("a@b.com").await {
            Err(IdentityError::Validation(errors)) => {
                assert_eq!(
                    errors.get("email").map(String::as_str),
                    Some("an account must be activated")
                );
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn reset_confirm_rotates_password_and_burns_token() {
        let h = harness();
        h.service
            .register(register_input("a@b.com"))
            .await
            .expect("register");
        let activation = activation_token(&h).await;
        h.service.activate(&activation).await.expect("activate");

        h.service
            .request_password_reset("a@b.com")
            .await
            .expect("request reset");
        let sent = h.mailer.wait_for(2).await;
        let reset_token = sent
            .last()
            .expect("reset mail")
            .payload["passwordResetToken"]
            .as_str()
            .expect("token")
            .to_string();

        h.service
            .confirm_password_reset(&reset_token, "newpassword")
            .await
            .expect("confirm reset");

        // Old password dead, new one live.
        assert!(matches!(
            h.service.login("a@b.com", "longpass").await,
            Err(IdentityError::InvalidCredentials)
        ));
        h.service
            .login("a@b.com", "newpassword")
            .await
            .expect("login with new password");

        // Replaying the consumed token fails.
        assert!(matches!(
            h.service
                .confirm_password_reset(&reset_token, "another-password")
                .await,
            Err(IdentityError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn reset_confirm_invalidates_sibling_tokens() {
        let h = harness();
        let user = h
            .service
            .register(register_input("a@b.com"))
            .await
            .expect("register");
        let activation = activation_token(&h).await;
        h.service.activate(&activation).await.expect("activate");

        let first = h
            .tokens
            .create(user.id, PASSWORD_RESET_TOKEN_TTL, TokenScope::PasswordReset)
            .await
            .expect("first reset token");
        let second = h
            .tokens
            .create(user.id, PASSWORD_RESET_TOKEN_TTL, TokenScope::PasswordReset)
            .await
            .expect("second reset token");

        h.service
            .confirm_password_reset(&second.plaintext, "newpassword")
            .await
            .expect("confirm with second token");

        // The never-submitted sibling died with the consumed one.
        assert!(matches!(
            h.service
                .confirm_password_reset(&first.plaintext, "other-password")
                .await,
            Err(IdentityError::Validation(_))
        ));
        assert_eq!(
            h.tokens
                .count_for_user(TokenScope::PasswordReset, user.id)
                .await,
            0
        );
    }

    #[tokio::test]
    async fn reset_confirm_validates_password_and_token_together() {
        let h = harness();
        match h.service.confirm_password_reset("bad", "x").await {
            Err(IdentityError::Validation(errors)) => {
                assert!(errors.contains_key("token"));
                assert!(errors.contains_key("password"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn concurrent_updates_from_same_read_state_conflict() {
        let h = harness();
        let user = h
            .service
            .register(register_input("a@b.com"))
            .await
            .expect("register");

        let stored = h.users.get_by_id(user.id).await.expect("read");

        let mut first = stored.clone();
        first.first_name = "First".to_string();
        let mut second = stored.clone();
        second.first_name = "Second".to_string();

        let winner = h.users.update(&first).await.expect("first update wins");
        assert!(matches!(
            h.users.update(&second).await,
            Err(StoreError::EditConflict)
        ));

        let final_state = h.users.get_by_id(user.id).await.expect("read back");
        assert_eq!(final_state.first_name, "First");
        assert_eq!(final_state.version, winner.version);
    }

    #[tokio::test]
    async fn current_user_maps_missing_row_to_not_found() {
        let h = harness();
        assert!(matches!(
            h.service.current_user(Uuid::new_v4()).await,
            Err(IdentityError::NotFound)
        ));
    }
}
