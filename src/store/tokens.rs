//! Token store: mint, redeem-lookup, and post-use sweep.

use async_trait::async_trait;
use sqlx::PgPool;
use std::time::Duration;
use tracing::{info_span, Instrument};
use uuid::Uuid;

use super::users::user_from_row;
use super::{map_db_error, with_timeout, StoreError};
use crate::domain::token::hash_token;
use crate::domain::{Token, TokenScope, User};

/// Capability interface over token persistence.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Mint a token and persist its digest/owner/scope/expiry tuple. The
    /// returned [`Token`] is the only copy of the plaintext that will
    /// ever exist.
    async fn create(
        &self,
        user_id: Uuid,
        ttl: Duration,
        scope: TokenScope,
    ) -> Result<Token, StoreError>;

    /// Resolve a plaintext token to its owning user. Wrong token, wrong
    /// scope, and expired all collapse into [`StoreError::NotFound`]; the
    /// caller cannot tell them apart.
    async fn find_user_by_token(
        &self,
        scope: TokenScope,
        plaintext: &str,
    ) -> Result<User, StoreError>;

    /// Remove every token of `scope` for `user_id`. Idempotent: deleting
    /// zero rows is success.
    async fn delete_all_for_user(&self, scope: TokenScope, user_id: Uuid)
        -> Result<(), StoreError>;
}

pub struct PgTokenStore {
    pool: PgPool,
}

impl PgTokenStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TokenStore for PgTokenStore {
    async fn create(
        &self,
        user_id: Uuid,
        ttl: Duration,
        scope: TokenScope,
    ) -> Result<Token, StoreError> {
        let token = Token::generate(user_id, ttl, scope)
            .map_err(|err| StoreError::Database(err.context("failed to mint token")))?;

        let query = r"
            INSERT INTO tokens (hash, user_id, expiry, scope)
            VALUES ($1, $2, $3, $4)
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        with_timeout("tokens.create", async {
            sqlx::query(query)
                .bind(&token.hash)
                .bind(token.user_id)
                .bind(token.expiry)
                .bind(scope.as_str())
                .execute(&self.pool)
                .instrument(span)
                .await
                .map_err(|err| map_db_error(err, "failed to insert token"))?;

            Ok(token)
        })
        .await
    }

    async fn find_user_by_token(
        &self,
        scope: TokenScope,
        plaintext: &str,
    ) -> Result<User, StoreError> {
        // Recompute the digest and match on digest+scope+expiry in one
        // query; the plaintext itself never reaches the database.
        let token_hash = hash_token(plaintext);

        let query = r"
            SELECT users.id, users.created_at, users.first_name, users.last_name,
                   users.email, users.password_hash, users.activated, users.version
            FROM users
            INNER JOIN tokens ON users.id = tokens.user_id
            WHERE tokens.hash = $1
              AND tokens.scope = $2
              AND tokens.expiry > NOW()
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        with_timeout("tokens.find_user_by_token", async {
            let row = sqlx::query(query)
                .bind(&token_hash)
                .bind(scope.as_str())
                .fetch_optional(&self.pool)
                .instrument(span)
                .await
                .map_err(|err| map_db_error(err, "failed to lookup user by token"))?;

            row.map(|row| user_from_row(&row)).ok_or(StoreError::NotFound)
        })
        .await
    }

    async fn delete_all_for_user(
        &self,
        scope: TokenScope,
        user_id: Uuid,
    ) -> Result<(), StoreError> {
        let query = r"
            DELETE FROM tokens
            WHERE scope = $1 AND user_id = $2
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        with_timeout("tokens.delete_all_for_user", async {
            sqlx::query(query)
                .bind(scope.as_str())
                .bind(user_id)
                .execute(&self.pool)
                .instrument(span)
                .await
                .map_err(|err| map_db_error(err, "failed to delete tokens"))?;

            Ok(())
        })
        .await
    }
}
