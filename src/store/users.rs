//! User store: lookup, create, and optimistic-concurrency update.

use async_trait::async_trait;
use sqlx::{PgPool, Row};
use tracing::{info_span, Instrument};
use uuid::Uuid;

use super::{map_db_error, with_timeout, StoreError};
use crate::domain::{NewUser, User};

/// Capability interface over user persistence. One Postgres-backed
/// implementation in production; tests substitute an in-memory fake
/// without touching workflow code.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get_by_email(&self, email: &str) -> Result<User, StoreError>;

    async fn get_by_id(&self, id: Uuid) -> Result<User, StoreError>;

    /// Insert a new, unactivated user. A duplicate email surfaces as
    /// [`StoreError::DuplicateEmail`], detected from the unique
    /// constraint itself rather than a check-then-act pre-read.
    async fn create(&self, new_user: NewUser) -> Result<User, StoreError>;

    /// Conditional update: only succeeds while the row still carries the
    /// version the caller read. A losing writer gets
    /// [`StoreError::EditConflict`] and must not retry automatically.
    async fn update(&self, user: &User) -> Result<User, StoreError>;
}

pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

pub(crate) fn user_from_row(row: &sqlx::postgres::PgRow) -> User {
    User {
        id: row.get("id"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        activated: row.get("activated"),
        version: row.get("version"),
        created_at: row.get("created_at"),
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn get_by_email(&self, email: &str) -> Result<User, StoreError> {
        let query = r"
            SELECT id, created_at, first_name, last_name, email, password_hash, activated, version
            FROM users
            WHERE email = $1
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        with_timeout("users.get_by_email", async {
            let row = sqlx::query(query)
                .bind(email)
                .fetch_optional(&self.pool)
                .instrument(span)
                .await
                .map_err(|err| map_db_error(err, "failed to lookup user by email"))?;

            row.map(|row| user_from_row(&row)).ok_or(StoreError::NotFound)
        })
        .await
    }

    async fn get_by_id(&self, id: Uuid) -> Result<User, StoreError> {
        let query = r"
            SELECT id, created_at, first_name, last_name, email, password_hash, activated, version
            FROM users
            WHERE id = $1
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        with_timeout("users.get_by_id", async {
            let row = sqlx::query(query)
                .bind(id)
                .fetch_optional(&self.pool)
                .instrument(span)
                .await
                .map_err(|err| map_db_error(err, "failed to lookup user by id"))?;

            row.map(|row| user_from_row(&row)).ok_or(StoreError::NotFound)
        })
        .await
    }

    async fn create(&self, new_user: NewUser) -> Result<User, StoreError> {
        let query = r"
            INSERT INTO users (id, first_name, last_name, email, password_hash, activated)
            VALUES ($1, $2, $3, $4, $5, false)
            RETURNING id, created_at, first_name, last_name, email, password_hash, activated, version
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        with_timeout("users.create", async {
            let row = sqlx::query(query)
                .bind(Uuid::new_v4())
                .bind(&new_user.first_name)
                .bind(&new_user.last_name)
                .bind(&new_user.email)
                .bind(&new_user.password_hash)
                .fetch_one(&self.pool)
                .instrument(span)
                .await
                .map_err(|err| map_db_error(err, "failed to insert user"))?;

            Ok(user_from_row(&row))
        })
        .await
    }

    async fn update(&self, user: &User) -> Result<User, StoreError> {
        // The WHERE clause pins the version read by the caller; zero rows
        // means a concurrent writer won and the caller sees EditConflict.
        let query = r"
            UPDATE users
            SET first_name = $1, last_name = $2, email = $3, password_hash = $4,
                activated = $5, version = version + 1
            WHERE id = $6 AND version = $7
            RETURNING id, created_at, first_name, last_name, email, password_hash, activated, version
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        with_timeout("users.update", async {
            let row = sqlx::query(query)
                .bind(&user.first_name)
                .bind(&user.last_name)
                .bind(&user.email)
                .bind(&user.password_hash)
                .bind(user.activated)
                .bind(user.id)
                .bind(user.version)
                .fetch_optional(&self.pool)
                .instrument(span)
                .await
                .map_err(|err| map_db_error(err, "failed to update user"))?;

            row.map(|row| user_from_row(&row))
                .ok_or(StoreError::EditConflict)
        })
        .await
    }
}
