//! In-memory store fakes for workflow and handler tests.
//!
//! Same contracts as the Postgres implementations, including duplicate
//! detection, version-checked updates, and expiry-bounded token lookup.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{StoreError, TokenStore, UserStore};
use crate::domain::{NewUser, Token, TokenScope, User};

#[derive(Default)]
pub struct MemoryUserStore {
    users: Mutex<HashMap<Uuid, User>>,
}

impl MemoryUserStore {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn get_by_email(&self, email: &str) -> Result<User, StoreError> {
        let users = self.users.lock().await;
        users
            .values()
            .find(|user| user.email == email)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn get_by_id(&self, id: Uuid) -> Result<User, StoreError> {
        let users = self.users.lock().await;
        users.get(&id).cloned().ok_or(StoreError::NotFound)
    }

    async fn create(&self, new_user: NewUser) -> Result<User, StoreError> {
        let mut users = self.users.lock().await;
        if users.values().any(|user| user.email == new_user.email) {
            return Err(StoreError::DuplicateEmail);
        }
        let user = User {
            id: Uuid::new_v4(),
            first_name: new_user.first_name,
            last_name: new_user.last_name,
            email: new_user.email,
            password_hash: new_user.password_hash,
            activated: false,
            version: 1,
            created_at: Utc::now(),
        };
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn update(&self, user: &User) -> Result<User, StoreError> {
        let mut users = self.users.lock().await;
        let current = users.get_mut(&user.id).ok_or(StoreError::EditConflict)?;
        if current.version != user.version {
            return Err(StoreError::EditConflict);
        }
        let mut updated = user.clone();
        updated.version += 1;
        *current = updated.clone();
        Ok(updated)
    }
}

struct TokenRow {
    hash: Vec<u8>,
    user_id: Uuid,
    expiry: chrono::DateTime<Utc>,
    scope: TokenScope,
}

pub struct MemoryTokenStore {
    rows: Mutex<Vec<TokenRow>>,
    users: Arc<MemoryUserStore>,
}

impl MemoryTokenStore {
    #[must_use]
    pub fn new(users: Arc<MemoryUserStore>) -> Arc<Self> {
        Arc::new(Self {
            rows: Mutex::new(Vec::new()),
            users,
        })
    }

    pub async fn count_for_user(&self, scope: TokenScope, user_id: Uuid) -> usize {
        let rows = self.rows.lock().await;
        rows.iter()
            .filter(|row| row.scope == scope && row.user_id == user_id)
            .count()
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn create(
        &self,
        user_id: Uuid,
        ttl: Duration,
        scope: TokenScope,
    ) -> Result<Token, StoreError> {
        let token = Token::generate(user_id, ttl, scope)
            .map_err(|err| StoreError::Database(err.context("failed to mint token")))?;
        let mut rows = self.rows.lock().await;
        rows.push(TokenRow {
            hash: token.hash.clone(),
            user_id,
            expiry: token.expiry,
            scope,
        });
        Ok(token)
    }

    async fn find_user_by_token(
        &self,
        scope: TokenScope,
        plaintext: &str,
    ) -> Result<User, StoreError> {
        let token_hash = crate::domain::token::hash_token(plaintext);
        let now = Utc::now();
        let user_id = {
            let rows = self.rows.lock().await;
            rows.iter()
                .find(|row| row.hash == token_hash && row.scope == scope && row.expiry > now)
                .map(|row| row.user_id)
                .ok_or(StoreError::NotFound)?
        };
        self.users.get_by_id(user_id).await
    }

    async fn delete_all_for_user(
        &self,
        scope: TokenScope,
        user_id: Uuid,
    ) -> Result<(), StoreError> {
        let mut rows = self.rows.lock().await;
        rows.retain(|row| !(row.scope == scope && row.user_id == user_id));
        Ok(())
    }
}
