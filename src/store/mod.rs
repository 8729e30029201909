//! Persistence boundary.
//!
//! Stores own every row they touch; workflows only ever borrow records
//! per-request. All Postgres calls are bounded by [`STORE_TIMEOUT`] so a
//! slow database cannot exhaust request-handling capacity, and every
//! error leaves this module as a typed [`StoreError`] kind; raw
//! `sqlx::Error` values never reach a workflow.

use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::time::timeout;
use tracing::warn;

pub mod tokens;
pub mod users;

#[cfg(test)]
pub mod memory;

pub use tokens::{PgTokenStore, TokenStore};
pub use users::{PgUserStore, UserStore};

/// Upper bound for a single store call.
pub const STORE_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, Error)]
pub enum StoreError {
    /// No matching record. Expected outcome, not a transport failure.
    #[error("record not found")]
    NotFound,
    /// Unique-email constraint violated on create or update.
    #[error("a user with this email address already exists")]
    DuplicateEmail,
    /// Optimistic-concurrency loss: the expected prior row state is gone.
    #[error("unable to update the record due to an edit conflict")]
    EditConflict,
    /// The per-call deadline elapsed. Transient; the caller retries the
    /// whole request, never the store call.
    #[error("store operation timed out")]
    Timeout,
    #[error(transparent)]
    Database(anyhow::Error),
}

/// Run a store future under the per-call deadline.
pub(crate) async fn with_timeout<T, F>(operation: &'static str, fut: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    bounded(STORE_TIMEOUT, operation, fut).await
}

async fn bounded<T, F>(limit: Duration, operation: &'static str, fut: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    match timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => {
            warn!("store operation {operation} exceeded {limit:?}");
            Err(StoreError::Timeout)
        }
    }
}

/// Translate a `sqlx::Error` into the store taxonomy.
pub(crate) fn map_db_error(err: sqlx::Error, context: &'static str) -> StoreError {
    match err {
        sqlx::Error::RowNotFound => StoreError::NotFound,
        err if is_unique_violation(&err) => StoreError::DuplicateEmail,
        err => StoreError::Database(anyhow::Error::new(err).context(context)),
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}
