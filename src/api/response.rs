//! JSON envelope and error translation.
//!
//! Success bodies are `{"data": ...}` and failures `{"error": ...}`,
//! either a plain message or a field-to-message map for validation
//! problems.
//! This is the single place where workflow errors become HTTP statuses;
//! handlers never inspect store errors directly.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use tracing::error;

use crate::service::IdentityError;

pub const INTERNAL_ERROR_MESSAGE: &str =
    "the server encountered a problem and could not process your request";

pub const UNAUTHENTICATED_MESSAGE: &str = "you must be authenticated to access this resource";

/// Wrap a success payload in the data envelope.
pub fn data<T: Serialize>(status: StatusCode, value: &T) -> Response {
    (status, Json(json!({ "data": value }))).into_response()
}

/// Wrap a failure message in the error envelope.
pub fn error_message(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

/// Translate a workflow error into its response. Internal detail is
/// logged here and never reaches the client.
pub fn identity_error(err: IdentityError) -> Response {
    match err {
        IdentityError::Validation(errors) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "error": errors })),
        )
            .into_response(),
        IdentityError::DuplicateEmail => {
            error_message(StatusCode::BAD_REQUEST, &err.to_string())
        }
        IdentityError::InvalidCredentials => {
            error_message(StatusCode::UNAUTHORIZED, &err.to_string())
        }
        IdentityError::NotActivated => error_message(StatusCode::BAD_REQUEST, &err.to_string()),
        IdentityError::EditConflict => error_message(StatusCode::CONFLICT, &err.to_string()),
        IdentityError::NotFound => error_message(StatusCode::NOT_FOUND, &err.to_string()),
        IdentityError::Internal(detail) => {
            error!("internal error: {detail:#}");
            error_message(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR_MESSAGE)
        }
    }
}
