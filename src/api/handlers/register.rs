use axum::{
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use super::{attach_session_cookie, missing_payload};
use crate::api::response;
use crate::domain::UserResponse;
use crate::service::{IdentityService, RegisterInput};
use crate::session::SessionKeys;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct RegisterRequest {
    #[serde(rename = "firstName")]
    pub first_name: String,
    #[serde(rename = "lastName")]
    pub last_name: String,
    pub email: String,
    pub password: String,
}

#[utoipa::path(
    post,
    path = "/v1/register",
    request_body = RegisterRequest,
    responses(
        (status = 202, description = "Registration accepted, activation pending", body = UserResponse),
        (status = 400, description = "Missing payload or duplicate email", body = String),
        (status = 422, description = "Validation error", body = String)
    ),
    tag = "users"
)]
pub async fn register(
    service: Extension<Arc<IdentityService>>,
    sessions: Extension<Arc<SessionKeys>>,
    payload: Option<Json<RegisterRequest>>,
) -> impl IntoResponse {
    let request: RegisterRequest = match payload {
        Some(Json(payload)) => payload,
        None => return missing_payload(),
    };

    match service
        .register(RegisterInput {
            first_name: request.first_name,
            last_name: request.last_name,
            email: request.email,
            password: request.password,
        })
        .await
    {
        Ok(user) => {
            // 202: the account exists but stays unusable until the emailed
            // activation token is redeemed.
            let body = response::data(StatusCode::ACCEPTED, &UserResponse::from(&user));
            attach_session_cookie(&sessions, &user, body)
        }
        Err(err) => response::identity_error(err),
    }
}
