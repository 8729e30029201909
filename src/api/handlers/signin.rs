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
use crate::service::IdentityService;
use crate::session::SessionKeys;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct SigninRequest {
    pub email: String,
    pub password: String,
}

#[utoipa::path(
    post,
    path = "/v1/signin",
    request_body = SigninRequest,
    responses(
        (status = 200, description = "Signed in", body = UserResponse),
        (status = 400, description = "Account not activated", body = String),
        (status = 401, description = "Invalid credentials", body = String)
    ),
    tag = "users"
)]
pub async fn signin(
    service: Extension<Arc<IdentityService>>,
    sessions: Extension<Arc<SessionKeys>>,
    payload: Option<Json<SigninRequest>>,
) -> impl IntoResponse {
    let request: SigninRequest = match payload {
        Some(Json(payload)) => payload,
        None => return missing_payload(),
    };

    match service.login(&request.email, &request.password).await {
        Ok(user) => {
            let body = response::data(StatusCode::OK, &UserResponse::from(&user));
            attach_session_cookie(&sessions, &user, body)
        }
        Err(err) => response::identity_error(err),
    }
}
