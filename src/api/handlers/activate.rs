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
pub struct ActivateRequest {
    pub token: String,
}

#[utoipa::path(
    put,
    path = "/v1/user/activate",
    request_body = ActivateRequest,
    responses(
        (status = 200, description = "Account activated", body = UserResponse),
        (status = 409, description = "Edit conflict", body = String),
        (status = 422, description = "Invalid or expired token", body = String)
    ),
    tag = "users"
)]
pub async fn activate(
    service: Extension<Arc<IdentityService>>,
    sessions: Extension<Arc<SessionKeys>>,
    payload: Option<Json<ActivateRequest>>,
) -> impl IntoResponse {
    let request: ActivateRequest = match payload {
        Some(Json(payload)) => payload,
        None => return missing_payload(),
    };

    match service.activate(&request.token).await {
        Ok(user) => {
            let body = response::data(StatusCode::OK, &UserResponse::from(&user));
            attach_session_cookie(&sessions, &user, body)
        }
        Err(err) => response::identity_error(err),
    }
}
