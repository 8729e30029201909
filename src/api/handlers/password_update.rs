use axum::{
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use utoipa::ToSchema;

use super::missing_payload;
use crate::api::response;
use crate::service::IdentityService;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct PasswordUpdateRequest {
    pub token: String,
    pub password: String,
}

#[utoipa::path(
    put,
    path = "/v1/user/password",
    request_body = PasswordUpdateRequest,
    responses(
        (status = 200, description = "Password reset", body = String),
        (status = 409, description = "Edit conflict", body = String),
        (status = 422, description = "Invalid or expired token", body = String)
    ),
    tag = "users"
)]
pub async fn password_update(
    service: Extension<Arc<IdentityService>>,
    payload: Option<Json<PasswordUpdateRequest>>,
) -> impl IntoResponse {
    let request: PasswordUpdateRequest = match payload {
        Some(Json(payload)) => payload,
        None => return missing_payload(),
    };

    match service
        .confirm_password_reset(&request.token, &request.password)
        .await
    {
        Ok(()) => response::data(
            StatusCode::OK,
            &json!({
                "success": true,
                "message": "password successfully reset",
            }),
        ),
        Err(err) => response::identity_error(err),
    }
}
