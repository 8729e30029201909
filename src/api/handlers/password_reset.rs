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
pub struct PasswordResetRequest {
    pub email: String,
}

#[utoipa::path(
    post,
    path = "/v1/user/password-reset",
    request_body = PasswordResetRequest,
    responses(
        (status = 202, description = "Reset email accepted for delivery", body = String),
        (status = 422, description = "Unknown or unactivated email", body = String)
    ),
    tag = "users"
)]
pub async fn password_reset(
    service: Extension<Arc<IdentityService>>,
    payload: Option<Json<PasswordResetRequest>>,
) -> impl IntoResponse {
    let request: PasswordResetRequest = match payload {
        Some(Json(payload)) => payload,
        None => return missing_payload(),
    };

    match service.request_password_reset(&request.email).await {
        Ok(()) => response::data(
            StatusCode::ACCEPTED,
            &json!({
                "success": true,
                "message": "an email will be sent to you containing password reset instructions",
            }),
        ),
        Err(err) => response::identity_error(err),
    }
}
