use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use std::sync::Arc;

use crate::api::response;
use crate::domain::UserResponse;
use crate::service::IdentityService;
use crate::session::{extract_session_token, SessionKeys};

#[utoipa::path(
    get,
    path = "/v1/user/me",
    responses(
        (status = 200, description = "The authenticated user", body = UserResponse),
        (status = 401, description = "Unauthenticated", body = String),
        (status = 404, description = "User no longer exists", body = String)
    ),
    tag = "users"
)]
pub async fn me(
    headers: HeaderMap,
    service: Extension<Arc<IdentityService>>,
    sessions: Extension<Arc<SessionKeys>>,
) -> impl IntoResponse {
    // A missing artifact and a bad one get the same answer.
    let Some(artifact) = extract_session_token(&headers) else {
        return response::error_message(
            StatusCode::UNAUTHORIZED,
            response::UNAUTHENTICATED_MESSAGE,
        );
    };

    let claims = match sessions.verify(&artifact) {
        Ok(claims) => claims,
        Err(_) => {
            return response::error_message(
                StatusCode::UNAUTHORIZED,
                response::UNAUTHENTICATED_MESSAGE,
            )
        }
    };

    match service.current_user(claims.sub).await {
        Ok(user) => response::data(StatusCode::OK, &UserResponse::from(&user)),
        Err(err) => response::identity_error(err),
    }
}
