use crate::api::AppInfo;
use crate::GIT_COMMIT_HASH;
use axum::{
    extract::Extension,
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct Health {
    status: String,
    environment: String,
    version: String,
}

#[utoipa::path(
    get,
    path = "/v1/health",
    responses(
        (status = 200, description = "Service is available", body = Health)
    ),
    tag = "health"
)]
pub async fn health(info: Extension<Arc<AppInfo>>) -> impl IntoResponse {
    let health = Health {
        status: "available".to_string(),
        environment: info.environment.clone(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    };

    let short_hash = if GIT_COMMIT_HASH.len() > 7 {
        &GIT_COMMIT_HASH[0..7]
    } else {
        GIT_COMMIT_HASH
    };

    let mut headers = HeaderMap::new();
    match format!("{}:{}:{}", env!("CARGO_PKG_NAME"), health.version, short_hash)
        .parse::<HeaderValue>()
    {
        Ok(value) => {
            headers.insert("X-App", value);
        }
        Err(err) => {
            error!("Failed to parse X-App header: {}", err);
        }
    }

    (StatusCode::OK, headers, Json(health))
}
