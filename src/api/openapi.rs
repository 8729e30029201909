//! OpenAPI description of the REST surface.

use utoipa::OpenApi;

use crate::api::handlers;
use crate::domain::UserResponse;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "identeco",
        description = "User identity and account management",
    ),
    paths(
        handlers::health::health,
        handlers::register::register,
        handlers::signin::signin,
        handlers::activate::activate,
        handlers::password_reset::password_reset,
        handlers::password_update::password_update,
        handlers::me::me,
    ),
    components(schemas(
        UserResponse,
        handlers::health::Health,
        handlers::register::RegisterRequest,
        handlers::signin::SigninRequest,
        handlers::activate::ActivateRequest,
        handlers::password_reset::PasswordResetRequest,
        handlers::password_update::PasswordUpdateRequest,
    )),
    tags(
        (name = "users", description = "Registration, sessions, activation, password reset"),
        (name = "health", description = "Service health")
    )
)]
pub struct ApiDoc;
