pub mod health;
pub use self::health::health;

pub mod register;
pub use self::register::register;

pub mod signin;
pub use self::signin::signin;

pub mod activate;
pub use self::activate::activate;

pub mod password_reset;
pub use self::password_reset::password_reset;

pub mod password_update;
pub use self::password_update::password_update;

pub mod me;
pub use self::me::me;

use axum::http::header::SET_COOKIE;
use axum::response::Response;
use std::sync::Arc;
use tracing::error;

use crate::api::response;
use crate::domain::User;
use crate::session::SessionKeys;

/// Issue session claims for `user` and attach the cookie to `response`.
/// Signing failure fails the whole request; the caller has nothing to
/// authenticate with otherwise.
pub(crate) fn attach_session_cookie(
    sessions: &Arc<SessionKeys>,
    user: &User,
    mut response: Response,
) -> Response {
    let cookie = sessions
        .issue(user.id, &user.email)
        .and_then(|artifact| sessions.session_cookie(&artifact).map_err(Into::into));
    match cookie {
        Ok(value) => {
            response.headers_mut().insert(SET_COOKIE, value);
            response
        }
        Err(err) => {
            error!("failed to issue session: {err}");
            response::error_message(
                axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                response::INTERNAL_ERROR_MESSAGE,
            )
        }
    }
}

/// Shared "no body" response for handlers taking `Option<Json<T>>`.
pub(crate) fn missing_payload() -> Response {
    response::error_message(axum::http::StatusCode::BAD_REQUEST, "missing payload")
}
