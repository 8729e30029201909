use crate::{
    cli::globals::GlobalArgs,
    mailer::{LogMailer, Mailer},
    service::IdentityService,
    session::SessionKeys,
    store::{PgTokenStore, PgUserStore, TokenStore, UserStore},
};
use anyhow::{Context, Result};
use axum::{
    body::Body,
    extract::{Extension, MatchedPath},
    http::{HeaderName, HeaderValue, Request, Response, StatusCode},
    response::IntoResponse,
    routing::{get, post, put},
    Router,
};
use serde_json::json;
use sqlx::postgres::PgPoolOptions;
use std::{any::Any, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer,
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{error, info, info_span, Span};
use ulid::Ulid;

pub mod handlers;
mod openapi;
pub mod response;

pub use openapi::ApiDoc;

/// Request-scoped context for the health handler.
#[derive(Clone, Debug)]
pub struct AppInfo {
    pub environment: String,
}

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(port: u16, dsn: String, globals: &GlobalArgs) -> Result<()> {
    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(&dsn)
        .await
        .context("Failed to connect to database")?;

    if globals.migrate {
        sqlx::migrate!()
            .run(&pool)
            .await
            .context("Failed to run database migrations")?;
        info!("Database migrations applied");
    }

    let users: Arc<dyn UserStore> = Arc::new(PgUserStore::new(pool.clone()));
    let tokens: Arc<dyn TokenStore> = Arc::new(PgTokenStore::new(pool));
    let mailer: Arc<dyn Mailer> = Arc::new(LogMailer::new(&globals.smtp));
    let service = Arc::new(IdentityService::new(users, tokens, mailer));

    // The signing secret is injected here, once; no process-wide codec.
    let sessions = Arc::new(SessionKeys::new(
        &globals.session_secret,
        globals.cookie_secure,
    ));
    let app_info = Arc::new(AppInfo {
        environment: globals.environment.clone(),
    });

    let app = Router::new()
        .route("/v1/health", get(handlers::health))
        .route("/v1/register", post(handlers::register))
        .route("/v1/signin", post(handlers::signin))
        .route("/v1/user/activate", put(handlers::activate))
        .route("/v1/user/password-reset", post(handlers::password_reset))
        .route("/v1/user/password", put(handlers::password_update))
        .route("/v1/user/me", get(handlers::me))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(CatchPanicLayer::custom(handle_panic))
                .layer(Extension(service))
                .layer(Extension(sessions))
                .layer(Extension(app_info)),
        );

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Gracefully shutdown");
        })
        .await?;

    Ok(())
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}

/// Recovery boundary: a panicking handler becomes a generic 500 envelope
/// instead of a dropped connection with a stack trace.
fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response<Body> {
    let detail = if let Some(message) = err.downcast_ref::<String>() {
        message.as_str()
    } else if let Some(message) = err.downcast_ref::<&str>() {
        message
    } else {
        "unknown panic payload"
    };
    error!("request handler panicked: {detail}");

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        axum::Json(json!({ "error": response::INTERNAL_ERROR_MESSAGE })),
    )
        .into_response()
}
