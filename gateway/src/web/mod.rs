//! Web server module.
//!
//! Exposes the Midtrans notification endpoint and a health check. Panics in
//! a handler are caught and reported as a 500 with the relay's error body.

pub mod handlers;

use std::any::Any;

use axum::{
    extract::DefaultBodyLimit,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};
use tracing::error;

use crate::relay::RelayOutcome;

pub use handlers::{health, midtrans_webhook, AppState, HealthResponse};

/// Path the payment provider posts notifications to.
pub const WEBHOOK_PATH: &str = "/webhook/midtrans";

/// Liveness endpoint path.
pub const HEALTH_PATH: &str = "/health";

/// Largest accepted notification body. Larger bodies get axum's plain-text
/// 413 and are not forwarded.
pub const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Build the application router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(HEALTH_PATH, get(health))
        .route(WEBHOOK_PATH, post(midtrans_webhook))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.as_str()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s
    } else {
        "unknown panic"
    };

    error!(panic = %detail, "request_handler_panicked");

    RelayOutcome::InternalError.into_response()
}
