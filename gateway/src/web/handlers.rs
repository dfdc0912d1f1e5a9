//! HTTP endpoint handlers.
//!
//! The webhook handler stays thin: it hands the raw body to [`relay`] and
//! turns the outcome into a response.

use std::sync::Arc;

use axum::{body::Bytes, extract::State, response::IntoResponse, Json};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use tracing::info;

use crate::forward::Forwarder;
use crate::relay::relay;
use crate::routing::RouteTable;
use crate::Config;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub routes: Arc<RouteTable>,
    pub forwarder: Forwarder,
}

impl AppState {
    pub fn new(routes: RouteTable, forwarder: Forwarder) -> Self {
        Self {
            routes: Arc::new(routes),
            forwarder,
        }
    }

    /// Build state from loaded configuration and a shared HTTP client.
    pub fn from_config(config: &Config, client: reqwest::Client) -> Self {
        Self::new(
            config.routes.clone(),
            Forwarder::new(client, config.forward_timeout()),
        )
    }
}

// =============================================================================
// Health Check
// =============================================================================

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub message: &'static str,
    pub timestamp: String,
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        message: "Midtrans Gateway is running",
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    })
}

// =============================================================================
// Midtrans Webhook
// =============================================================================

/// Midtrans notification endpoint.
///
/// The body is taken as raw bytes so the exact payload can be passed on.
pub async fn midtrans_webhook(State(state): State<AppState>, body: Bytes) -> impl IntoResponse {
    info!(body_length = body.len(), "midtrans_webhook_received");

    relay(&state.routes, &state.forwarder, body).await
}
