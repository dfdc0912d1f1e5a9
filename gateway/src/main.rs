//! Midtrans Gateway server.
//!
//! Loads configuration, builds the route table and serves the webhook and
//! health endpoints until SIGINT or SIGTERM.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use reqwest::Client;
use tokio::{net::TcpListener, signal};
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use midtrans_gateway::web::{HEALTH_PATH, WEBHOOK_PATH};
use midtrans_gateway::{build_router, AppState, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let dotenv = dotenvy::dotenv();

    // Initialize structured JSON logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true))
        .init();

    info!(dotenv_loaded = dotenv.is_ok(), "gateway_starting");

    // Load configuration
    let config = Config::from_env();
    info!(
        port = config.port,
        forward_timeout_ms = config.forward_timeout_ms,
        "config_loaded"
    );

    for route in config.routes.routes() {
        match &route.destination {
            Some(url) => info!(
                prefix = %route.prefix,
                service = %route.service,
                destination = %url,
                "route_configured"
            ),
            None => warn!(
                prefix = %route.prefix,
                service = %route.service,
                "route_destination_missing"
            ),
        }
    }

    // Create a shared HTTP client for all forwards
    let client = Client::builder()
        .pool_max_idle_per_host(16)
        .build()
        .context("Failed to create HTTP client")?;

    let state = AppState::from_config(&config, client);
    let app = build_router(state);

    // Bind to address
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!(
        address = %addr,
        webhook_path = WEBHOOK_PATH,
        health_path = HEALTH_PATH,
        "gateway_listening"
    );

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("gateway_shutdown_complete");

    Ok(())
}

/// Create a future that completes when a shutdown signal is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "ctrl_c_handler_failed");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "sigterm_handler_failed");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }

    info!("gateway_shutting_down");
}
