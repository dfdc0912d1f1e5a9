//! Outbound forwarding of notifications to downstream services.
//!
//! Exactly one attempt is made per notification. Any HTTP response counts as
//! delivered, whatever its status code; only transport failures are errors.

use std::time::Duration;

use axum::body::Bytes;
use reqwest::{header::CONTENT_TYPE, Client, StatusCode};
use thiserror::Error;

use crate::routing::Route;

/// Header identifying the relay to downstream services.
pub const FORWARDED_FROM_HEADER: &str = "X-Forwarded-From";

/// Value of [`FORWARDED_FROM_HEADER`].
pub const FORWARDED_FROM: &str = "midtrans-gateway";

/// Reasons a notification could not reach its destination.
#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("no destination configured for {service}")]
    NotConfigured { service: String },

    #[error("timeout of {}ms exceeded", .0.as_millis())]
    Timeout(Duration),

    #[error("{0}")]
    Request(#[from] reqwest::Error),
}

/// Sends notifications to downstream services with a fixed timeout.
#[derive(Debug, Clone)]
pub struct Forwarder {
    client: Client,
    timeout: Duration,
}

impl Forwarder {
    pub fn new(client: Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    /// POST `body` unchanged to the route's destination.
    ///
    /// Returns the destination's status code, whatever it is.
    pub async fn forward(&self, route: &Route, body: Bytes) -> Result<StatusCode, ForwardError> {
        let Some(url) = route.destination.as_ref() else {
            return Err(ForwardError::NotConfigured {
                service: route.service.clone(),
            });
        };

        tracing::debug!(
            service = %route.service,
            destination = %url,
            body_length = body.len(),
            timeout_ms = self.timeout.as_millis() as u64,
            "forward_starting"
        );

        let response = self
            .client
            .post(url.clone())
            .header(CONTENT_TYPE, "application/json")
            .header(FORWARDED_FROM_HEADER, FORWARDED_FROM)
            .timeout(self.timeout)
            .body(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ForwardError::Timeout(self.timeout)
                } else {
                    ForwardError::Request(e)
                }
            })?;

        Ok(response.status())
    }
}
