//! Relay decision logic.
//!
//! Turns one inbound notification body into a [`RelayOutcome`]: reject it,
//! forward it, or absorb a forwarding failure. The outcome decides the HTTP
//! response returned to the payment provider.

use axum::{
    body::Bytes,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use std::fmt;

use serde::{
    de::{IgnoredAny, MapAccess, Visitor},
    Deserialize, Deserializer, Serialize,
};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::forward::{ForwardError, Forwarder};
use crate::routing::RouteTable;

/// Field used as the routing key.
pub const ORDER_ID_FIELD: &str = "order_id";

/// Validation failures. These are never forwarded.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Invalid JSON payload")]
    InvalidJson(#[source] serde_json::Error),

    #[error("Missing order_id")]
    MissingOrderId,

    #[error("Unknown order_id prefix")]
    UnknownPrefix { order_id: String },
}

/// Result of handling a single notification.
#[derive(Debug)]
pub enum RelayOutcome {
    /// The destination answered, with any status code.
    Forwarded { service: String, status: StatusCode },

    /// The destination could not be reached. Reported to the caller as
    /// accepted so the provider does not retry.
    ForwardFailed { service: String, error: ForwardError },

    Rejected(RelayError),

    InternalError,
}

/// JSON body returned to the payment provider.
#[derive(Debug, Serialize)]
pub struct RelayResponse {
    pub status: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RelayOutcome {
    pub fn status_code(&self) -> StatusCode {
        match self {
            RelayOutcome::Forwarded { .. } | RelayOutcome::ForwardFailed { .. } => StatusCode::OK,
            RelayOutcome::Rejected(_) => StatusCode::BAD_REQUEST,
            RelayOutcome::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn body(&self) -> RelayResponse {
        match self {
            RelayOutcome::Forwarded { .. } => RelayResponse {
                status: "success",
                message: "Notification forwarded successfully".to_string(),
                error: None,
            },
            RelayOutcome::ForwardFailed { error, .. } => RelayResponse {
                status: "accepted",
                message: "Notification received but forwarding failed".to_string(),
                error: Some(error.to_string()),
            },
            RelayOutcome::Rejected(reason) => RelayResponse {
                status: "error",
                message: reason.to_string(),
                error: None,
            },
            RelayOutcome::InternalError => RelayResponse {
                status: "error",
                message: "Internal server error".to_string(),
                error: None,
            },
        }
    }
}

impl IntoResponse for RelayOutcome {
    fn into_response(self) -> Response {
        (self.status_code(), Json(self.body())).into_response()
    }
}

impl From<RelayError> for RelayOutcome {
    fn from(err: RelayError) -> Self {
        RelayOutcome::Rejected(err)
    }
}

/// The routing key of a notification. Every other field is skipped
/// without being interpreted.
struct Envelope {
    order_id: Option<String>,
}

impl<'de> Deserialize<'de> for Envelope {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_map(EnvelopeVisitor)
    }
}

struct EnvelopeVisitor;

impl<'de> Visitor<'de> for EnvelopeVisitor {
    type Value = Envelope;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a JSON object")
    }

    fn visit_map<A>(self, mut map: A) -> Result<Envelope, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut order_id = None;

        // Last occurrence wins on duplicate keys
        while let Some(key) = map.next_key::<String>()? {
            if key == ORDER_ID_FIELD {
                order_id = map.next_value::<Option<String>>()?;
            } else {
                map.next_value::<IgnoredAny>()?;
            }
        }

        Ok(Envelope { order_id })
    }
}

/// Extract a non-empty string `order_id` from a raw notification body.
///
/// A body that is not valid JSON is `InvalidJson`. Valid JSON without a
/// usable `order_id` (absent, empty, not a string, or a non-object root)
/// is `MissingOrderId`.
pub fn extract_order_id(body: &[u8]) -> Result<String, RelayError> {
    match serde_json::from_slice::<Envelope>(body) {
        Ok(Envelope { order_id: Some(id) }) if !id.is_empty() => Ok(id),
        Ok(_) => Err(RelayError::MissingOrderId),
        Err(_) => match serde_json::from_slice::<IgnoredAny>(body) {
            Ok(_) => Err(RelayError::MissingOrderId),
            Err(e) => Err(RelayError::InvalidJson(e)),
        },
    }
}

/// Relay one notification body.
///
/// The raw `body` bytes are what gets forwarded; only the routing key is
/// read from them.
pub async fn relay(routes: &RouteTable, forwarder: &Forwarder, body: Bytes) -> RelayOutcome {
    debug!(payload = %String::from_utf8_lossy(&body), "midtrans_webhook_payload");

    let order_id = match extract_order_id(&body) {
        Ok(id) => id,
        Err(RelayError::InvalidJson(e)) => {
            warn!(error = %e, body_length = body.len(), "midtrans_webhook_invalid_json");
            return RelayError::InvalidJson(e).into();
        }
        Err(e) => {
            warn!("midtrans_webhook_missing_order_id");
            return e.into();
        }
    };

    let Some(route) = routes.resolve(&order_id) else {
        warn!(order_id = %order_id, "midtrans_webhook_unknown_prefix");
        return RelayError::UnknownPrefix { order_id }.into();
    };

    info!(
        order_id = %order_id,
        service = %route.service,
        prefix = %route.prefix,
        "order_routed"
    );

    match forwarder.forward(route, body).await {
        Ok(status) => {
            info!(
                order_id = %order_id,
                service = %route.service,
                status_code = status.as_u16(),
                "notification_forwarded"
            );
            RelayOutcome::Forwarded {
                service: route.service.clone(),
                status,
            }
        }
        Err(e) => {
            error!(
                order_id = %order_id,
                service = %route.service,
                destination = ?route.destination.as_ref().map(|u| u.as_str()),
                error = %e,
                "notification_forward_failed"
            );
            RelayOutcome::ForwardFailed {
                service: route.service.clone(),
                error: e,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn order_id_of(body: &str) -> Option<String> {
        extract_order_id(body.as_bytes()).ok()
    }
    use std::time::Duration;

    use crate::routing::Route;

    fn unconfigured_table() -> RouteTable {
        RouteTable::new(vec![
            Route::new("flxbt", "Flexbit", None),
            Route::new("flx-ott", "OnTheTok", None),
        ])
    }

    fn forwarder() -> Forwarder {
        Forwarder::new(reqwest::Client::new(), Duration::from_secs(1))
    }

    #[test]
    fn test_extract_order_id() {
        assert_eq!(order_id_of(r#"{"order_id": "flxbt-1"}"#).as_deref(), Some("flxbt-1"));
        assert_eq!(order_id_of(r#"{"order_id": "flx\u002dott-2"}"#).as_deref(), Some("flx-ott-2"));
        assert_eq!(order_id_of(r#"{"order_id": ""}"#), None);
        assert_eq!(order_id_of(r#"{"order_id": 42}"#), None);
        assert_eq!(order_id_of(r#"{"order_id": null}"#), None);
        assert_eq!(order_id_of(r#"{"amount": 500}"#), None);
        assert_eq!(order_id_of(r#"["flxbt-1"]"#), None);
        assert_eq!(order_id_of(r#""flxbt-1""#), None);
    }

    #[test]
    fn test_extract_order_id_duplicate_key_last_wins() {
        assert_eq!(
            order_id_of(r#"{"order_id": "zzz-1", "order_id": "flxbt-1"}"#).as_deref(),
            Some("flxbt-1")
        );
    }

    #[test]
    fn test_extract_order_id_ignores_other_fields() {
        // Out of f64 range and past serde_json's recursion limit
        let deep = format!("{}{}", "[".repeat(200), "]".repeat(200));
        let body = format!(r#"{{"x":1e400,"order_id":"flxbt-1","deep":{}}}"#, deep);
        assert_eq!(order_id_of(&body).as_deref(), Some("flxbt-1"));
    }

    #[test]
    fn test_extract_order_id_error_kinds() {
        let missing = [r#"{"order_id": 42}"#, r#"[1, 2]"#, r#"true"#, r#"{"amount":1}"#];
        for body in missing {
            assert!(
                matches!(extract_order_id(body.as_bytes()), Err(RelayError::MissingOrderId)),
                "body: {}",
                body
            );
        }

        let invalid = [r#"{"order_id": 42"#, r#"{"order_id":"flxbt-1",}"#, "", "{} trailing"];
        for body in invalid {
            assert!(
                matches!(extract_order_id(body.as_bytes()), Err(RelayError::InvalidJson(_))),
                "body: {}",
                body
            );
        }
    }

    #[test]
    fn test_outcome_status_codes() {
        assert_eq!(RelayOutcome::Rejected(RelayError::MissingOrderId).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(RelayOutcome::InternalError.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            RelayOutcome::ForwardFailed {
                service: "Flexbit".to_string(),
                error: ForwardError::Timeout(Duration::from_secs(10)),
            }
            .status_code(),
            StatusCode::OK
        );
    }

    #[test]
    fn test_accepted_body_carries_error() {
        let outcome = RelayOutcome::ForwardFailed {
            service: "Flexbit".to_string(),
            error: ForwardError::Timeout(Duration::from_secs(10)),
        };
        let body = serde_json::to_value(outcome.body()).unwrap();
        assert_eq!(
            body,
            json!({
                "status": "accepted",
                "message": "Notification received but forwarding failed",
                "error": "timeout of 10000ms exceeded"
            })
        );
    }

    #[test]
    fn test_success_body_has_no_error_field() {
        let outcome = RelayOutcome::Forwarded {
            service: "Flexbit".to_string(),
            status: StatusCode::OK,
        };
        let body = serde_json::to_value(outcome.body()).unwrap();
        assert_eq!(
            body,
            json!({"status": "success", "message": "Notification forwarded successfully"})
        );
    }

    #[tokio::test]
    async fn test_relay_rejects_invalid_json() {
        let outcome = relay(&unconfigured_table(), &forwarder(), Bytes::from_static(b"{not json")).await;
        assert!(matches!(outcome, RelayOutcome::Rejected(RelayError::InvalidJson(_))));
    }

    #[tokio::test]
    async fn test_relay_rejects_missing_order_id() {
        let outcome = relay(&unconfigured_table(), &forwarder(), Bytes::from_static(br#"{"amount":500}"#)).await;
        assert!(matches!(outcome, RelayOutcome::Rejected(RelayError::MissingOrderId)));
    }

    #[tokio::test]
    async fn test_relay_rejects_unknown_prefix() {
        let outcome = relay(
            &unconfigured_table(),
            &forwarder(),
            Bytes::from_static(br#"{"order_id":"zzz-1"}"#),
        )
        .await;
        match outcome {
            RelayOutcome::Rejected(RelayError::UnknownPrefix { order_id }) => assert_eq!(order_id, "zzz-1"),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_relay_unconfigured_destination_is_absorbed() {
        let outcome = relay(
            &unconfigured_table(),
            &forwarder(),
            Bytes::from_static(br#"{"order_id":"flx-ott-9","status":"settlement"}"#),
        )
        .await;
        match outcome {
            RelayOutcome::ForwardFailed { service, error } => {
                assert_eq!(service, "OnTheTok");
                assert!(matches!(error, ForwardError::NotConfigured { .. }));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }
}
