//! Inbound webhook receiver.
//!
//! Accepts webhooks from the trusted automation partner, validating API
//! key, timestamp freshness, and signature over the raw body before the
//! payload is parsed or processed. Validation failures are terminal for
//! the request and map to `401`; malformed payloads map to `400`.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use hookline_core::{CoreError, EventType};
use hookline_signing::{
    validate_request, RequestAuth, API_KEY_HEADER, SIGNATURE_HEADER, TIMESTAMP_HEADER,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::server::AppState;

/// Processes payloads accepted by the inbound receiver.
///
/// Implemented by the business logic that reacts to partner events. The
/// receiver owns authentication and payload validation; the handler only
/// ever sees verified, well-formed events.
#[async_trait::async_trait]
pub trait ReceivedEventHandler: Send + Sync {
    /// Handles one verified inbound event.
    async fn handle(&self, event: EventType, data: serde_json::Value) -> Result<(), CoreError>;
}

/// Default handler that records accepted events in the log stream.
#[derive(Debug, Default)]
pub struct LoggingEventHandler;

#[async_trait::async_trait]
impl ReceivedEventHandler for LoggingEventHandler {
    async fn handle(&self, event: EventType, _data: serde_json::Value) -> Result<(), CoreError> {
        info!(event = %event, "accepted inbound webhook");
        Ok(())
    }
}

/// Inbound request body.
#[derive(Debug, Deserialize)]
struct ReceivePayload {
    /// Event type, validated against the closed enumeration.
    event: EventType,
    /// Event payload.
    data: serde_json::Value,
}

/// Response for an accepted webhook.
#[derive(Debug, Serialize)]
struct ReceiveResponse {
    received: bool,
    event: EventType,
}

/// Error response body.
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(ErrorBody { error: message.into() })).into_response()
}

/// Accepts a webhook from the automation partner.
///
/// Returns `200` on accepted and processed, `400` for missing or invalid
/// fields, `401` for failed authentication, and `500` when processing
/// fails after acceptance.
pub async fn receive_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let auth = RequestAuth {
        api_key: headers.get(API_KEY_HEADER).and_then(|v| v.to_str().ok()),
        signature: headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok()),
        timestamp: headers.get(TIMESTAMP_HEADER).and_then(|v| v.to_str().ok()),
    };

    if let Err(e) = validate_request(
        &body,
        &auth,
        &state.config.api_key,
        &state.config.shared_secret,
    ) {
        warn!(error = %e, "rejected inbound webhook");
        return error_response(StatusCode::UNAUTHORIZED, e.to_string());
    }

    let payload: ReceivePayload = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                format!("invalid webhook payload: {e}"),
            );
        },
    };

    if !payload.data.is_object() {
        return error_response(StatusCode::BAD_REQUEST, "data must be a JSON object");
    }

    match state.handler.handle(payload.event, payload.data).await {
        Ok(()) => {
            (StatusCode::OK, Json(ReceiveResponse { received: true, event: payload.event }))
                .into_response()
        },
        Err(e) => {
            warn!(error = %e, event = %payload.event, "inbound webhook processing failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "event processing failed")
        },
    }
}

/// Discovery response listing supported event types.
#[derive(Debug, Serialize)]
struct DiscoveryResponse {
    supported_events: Vec<&'static str>,
}

/// Liveness/discovery endpoint for the receiver.
pub async fn receive_discovery() -> Response {
    let supported_events = EventType::ALL.iter().map(|event| event.as_str()).collect();
    (StatusCode::OK, Json(DiscoveryResponse { supported_events })).into_response()
}
