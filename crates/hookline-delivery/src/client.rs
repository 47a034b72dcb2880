//! HTTP client for webhook delivery with bounded timeouts.
//!
//! Handles request construction with signed headers, response processing,
//! and transport-error classification. Any HTTP response, success or not,
//! is an outcome; only transport failures surface as errors.

use std::time::Duration;

use bytes::Bytes;
use hookline_core::{DeliveryId, RESPONSE_EXCERPT_LIMIT};
use hookline_signing::{OutgoingHeaders, API_KEY_HEADER, SIGNATURE_HEADER, TIMESTAMP_HEADER};
use tracing::{info_span, Instrument};

use crate::error::{DeliveryError, Result};

/// Configuration for the webhook delivery client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Timeout for each HTTP request.
    pub timeout: Duration,
    /// User agent string for requests.
    pub user_agent: String,
    /// Maximum number of redirects to follow.
    pub max_redirects: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(crate::DEFAULT_TIMEOUT_SECONDS),
            user_agent: "Hookline-Webhook-Delivery/1.0".to_string(),
            max_redirects: 3,
        }
    }
}

/// Outcome of an HTTP delivery attempt that produced a response.
#[derive(Debug, Clone)]
pub struct HttpOutcome {
    /// HTTP status code.
    pub status: u16,
    /// Response body truncated to [`RESPONSE_EXCERPT_LIMIT`] bytes.
    pub body_excerpt: String,
    /// Whether the status was 2xx.
    pub is_success: bool,
    /// Total duration of the request.
    pub duration: Duration,
}

/// HTTP client optimized for webhook delivery.
///
/// Uses connection pooling and per-request timeouts so one slow destination
/// cannot stall the pipeline. Every outbound call carries the signed header
/// set; the request body is the exact byte sequence that was signed.
#[derive(Debug, Clone)]
pub struct DeliveryClient {
    client: reqwest::Client,
    config: ClientConfig,
}

impl DeliveryClient {
    /// Creates a new delivery client with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns `DeliveryError::Configuration` if the HTTP client cannot be
    /// built with the provided settings.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects as usize))
            .build()
            .map_err(|e| {
                DeliveryError::configuration(format!("failed to build HTTP client: {e}"))
            })?;

        Ok(Self { client, config })
    }

    /// Creates a new delivery client with default configuration.
    pub fn with_defaults() -> Result<Self> {
        Self::new(ClientConfig::default())
    }

    /// POSTs a signed payload to a destination endpoint.
    ///
    /// # Errors
    ///
    /// Returns `DeliveryError::Timeout` when the request exceeds the
    /// configured timeout and `DeliveryError::Network` for every other
    /// transport failure. Non-2xx responses are not errors; classification
    /// of the status code is the dispatcher's concern.
    pub async fn post_signed(
        &self,
        url: &str,
        payload: Bytes,
        headers: &OutgoingHeaders,
        delivery_id: DeliveryId,
        attempt: u32,
    ) -> Result<HttpOutcome> {
        let span = info_span!(
            "webhook_delivery",
            delivery_id = %delivery_id,
            url = %url,
            attempt,
        );

        async move {
            let start = std::time::Instant::now();
            tracing::debug!(payload_bytes = payload.len(), "starting webhook delivery");

            let response = self
                .client
                .post(url)
                .header("content-type", "application/json")
                .header(SIGNATURE_HEADER, &headers.signature)
                .header(API_KEY_HEADER, &headers.api_key)
                .header(TIMESTAMP_HEADER, headers.timestamp.to_string())
                .body(payload)
                .send()
                .await;

            let response = match response {
                Ok(response) => response,
                Err(e) => {
                    tracing::warn!(
                        duration_ms = start.elapsed().as_millis(),
                        "request failed: {e}"
                    );
                    if e.is_timeout() {
                        return Err(DeliveryError::timeout(self.config.timeout.as_secs()));
                    }
                    if e.is_connect() {
                        return Err(DeliveryError::network(format!("connection failed: {e}")));
                    }
                    return Err(DeliveryError::network(e.to_string()));
                },
            };

            let status = response.status().as_u16();
            let is_success = response.status().is_success();
            let body_excerpt = match response.bytes().await {
                Ok(bytes) => truncate_excerpt(&bytes, RESPONSE_EXCERPT_LIMIT),
                Err(e) => {
                    tracing::warn!("failed to read response body: {e}");
                    format!("[failed to read response body: {e}]")
                },
            };
            let duration = start.elapsed();

            tracing::debug!(status, duration_ms = duration.as_millis(), "received response");

            Ok(HttpOutcome { status, body_excerpt, is_success, duration })
        }
        .instrument(span)
        .await
    }
}

/// Truncates a response body to `limit` bytes for audit storage.
pub fn truncate_excerpt(bytes: &[u8], limit: usize) -> String {
    const SUFFIX: &str = "... (truncated)";

    if bytes.len() <= limit {
        return String::from_utf8_lossy(bytes).into_owned();
    }

    let budget = limit.saturating_sub(SUFFIX.len());
    let truncated = String::from_utf8_lossy(&bytes[..budget]);
    format!("{truncated}{SUFFIX}")
}
