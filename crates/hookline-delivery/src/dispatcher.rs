//! Event dispatch: settings resolution, signing, HTTP delivery, audit
//! logging, and retry classification.
//!
//! The dispatcher owns the end-to-end lifecycle of delivering one event
//! once. Failure of the HTTP attempt is absorbed into the delivery log and
//! never surfaced to the business operation that emitted the event; only
//! infrastructure faults (store failures, broken configuration) propagate
//! as errors.

use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use hookline_core::{
    Clock, CoreError, DeliveryId, DeliveryLog, EventType, TenantId, WebhookEvent,
};
use hookline_signing::generate_outgoing_headers_at;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::{
    client::{ClientConfig, DeliveryClient, HttpOutcome},
    error::{DeliveryError, Result},
    retry::RetryPolicy,
    store::{DeliveryLogStore, SettingsProvider},
};

/// Configuration for the dispatcher.
#[derive(Debug, Clone, Default)]
pub struct DispatcherConfig {
    /// HTTP client configuration.
    pub client: ClientConfig,

    /// Backoff policy applied to failed attempts.
    pub retry_policy: RetryPolicy,
}

/// Result of dispatching one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The tenant has no usable subscription for this event type.
    ///
    /// No delivery log entry is created, so tenants who never configured
    /// webhooks do not accumulate log noise.
    NotSubscribed,

    /// The destination acknowledged the delivery with a 2xx response.
    Delivered {
        /// Log entry recording the delivery.
        delivery_id: DeliveryId,
    },

    /// The attempt failed and a retry is scheduled.
    FailedScheduled {
        /// Log entry recording the failure.
        delivery_id: DeliveryId,
        /// When the retry scheduler will pick the entry up.
        next_retry_at: DateTime<Utc>,
    },

    /// The attempt failed and the attempt cap is exhausted. Terminal.
    FailedPermanent {
        /// Log entry recording the terminal failure.
        delivery_id: DeliveryId,
    },
}

/// Wire payload POSTed to destination endpoints.
///
/// Serialized exactly once per event; the resulting bytes are signed,
/// stored in the delivery log, and transmitted, so the signature stays
/// valid for byte-identical retries.
#[derive(Serialize)]
struct WirePayload<'a> {
    event: EventType,
    data: &'a serde_json::Value,
    timestamp: String,
    user_id: TenantId,
}

/// Dispatches webhook events to tenant-configured endpoints.
pub struct Dispatcher {
    settings: Arc<dyn SettingsProvider>,
    store: Arc<dyn DeliveryLogStore>,
    client: DeliveryClient,
    policy: RetryPolicy,
    clock: Arc<dyn Clock>,
}

impl Dispatcher {
    /// Creates a dispatcher over the given settings provider and log store.
    ///
    /// # Errors
    ///
    /// Returns `DeliveryError::Configuration` if the HTTP client cannot be
    /// built.
    pub fn new(
        settings: Arc<dyn SettingsProvider>,
        store: Arc<dyn DeliveryLogStore>,
        config: DispatcherConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let client = DeliveryClient::new(config.client)?;
        Ok(Self { settings, store, client, policy: config.retry_policy, clock })
    }

    /// Returns the retry policy in effect.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Accepts a domain event for fire-and-forget delivery.
    ///
    /// Validates synchronously (the closed event-type enum is proof the
    /// type is known; `data` must be a JSON object because the wire format
    /// embeds it as one) and spawns the actual dispatch onto the runtime.
    /// Returns `Ok(true)` once the event is accepted; delivery failures are
    /// absorbed into the audit log and never reach the caller.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidInput` when `data` is not a JSON object.
    /// This indicates a caller bug, not a runtime condition.
    pub fn emit_event(
        self: &Arc<Self>,
        event_type: EventType,
        data: serde_json::Value,
        tenant_id: TenantId,
    ) -> std::result::Result<bool, CoreError> {
        if !data.is_object() {
            return Err(CoreError::invalid_input("event data must be a JSON object"));
        }

        let event = WebhookEvent::new(event_type, data, tenant_id, self.clock.now_utc());
        let dispatcher = Arc::clone(self);
        tokio::spawn(async move {
            match dispatcher.send(&event).await {
                Ok(outcome) => debug!(?outcome, "webhook dispatch completed"),
                Err(e) => error!(error = %e, "webhook dispatch failed"),
            }
        });

        Ok(true)
    }

    /// Delivers one event once, recording the attempt in the delivery log.
    ///
    /// # Errors
    ///
    /// Returns an error only for infrastructure faults (store failures,
    /// unserializable payloads). HTTP failures of any kind are recorded
    /// against the log entry and reported through the returned outcome.
    pub async fn send(&self, event: &WebhookEvent) -> Result<DispatchOutcome> {
        let Some(settings) = self.settings.get_settings(event.tenant_id).await? else {
            debug!(tenant_id = %event.tenant_id, "no webhook settings, skipping event");
            return Ok(DispatchOutcome::NotSubscribed);
        };

        if !settings.accepts(event.event_type) {
            debug!(
                tenant_id = %event.tenant_id,
                event_type = %event.event_type,
                "event type not subscribed, skipping event"
            );
            return Ok(DispatchOutcome::NotSubscribed);
        }

        let wire = WirePayload {
            event: event.event_type,
            data: &event.data,
            timestamp: event.occurred_at.to_rfc3339(),
            user_id: event.tenant_id,
        };
        let payload = Bytes::from(serde_json::to_vec(&wire).map_err(|e| {
            DeliveryError::internal(format!("failed to serialize wire payload: {e}"))
        })?);

        let now = self.clock.now_utc();
        let entry =
            DeliveryLog::new_pending(event.tenant_id, event.event_type, payload.clone(), now);
        let delivery_id = self.store.insert(entry).await?;

        let headers = generate_outgoing_headers_at(
            &payload,
            &settings.shared_secret,
            &settings.api_key,
            self.clock.unix_timestamp(),
        );

        let attempt = 1;
        let result = self
            .client
            .post_signed(&settings.destination_url, payload, &headers, delivery_id, attempt)
            .await;

        self.finalize_attempt(delivery_id, attempt, result).await
    }

    /// Re-attempts delivery of an entry claimed by the retry scheduler.
    ///
    /// The entry arrives already flipped to `Retrying` with `attempts`
    /// incremented and `next_retry_at` cleared by the claim. The stored
    /// payload bytes are re-sent unchanged with freshly stamped headers.
    ///
    /// # Errors
    ///
    /// Same contract as [`Dispatcher::send`].
    pub async fn retry(&self, entry: &DeliveryLog) -> Result<DispatchOutcome> {
        let attempt = entry.attempts;

        let settings = match self.settings.get_settings(entry.tenant_id).await? {
            Some(settings) if settings.is_enabled => settings,
            _ => {
                // Configuration vanished between attempts; retrying against
                // a missing destination cannot succeed.
                let now = self.clock.now_utc();
                self.store
                    .record_failed(
                        entry.id,
                        attempt,
                        None,
                        None,
                        Some("webhook settings no longer available".to_string()),
                        None,
                        now,
                    )
                    .await?;
                warn!(delivery_id = %entry.id, "settings removed mid-retry, failing permanently");
                return Ok(DispatchOutcome::FailedPermanent { delivery_id: entry.id });
            },
        };

        let headers = generate_outgoing_headers_at(
            &entry.payload,
            &settings.shared_secret,
            &settings.api_key,
            self.clock.unix_timestamp(),
        );

        let result = self
            .client
            .post_signed(
                &settings.destination_url,
                entry.payload.clone(),
                &headers,
                entry.id,
                attempt,
            )
            .await;

        self.finalize_attempt(entry.id, attempt, result).await
    }

    /// Classifies an HTTP attempt and writes the terminating log update.
    ///
    /// Every in-flight entry receives exactly one update here regardless of
    /// how the attempt ended, so no entry is left `Pending` or `Retrying`.
    /// Non-2xx responses of any class are retried identically; the
    /// destination's semantics are opaque to the sender.
    async fn finalize_attempt(
        &self,
        delivery_id: DeliveryId,
        attempt: u32,
        result: Result<HttpOutcome>,
    ) -> Result<DispatchOutcome> {
        let now = self.clock.now_utc();

        match result {
            Ok(outcome) if outcome.is_success => {
                self.store
                    .record_delivered(delivery_id, attempt, outcome.status, outcome.body_excerpt, now)
                    .await?;
                info!(
                    delivery_id = %delivery_id,
                    attempt,
                    status = outcome.status,
                    "webhook delivered"
                );
                Ok(DispatchOutcome::Delivered { delivery_id })
            },
            Ok(outcome) => {
                let next_retry_at = self.policy.next_retry_at(attempt, now);
                self.store
                    .record_failed(
                        delivery_id,
                        attempt,
                        Some(outcome.status),
                        Some(outcome.body_excerpt),
                        None,
                        next_retry_at,
                        now,
                    )
                    .await?;
                Ok(self.failed_outcome(delivery_id, attempt, next_retry_at, Some(outcome.status)))
            },
            Err(e) if e.is_transport() => {
                let next_retry_at = self.policy.next_retry_at(attempt, now);
                self.store
                    .record_failed(
                        delivery_id,
                        attempt,
                        None,
                        None,
                        Some(e.to_string()),
                        next_retry_at,
                        now,
                    )
                    .await?;
                Ok(self.failed_outcome(delivery_id, attempt, next_retry_at, None))
            },
            Err(e) => Err(e),
        }
    }

    fn failed_outcome(
        &self,
        delivery_id: DeliveryId,
        attempt: u32,
        next_retry_at: Option<DateTime<Utc>>,
        status: Option<u16>,
    ) -> DispatchOutcome {
        match next_retry_at {
            Some(at) => {
                warn!(
                    delivery_id = %delivery_id,
                    attempt,
                    status = ?status,
                    next_retry_at = %at,
                    "delivery failed, retry scheduled"
                );
                DispatchOutcome::FailedScheduled { delivery_id, next_retry_at: at }
            },
            None => {
                error!(
                    delivery_id = %delivery_id,
                    attempt,
                    status = ?status,
                    "delivery permanently failed"
                );
                DispatchOutcome::FailedPermanent { delivery_id }
            },
        }
    }
}
