//! Domain models and strongly-typed identifiers.
//!
//! Defines the closed event-type enumeration, tenant webhook settings, and
//! the delivery-log entity with its state machine. Identifiers are newtype
//! wrappers to prevent mixing ids of different entities at compile time.

use std::{collections::HashSet, fmt, str::FromStr};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;

/// Maximum delivery attempts per event, including the initial send.
///
/// Once a log entry reaches this count its failure is terminal and the
/// retry scheduler will never pick it up again.
pub const MAX_DELIVERY_ATTEMPTS: u32 = 3;

/// Maximum number of response-body bytes retained in the delivery log.
pub const RESPONSE_EXCERPT_LIMIT: usize = 1000;

/// Strongly-typed tenant identifier.
///
/// Provides multi-tenancy isolation. Webhook settings and delivery logs
/// are always scoped to a tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TenantId(pub Uuid);

impl TenantId {
    /// Creates a new random tenant ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TenantId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for TenantId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Strongly-typed delivery-log identifier.
///
/// Generated when a dispatch creates its log entry and used by the retry
/// scheduler to address the same entry across attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeliveryId(pub Uuid);

impl DeliveryId {
    /// Creates a new random delivery ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for DeliveryId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DeliveryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for DeliveryId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Closed set of domain event types carried over webhooks.
///
/// The set is fixed at compile time; unknown event names are rejected at
/// the boundary (emission arguments, inbound payload deserialization),
/// never deep inside delivery logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    /// A contact was created.
    #[serde(rename = "contact.created")]
    ContactCreated,
    /// A contact was updated.
    #[serde(rename = "contact.updated")]
    ContactUpdated,
    /// A contact was deleted.
    #[serde(rename = "contact.deleted")]
    ContactDeleted,
    /// A deal was created.
    #[serde(rename = "deal.created")]
    DealCreated,
    /// A deal was updated.
    #[serde(rename = "deal.updated")]
    DealUpdated,
    /// A deal moved to a different pipeline stage.
    #[serde(rename = "deal.stage_changed")]
    DealStageChanged,
    /// A company was created.
    #[serde(rename = "company.created")]
    CompanyCreated,
    /// A company was updated.
    #[serde(rename = "company.updated")]
    CompanyUpdated,
    /// A note was created.
    #[serde(rename = "note.created")]
    NoteCreated,
    /// A file was uploaded.
    #[serde(rename = "file.uploaded")]
    FileUploaded,
    /// An activity was logged.
    #[serde(rename = "activity.logged")]
    ActivityLogged,
}

impl EventType {
    /// Every supported event type, in declaration order.
    pub const ALL: [EventType; 11] = [
        Self::ContactCreated,
        Self::ContactUpdated,
        Self::ContactDeleted,
        Self::DealCreated,
        Self::DealUpdated,
        Self::DealStageChanged,
        Self::CompanyCreated,
        Self::CompanyUpdated,
        Self::NoteCreated,
        Self::FileUploaded,
        Self::ActivityLogged,
    ];

    /// Returns the dotted wire name for this event type.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ContactCreated => "contact.created",
            Self::ContactUpdated => "contact.updated",
            Self::ContactDeleted => "contact.deleted",
            Self::DealCreated => "deal.created",
            Self::DealUpdated => "deal.updated",
            Self::DealStageChanged => "deal.stage_changed",
            Self::CompanyCreated => "company.created",
            Self::CompanyUpdated => "company.updated",
            Self::NoteCreated => "note.created",
            Self::FileUploaded => "file.uploaded",
            Self::ActivityLogged => "activity.logged",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|event| event.as_str() == s)
            .ok_or_else(|| CoreError::invalid_input(format!("unknown event type: {s}")))
    }
}

/// A domain event awaiting webhook delivery.
///
/// Ephemeral and immutable: constructed by the emitting business logic and
/// folded into a [`DeliveryLog`] entry by the dispatcher. Never persisted
/// directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEvent {
    /// Type of the domain event.
    pub event_type: EventType,

    /// Opaque JSON object payload supplied by the emitter.
    pub data: serde_json::Value,

    /// Tenant whose configuration governs delivery.
    pub tenant_id: TenantId,

    /// When the domain event occurred.
    pub occurred_at: DateTime<Utc>,
}

impl WebhookEvent {
    /// Creates a new event.
    pub fn new(
        event_type: EventType,
        data: serde_json::Value,
        tenant_id: TenantId,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self { event_type, data, tenant_id, occurred_at }
    }
}

/// Per-tenant webhook configuration.
///
/// Owned by the tenant and mutable through the settings UI (an external
/// collaborator). Secrets are generated server-side with 256 bits of
/// entropy; the custom `Debug` impl redacts them so they never reach logs.
#[derive(Clone)]
pub struct WebhookSettings {
    /// Tenant this configuration belongs to.
    pub tenant_id: TenantId,

    /// Destination URL receiving the signed POST requests.
    pub destination_url: String,

    /// API key transmitted in the `x-n8n-api-key` header.
    pub api_key: String,

    /// Shared secret used to sign outgoing payloads.
    pub shared_secret: String,

    /// Master on/off switch for delivery.
    pub is_enabled: bool,

    /// Event types this tenant subscribed to.
    pub enabled_event_types: HashSet<EventType>,
}

impl WebhookSettings {
    /// Creates validated settings.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidInput` if the destination URL is empty or
    /// either credential is empty. Credential strength is the
    /// responsibility of the server-side generator; emptiness is rejected
    /// here so the signer never sees a zero-length secret.
    pub fn new(
        tenant_id: TenantId,
        destination_url: impl Into<String>,
        api_key: impl Into<String>,
        shared_secret: impl Into<String>,
        enabled_event_types: HashSet<EventType>,
    ) -> Result<Self, CoreError> {
        let destination_url = destination_url.into();
        let api_key = api_key.into();
        let shared_secret = shared_secret.into();

        if destination_url.trim().is_empty() {
            return Err(CoreError::invalid_input("destination URL must not be empty"));
        }
        if api_key.is_empty() {
            return Err(CoreError::invalid_input("API key must not be empty"));
        }
        if shared_secret.is_empty() {
            return Err(CoreError::invalid_input("shared secret must not be empty"));
        }

        Ok(Self {
            tenant_id,
            destination_url,
            api_key,
            shared_secret,
            is_enabled: true,
            enabled_event_types,
        })
    }

    /// Returns whether delivery should be attempted for this event type.
    pub fn accepts(&self, event_type: EventType) -> bool {
        self.is_enabled && self.enabled_event_types.contains(&event_type)
    }
}

impl fmt::Debug for WebhookSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebhookSettings")
            .field("tenant_id", &self.tenant_id)
            .field("destination_url", &self.destination_url)
            .field("api_key", &"<redacted>")
            .field("shared_secret", &"<redacted>")
            .field("is_enabled", &self.is_enabled)
            .field("enabled_event_types", &self.enabled_event_types)
            .finish()
    }
}

/// Delivery lifecycle status.
///
/// Entries progress through these states during processing:
///
/// ```text
/// Pending --(2xx)--> Delivered                       [terminal]
/// Pending --(failure, attempts < max)--> Failed(next_retry_at)
/// Failed(due) --(sweep claims)--> Retrying --(2xx)--> Delivered
/// Retrying --(failure, attempts < max)--> Failed(next_retry_at)
/// Retrying/Failed --(attempts == max)--> Failed(next_retry_at = None) [terminal]
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    /// Created for an in-flight initial send.
    Pending,
    /// Successfully delivered. Terminal.
    Delivered,
    /// Last attempt failed. Eligible for retry while `next_retry_at` is set.
    Failed,
    /// Claimed by a retry sweep; the HTTP attempt is in flight.
    Retrying,
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Delivered => write!(f, "delivered"),
            Self::Failed => write!(f, "failed"),
            Self::Retrying => write!(f, "retrying"),
        }
    }
}

/// Audit-trail entry for one delivery attempt series.
///
/// Created when a dispatch begins and mutated in place on each attempt.
/// `payload` holds the exact bytes that were signed and transmitted, so
/// retries re-send a byte-identical body and signatures stay verifiable
/// against the stored record. Entries are never deleted by this subsystem.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryLog {
    /// Unique identifier for this entry.
    pub id: DeliveryId,

    /// Tenant that owns this delivery.
    pub tenant_id: TenantId,

    /// Type of the delivered event.
    pub event_type: EventType,

    /// Exact signed wire payload.
    pub payload: Bytes,

    /// Current lifecycle status.
    pub status: DeliveryStatus,

    /// Attempts made so far. Monotonically non-decreasing, bounded by
    /// [`MAX_DELIVERY_ATTEMPTS`].
    pub attempts: u32,

    /// HTTP status of the most recent response, when one was received.
    pub response_status: Option<u16>,

    /// Truncated response body for diagnostics.
    pub response_body_excerpt: Option<String>,

    /// Transport error of the most recent attempt, when no response arrived.
    pub error_message: Option<String>,

    /// When the retry scheduler should pick this entry up again.
    pub next_retry_at: Option<DateTime<Utc>>,

    /// When the entry was created.
    pub created_at: DateTime<Utc>,

    /// When the entry was last mutated.
    pub updated_at: DateTime<Utc>,
}

impl DeliveryLog {
    /// Creates a fresh `Pending` entry for an initial send.
    pub fn new_pending(
        tenant_id: TenantId,
        event_type: EventType,
        payload: Bytes,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: DeliveryId::new(),
            tenant_id,
            event_type,
            payload,
            status: DeliveryStatus::Pending,
            attempts: 0,
            response_status: None,
            response_body_excerpt: None,
            error_message: None,
            next_retry_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns whether this entry can never be mutated again.
    ///
    /// `Delivered` is always terminal. `Failed` is terminal once no retry
    /// is scheduled, which only happens after the attempt cap is reached.
    pub fn is_terminal(&self) -> bool {
        match self.status {
            DeliveryStatus::Delivered => true,
            DeliveryStatus::Failed => self.next_retry_at.is_none(),
            DeliveryStatus::Pending | DeliveryStatus::Retrying => false,
        }
    }

    /// Returns whether a sweep may claim this entry at `now`.
    pub fn is_due_for_retry(&self, now: DateTime<Utc>) -> bool {
        self.status == DeliveryStatus::Failed
            && self.attempts < MAX_DELIVERY_ATTEMPTS
            && self.next_retry_at.is_some_and(|at| at <= now)
    }
}
