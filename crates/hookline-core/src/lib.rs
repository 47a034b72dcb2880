//! Core domain models for the hookline webhook delivery system.
//!
//! Provides strongly-typed identifiers, the closed event-type enumeration,
//! tenant webhook settings, and the delivery-log state machine. All other
//! crates depend on these foundational types for type safety and
//! consistency.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod models;
pub mod time;

pub use error::{CoreError, Result};
pub use models::{
    DeliveryId, DeliveryLog, DeliveryStatus, EventType, TenantId, WebhookEvent, WebhookSettings,
    MAX_DELIVERY_ATTEMPTS, RESPONSE_EXCERPT_LIMIT,
};
pub use time::{Clock, RealClock, TestClock};
