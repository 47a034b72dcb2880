//! Webhook delivery engine with reliability guarantees.
//!
//! This crate implements the outbound delivery pipeline: the dispatcher
//! that takes a domain event through settings resolution, payload signing,
//! HTTP delivery, and audit logging; the retry scheduler that converts
//! transient failures into eventual delivery with exponential backoff; and
//! the narrow repository traits over the delivery log and tenant settings.
//!
//! # Architecture
//!
//! ```text
//! EmitEvent ──▶ Dispatcher ──▶ Signer ──▶ HTTP POST ──▶ DeliveryLogStore
//!                   ▲                                         │
//!                   └────────── RetryScheduler ◀── due retries┘
//! ```
//!
//! Delivery is at-least-once: failures are absorbed, recorded, and retried
//! up to the attempt cap; receivers deduplicate on event id. Delivery
//! failures never propagate to the business operation that emitted the
//! event.

pub mod client;
pub mod dispatcher;
pub mod error;
pub mod retry;
pub mod scheduler;
pub mod store;

pub use client::{ClientConfig, DeliveryClient, HttpOutcome};
pub use dispatcher::{DispatchOutcome, Dispatcher, DispatcherConfig};
pub use error::{DeliveryError, Result};
pub use retry::RetryPolicy;
pub use scheduler::{RetryScheduler, SchedulerConfig, SchedulerStats};
pub use store::{
    DeliveryLogStore, DeliveryStats, InMemoryDeliveryLogStore, InMemorySettingsStore,
    SettingsProvider,
};

/// Default HTTP request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

/// Default base delay for exponential backoff, in seconds.
pub const DEFAULT_BASE_DELAY_SECONDS: u64 = 60;

/// Default number of concurrent retry deliveries per sweep.
pub const DEFAULT_MAX_CONCURRENT: usize = 4;
