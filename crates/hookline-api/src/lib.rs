//! HTTP surface for the hookline delivery system.
//!
//! Exposes the inbound receiver endpoint for webhooks originating from a
//! trusted automation partner, plus health probes. Outbound delivery has
//! no HTTP surface of its own; it is driven in-process through the
//! dispatcher.

pub mod handlers;
pub mod server;

pub use handlers::receive::{LoggingEventHandler, ReceivedEventHandler};
pub use server::{create_router, start_server, AppState, ReceiverConfig};
