//! Request handlers.

pub mod health;
pub mod receive;

pub use health::health_check;
pub use receive::{receive_discovery, receive_webhook};
