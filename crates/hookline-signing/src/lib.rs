//! Cryptographic signing and verification for webhook payloads.
//!
//! This crate provides the pure security primitives of the delivery
//! pipeline: HMAC-SHA256 signature generation and validation over exact
//! payload bytes, constant-time credential comparison, replay-window
//! timestamp checks, and the inbound request verifier used when this
//! system receives webhooks from a trusted automation partner.
//!
//! No I/O, no shared state: every function here is deterministic given its
//! inputs, which keeps the security surface independently testable.

#![forbid(unsafe_code)]

mod sign;
pub mod verify;

pub use sign::{
    constant_time_eq, generate_outgoing_headers, generate_outgoing_headers_at, generate_secret,
    sign, verify_api_key, verify_signature, verify_timestamp, verify_timestamp_at,
    OutgoingHeaders, API_KEY_HEADER, DEFAULT_TOLERANCE_SECS, SIGNATURE_HEADER, TIMESTAMP_HEADER,
};
pub use verify::{validate_request, validate_request_at, RequestAuth, VerifyError};
