//! HMAC-SHA256 signing primitives and outgoing header generation.

use std::time::{SystemTime, UNIX_EPOCH};

use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the hex HMAC-SHA256 signature of the request body.
pub const SIGNATURE_HEADER: &str = "x-webhook-signature";

/// Header carrying the shared API key.
pub const API_KEY_HEADER: &str = "x-n8n-api-key";

/// Header carrying the request timestamp as whole Unix seconds.
pub const TIMESTAMP_HEADER: &str = "x-webhook-timestamp";

/// Default replay-window tolerance in seconds.
pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

/// Number of random bytes in a generated credential (256 bits).
const SECRET_BYTES: usize = 32;

/// Signs a payload with HMAC-SHA256, returning lowercase hex.
///
/// The MAC is computed over the exact byte sequence that will be
/// transmitted, never over a re-serialized object, so field-ordering
/// differences cannot produce signature mismatches. An empty payload still
/// yields a deterministic signature (HMAC of the empty string).
pub fn sign(payload: &[u8], secret: &str) -> String {
    hex::encode(hmac_bytes(payload, secret))
}

/// Verifies a hex HMAC-SHA256 signature over a payload.
///
/// Recomputes the MAC and compares in constant time. Malformed hex input
/// returns `false`; this function never fails.
pub fn verify_signature(payload: &[u8], signature_hex: &str, secret: &str) -> bool {
    let Ok(provided) = hex::decode(signature_hex) else {
        return false;
    };
    constant_time_eq(&provided, &hmac_bytes(payload, secret))
}

/// Compares an API key against the expected value in constant time.
///
/// Differing lengths return `false` before the byte loop. The length check
/// avoids out-of-range access, not timing leakage; key length is not
/// secret.
pub fn verify_api_key(provided: &str, expected: &str) -> bool {
    constant_time_eq(provided.as_bytes(), expected.as_bytes())
}

/// Validates a Unix-seconds timestamp against a freshness window.
///
/// Rejects timestamps differing from `now_unix` by more than
/// `tolerance_secs` in either direction, defending against replay of
/// captured requests and against clock-skew abuse.
pub fn verify_timestamp_at(unix_seconds: i64, tolerance_secs: i64, now_unix: i64) -> bool {
    (now_unix - unix_seconds).abs() <= tolerance_secs
}

/// Validates a Unix-seconds timestamp against the system clock.
pub fn verify_timestamp(unix_seconds: i64, tolerance_secs: i64) -> bool {
    verify_timestamp_at(unix_seconds, tolerance_secs, system_unix_now())
}

/// Headers attached to an outgoing webhook request.
///
/// The timestamp is captured once and reused for the replay-window header,
/// so a receiver validating freshness sees the same value the sender used.
/// The signature covers the payload bytes only; headers carry auth
/// metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingHeaders {
    /// Hex HMAC-SHA256 of the payload.
    pub signature: String,
    /// Shared API key.
    pub api_key: String,
    /// Unix-seconds timestamp of the send.
    pub timestamp: i64,
}

/// Generates the signed header set for an outgoing request at a given time.
pub fn generate_outgoing_headers_at(
    payload: &[u8],
    secret: &str,
    api_key: &str,
    timestamp: i64,
) -> OutgoingHeaders {
    OutgoingHeaders { signature: sign(payload, secret), api_key: api_key.to_string(), timestamp }
}

/// Generates the signed header set for an outgoing request, stamping the
/// current system time.
pub fn generate_outgoing_headers(payload: &[u8], secret: &str, api_key: &str) -> OutgoingHeaders {
    generate_outgoing_headers_at(payload, secret, api_key, system_unix_now())
}

/// Generates a fresh credential: 32 random bytes, hex-encoded.
///
/// Used server-side for both API keys and signing secrets at
/// settings-creation time, giving each credential 256 bits of entropy.
pub fn generate_secret() -> String {
    let mut bytes = [0u8; SECRET_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Constant-time byte comparison.
///
/// Differing lengths return `false` immediately; equal-length slices are
/// compared without early exit to prevent timing analysis of the expected
/// value.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

fn hmac_bytes(payload: &[u8], secret: &str) -> [u8; 32] {
    // HMAC-SHA256 accepts keys of any length, so this cannot fail.
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC can take a key of any size");
    mac.update(payload);
    mac.finalize().into_bytes().into()
}

fn system_unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_secs()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}
