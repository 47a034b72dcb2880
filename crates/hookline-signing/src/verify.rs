//! Inbound request verification.
//!
//! Mirror of the outgoing signer, applied to webhooks this system receives
//! from a trusted automation partner. Checks are ordered cheapest-first and
//! short-circuit: API key, then timestamp, then signature.

use thiserror::Error;

use crate::sign::{
    verify_api_key, verify_signature, verify_timestamp_at, DEFAULT_TOLERANCE_SECS,
};

/// Reasons an inbound request fails verification.
///
/// Every variant is terminal for the request; callers map these to `401`
/// and never retry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifyError {
    /// No API key header was supplied.
    #[error("missing API key")]
    MissingApiKey,

    /// The supplied API key does not match the expected value.
    #[error("invalid API key")]
    InvalidApiKey,

    /// The timestamp header is present but not parseable as Unix seconds.
    #[error("malformed timestamp")]
    MalformedTimestamp,

    /// The timestamp is outside the replay-protection window.
    #[error("timestamp outside freshness window")]
    StaleTimestamp,

    /// The signature header is present but does not match the body.
    #[error("invalid signature")]
    InvalidSignature,
}

/// Authentication material extracted from inbound request headers.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestAuth<'a> {
    /// Value of the API key header, if present.
    pub api_key: Option<&'a str>,
    /// Value of the signature header, if present.
    pub signature: Option<&'a str>,
    /// Value of the timestamp header, if present.
    pub timestamp: Option<&'a str>,
}

/// Validates an inbound webhook request at a given time.
///
/// The API key is mandatory and checked first as the cheapest, most
/// decisive gate. Timestamp and signature are optional-but-must-pass: a
/// request omitting either header is accepted (supporting incremental
/// partner rollout), but a present header that fails its check is
/// rejected. This leniency is deliberate and documented, not an oversight.
pub fn validate_request_at(
    body: &[u8],
    auth: &RequestAuth<'_>,
    expected_api_key: &str,
    secret: &str,
    now_unix: i64,
) -> Result<(), VerifyError> {
    let api_key = auth.api_key.ok_or(VerifyError::MissingApiKey)?;
    if !verify_api_key(api_key, expected_api_key) {
        return Err(VerifyError::InvalidApiKey);
    }

    if let Some(raw) = auth.timestamp {
        let timestamp: i64 = raw.trim().parse().map_err(|_| VerifyError::MalformedTimestamp)?;
        if !verify_timestamp_at(timestamp, DEFAULT_TOLERANCE_SECS, now_unix) {
            return Err(VerifyError::StaleTimestamp);
        }
    }

    if let Some(signature) = auth.signature {
        if !verify_signature(body, signature, secret) {
            return Err(VerifyError::InvalidSignature);
        }
    }

    Ok(())
}

/// Validates an inbound webhook request against the system clock.
pub fn validate_request(
    body: &[u8],
    auth: &RequestAuth<'_>,
    expected_api_key: &str,
    secret: &str,
) -> Result<(), VerifyError> {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_secs()).unwrap_or(i64::MAX))
        .unwrap_or(0);
    validate_request_at(body, auth, expected_api_key, secret, now)
}
