//! The `Stripe-Signature` scheme.
//!
//! The header has the form `t=<unix>,v1=<hex>,v1=<hex>,...`. Each `v1` value
//! is an HMAC-SHA256 over `"{t}.{payload}"` keyed with the endpoint secret.
//! Several `v1` entries appear while a secret is being rolled; any one of them
//! may match. Other schemes (`v0`) are ignored.

use crate::crypto::{constant_time_eq, hmac_sha256_hex};

/// Header carrying the signature.
pub const SIGNATURE_HEADER: &str = "stripe-signature";

/// Reasons a webhook signature is rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    /// No signing secret is configured.
    #[error("webhook secret not configured")]
    MissingSecret,

    /// The header has no `t=` element, or it is not an integer.
    #[error("missing or invalid timestamp")]
    InvalidTimestamp,

    /// The header has no `v1=` element.
    #[error("no v1 signature in header")]
    NoSignatures,

    /// The signed timestamp is older than the tolerance.
    #[error("timestamp outside tolerance: {age}s old, tolerance {tolerance}s")]
    Expired {
        /// Seconds between the signed timestamp and now.
        age: i64,
        /// Accepted age, in seconds.
        tolerance: i64,
    },

    /// No `v1` signature matches the payload.
    #[error("signature mismatch")]
    Mismatch,
}

fn signed_payload(timestamp: &str, payload: &[u8]) -> Vec<u8> {
    let mut message = Vec::with_capacity(timestamp.len() + 1 + payload.len());
    message.extend_from_slice(timestamp.as_bytes());
    message.push(b'.');
    message.extend_from_slice(payload);
    message
}

/// Check `header` against `payload` at time `now` (Unix seconds).
///
/// # Errors
///
/// Returns a [`SignatureError`] describing the first check that failed.
pub fn verify_signature(
    payload: &[u8],
    header: &str,
    secret: &str,
    tolerance_seconds: i64,
    now: i64,
) -> Result<(), SignatureError> {
    if secret.is_empty() {
        return Err(SignatureError::MissingSecret);
    }

    let mut timestamp: Option<&str> = None;
    let mut signatures: Vec<&str> = Vec::new();

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", ts)) => timestamp = Some(ts),
            Some(("v1", sig)) => signatures.push(sig),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(SignatureError::InvalidTimestamp)?;
    let signed_at: i64 = timestamp
        .parse()
        .map_err(|_| SignatureError::InvalidTimestamp)?;

    if signatures.is_empty() {
        return Err(SignatureError::NoSignatures);
    }

    let expected = hmac_sha256_hex(secret, &signed_payload(timestamp, payload));
    if !signatures.iter().any(|sig| constant_time_eq(&expected, sig)) {
        return Err(SignatureError::Mismatch);
    }

    let age = now.saturating_sub(signed_at);
    if age > tolerance_seconds {
        return Err(SignatureError::Expired {
            age,
            tolerance: tolerance_seconds,
        });
    }

    Ok(())
}

/// Build a header value signing `payload` at `timestamp`.
#[must_use]
pub fn sign_payload(payload: &[u8], secret: &str, timestamp: i64) -> String {
    let timestamp = timestamp.to_string();
    let signature = hmac_sha256_hex(secret, &signed_payload(&timestamp, payload));
    format!("t={timestamp},v1={signature}")
}
