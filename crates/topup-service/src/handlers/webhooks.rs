//! Stripe webhook handler.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;

use super::ApiResponse;
use crate::error::ApiError;
use crate::settlement::{EventOutcome, SettlementError};
use crate::state::AppState;
use crate::stripe::{SignatureError, SIGNATURE_HEADER};

/// Handle Stripe webhooks.
///
/// The body is taken as raw bytes: the signature covers the exact payload.
pub async fn stripe_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ApiResponse<EventOutcome>>, ApiError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    let Some(secret) = state.config.stripe_webhook_secret.as_deref() else {
        tracing::warn!("Stripe webhook received but no secret is configured");
        return Err(SettlementError::UntrustedEvent(SignatureError::MissingSecret).into());
    };

    let outcome = state
        .payments
        .handle_event(&body, signature, secret)
        .await?;

    Ok(Json(ApiResponse::ok(outcome)))
}
