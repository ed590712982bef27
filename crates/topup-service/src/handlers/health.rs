//! Liveness and readiness.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use crate::state::AppState;

/// Readiness report.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// `ok` when every dependency answers, `degraded` otherwise.
    pub status: &'static str,
    /// `ok` or `unavailable`.
    pub database: &'static str,
    /// Whether webhook deliveries can be verified.
    pub webhooks_enabled: bool,
    /// Crate version.
    pub version: &'static str,
}

/// `GET /health`. Answers 503 while the store is unreachable.
pub async fn health(State(state): State<Arc<AppState>>) -> (StatusCode, Json<HealthResponse>) {
    let database = match state.store.ping().await {
        Ok(()) => "ok",
        Err(e) => {
            tracing::warn!(error = %e, "Store ping failed");
            "unavailable"
        }
    };
    let (code, status) = if database == "ok" {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };

    (
        code,
        Json(HealthResponse {
            status,
            database,
            webhooks_enabled: state.config.stripe_webhook_secret.is_some(),
            version: env!("CARGO_PKG_VERSION"),
        }),
    )
}
