//! User top-up handlers.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use topup_core::format_quota;

use super::ApiResponse;
use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

/// Redemption request.
#[derive(Debug, Deserialize)]
pub struct TopupRequest {
    /// The redemption code.
    pub key: String,
}

/// Quota balance response.
#[derive(Debug, Serialize)]
pub struct QuotaResponse {
    /// Spendable quota.
    pub quota: i64,
    /// The balance rendered for display.
    pub display: String,
}

/// Redeem a code for the caller; `data` is the credited quota.
pub async fn topup(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<TopupRequest>,
) -> Result<Json<ApiResponse<i64>>, ApiError> {
    let quota = state.redemptions.redeem(&req.key, user.user_id).await?;
    Ok(Json(ApiResponse::ok(quota)))
}

/// The caller's current balance.
pub async fn get_quota(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<QuotaResponse>>, ApiError> {
    let account = state
        .store
        .get_account(&user.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("account not found: {}", user.user_id)))?;

    let settlement = &state.config.settlement;
    Ok(Json(ApiResponse::ok(QuotaResponse {
        quota: account.quota,
        display: format_quota(
            account.quota,
            settlement.quota_per_unit,
            settlement.display_in_currency,
        ),
    })))
}
