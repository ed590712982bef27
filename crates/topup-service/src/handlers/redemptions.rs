//! Redemption code administration handlers.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;

use topup_core::{BatchSpec, RedemptionId, RedemptionRecord, RedemptionStatus};

use super::ApiResponse;
use crate::auth::AdminUser;
use crate::error::ApiError;
use crate::settlement::{RedemptionUpdate, UpdateMode};
use crate::state::AppState;

/// Listing page query.
#[derive(Debug, Deserialize)]
pub struct PageQuery {
    /// Zero-based page number.
    #[serde(default)]
    pub p: usize,
}

/// Search query.
#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    /// Exact record id or name prefix.
    #[serde(default)]
    pub keyword: String,
}

/// Batch creation request.
#[derive(Debug, Deserialize)]
pub struct CreateRedemptionRequest {
    /// Batch name.
    pub name: String,
    /// Number of codes.
    pub count: i64,
    /// Quota credited by each code.
    pub quota: i64,
}

/// Update query flags.
#[derive(Debug, Deserialize)]
pub struct UpdateQuery {
    /// Any non-empty value restricts the update to `status`.
    #[serde(default)]
    pub status_only: Option<String>,
}

/// Update request.
#[derive(Debug, Deserialize)]
pub struct UpdateRedemptionRequest {
    /// Record id.
    pub id: RedemptionId,
    /// New batch name.
    #[serde(default)]
    pub name: Option<String>,
    /// New status.
    #[serde(default)]
    pub status: Option<RedemptionStatus>,
    /// Expected quota value; must match the stored one.
    #[serde(default)]
    pub quota: Option<i64>,
}

fn parse_id(raw: &str) -> Result<RedemptionId, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::BadRequest(format!("invalid redemption id: {raw}")))
}

/// List records, newest first.
pub async fn list_redemptions(
    _admin: AdminUser,
    State(state): State<Arc<AppState>>,
    Query(query): Query<PageQuery>,
) -> Result<Json<ApiResponse<Vec<RedemptionRecord>>>, ApiError> {
    let per_page = state.config.items_per_page;
    let records = state
        .store
        .list_redemptions(per_page, query.p.saturating_mul(per_page))
        .await?;

    Ok(Json(ApiResponse::ok(records)))
}

/// Search by exact id or name prefix.
pub async fn search_redemptions(
    _admin: AdminUser,
    State(state): State<Arc<AppState>>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<ApiResponse<Vec<RedemptionRecord>>>, ApiError> {
    let keyword = query.keyword.trim();
    if keyword.is_empty() {
        return Err(ApiError::BadRequest("keyword is required".into()));
    }

    let records = state.store.search_redemptions(keyword).await?;
    Ok(Json(ApiResponse::ok(records)))
}

/// Fetch one record.
pub async fn get_redemption(
    _admin: AdminUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<RedemptionRecord>>, ApiError> {
    let id = parse_id(&id)?;
    let record = state
        .store
        .get_redemption(&id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("redemption not found: {id}")))?;

    Ok(Json(ApiResponse::ok(record)))
}

/// Issue a batch of codes and return them.
pub async fn create_redemptions(
    admin: AdminUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateRedemptionRequest>,
) -> Result<Json<ApiResponse<Vec<String>>>, ApiError> {
    if req.quota <= 0 {
        return Err(ApiError::BadRequest("quota must be positive".into()));
    }

    let spec = BatchSpec {
        name: req.name,
        count: req.count,
        quota_value: req.quota,
    };
    let codes = state
        .redemptions
        .issue_batch(&spec, admin.user_id)
        .await?;

    Ok(Json(ApiResponse::ok(codes)))
}

/// Update a record's name, or only its status with `?status_only=1`.
pub async fn update_redemption(
    admin: AdminUser,
    State(state): State<Arc<AppState>>,
    Query(query): Query<UpdateQuery>,
    Json(req): Json<UpdateRedemptionRequest>,
) -> Result<Json<ApiResponse<RedemptionRecord>>, ApiError> {
    let mode = if query.status_only.is_some_and(|v| !v.is_empty()) {
        UpdateMode::StatusOnly
    } else {
        UpdateMode::Details
    };

    let update = RedemptionUpdate {
        id: req.id,
        name: req.name,
        status: req.status,
        quota_value: req.quota,
    };
    let record = state
        .redemptions
        .update(update, mode, admin.user_id)
        .await?;

    Ok(Json(ApiResponse::ok(record)))
}

/// Delete a record.
pub async fn delete_redemption(
    admin: AdminUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    let id = parse_id(&id)?;
    state.redemptions.delete(&id, admin.user_id).await?;

    Ok(Json(ApiResponse::ok(())))
}
