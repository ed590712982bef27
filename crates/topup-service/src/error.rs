//! API error types and responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::settlement::SettlementError;

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Unauthorized - missing or invalid credentials.
    #[error("unauthorized")]
    Unauthorized,

    /// Forbidden - valid credentials but insufficient permissions.
    #[error("forbidden")]
    Forbidden,

    /// Resource not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Bad request - invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Conflict - the resource is not in a state that allows the request.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The request is well-formed but cannot be settled.
    #[error("unprocessable: {0}")]
    Unprocessable(String),

    /// Batch issuance failed partway; `issued` were persisted.
    #[error("partial issue: {message}")]
    PartialIssue {
        /// What went wrong.
        message: String,
        /// Codes persisted before the failure.
        issued: Vec<String>,
    },

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// JSON error response body.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    success: bool,
    code: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<serde_json::Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message, data) = match self {
            Self::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                "unauthorized".to_string(),
                None,
            ),
            Self::Forbidden => (
                StatusCode::FORBIDDEN,
                "forbidden",
                "forbidden".to_string(),
                None,
            ),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg, None),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg, None),
            Self::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg, None),
            Self::Unprocessable(msg) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "unprocessable", msg, None)
            }
            Self::PartialIssue { message, issued } => {
                tracing::error!(error = %message, issued = issued.len(), "Partial batch issue");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "partial_issue",
                    "batch issuance failed partway".to_string(),
                    Some(serde_json::json!(issued)),
                )
            }
            Self::Internal(msg) => {
                tracing::error!(error = %msg, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
        };

        let body = ErrorResponse {
            success: false,
            code,
            message,
            data,
        };

        (status, Json(body)).into_response()
    }
}

impl From<SettlementError> for ApiError {
    fn from(err: SettlementError) -> Self {
        match err {
            SettlementError::InvalidInput(_)
            | SettlementError::UntrustedEvent(_)
            | SettlementError::MalformedEvent(_) => Self::BadRequest(err.to_string()),
            SettlementError::CodeNotFound
            | SettlementError::AccountNotFound(_)
            | SettlementError::UnknownCustomer { .. } => Self::NotFound(err.to_string()),
            SettlementError::CodeAlreadyUsed => Self::Conflict(err.to_string()),
            SettlementError::PreconditionFailed(_) => Self::Unprocessable(err.to_string()),
            SettlementError::RedemptionFailed(_) | SettlementError::CreditFailed(_) => {
                Self::Internal(err.to_string())
            }
            SettlementError::PartialIssue { issued, source } => Self::PartialIssue {
                message: source.to_string(),
                issued,
            },
        }
    }
}

impl From<topup_store::StoreError> for ApiError {
    fn from(err: topup_store::StoreError) -> Self {
        match err {
            topup_store::StoreError::NotFound { entity, id } => {
                Self::NotFound(format!("{entity} not found: {id}"))
            }
            topup_store::StoreError::Duplicate(msg) => Self::Conflict(msg),
            topup_store::StoreError::Database(msg)
            | topup_store::StoreError::Serialization(msg) => Self::Internal(msg),
        }
    }
}
