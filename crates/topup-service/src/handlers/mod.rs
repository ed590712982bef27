//! API handlers.

use serde::Serialize;

pub mod health;
pub mod redemptions;
pub mod topup;
pub mod webhooks;

/// Success envelope shared by every JSON endpoint.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    /// Always `true`; errors render through [`crate::ApiError`].
    pub success: bool,
    /// Human-readable summary, empty on plain success.
    pub message: String,
    /// Payload.
    pub data: T,
}

impl<T> ApiResponse<T> {
    /// Wrap `data` in a success envelope.
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            message: String::new(),
            data,
        }
    }
}
