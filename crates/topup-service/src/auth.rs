//! Authentication extractors.
//!
//! Callers present `Authorization: Bearer <jwt>`, an HS256 token signed with
//! the configured secret and carrying `{sub, role, exp}`:
//!
//! - [`AuthUser`] - any valid token
//! - [`AdminUser`] - a valid token with `role = "admin"`

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use topup_core::UserId;

use crate::error::ApiError;
use crate::state::AppState;

/// Caller role carried in the token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Regular user.
    User,
    /// Administrator, may manage redemption codes.
    Admin,
}

/// JWT claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject (user ID).
    pub sub: String,
    /// Caller role.
    #[serde(default = "default_role")]
    pub role: Role,
    /// Expiration time (Unix seconds).
    pub exp: i64,
}

const fn default_role() -> Role {
    Role::User
}

/// An authenticated caller.
#[derive(Debug, Clone)]
pub struct AuthUser {
    /// The user ID.
    pub user_id: UserId,
    /// The caller's role.
    pub role: Role,
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or(ApiError::Unauthorized)?;

        let secret = state
            .config
            .jwt_secret
            .as_deref()
            .ok_or(ApiError::Unauthorized)?;

        let claims = validate_jwt(token, secret)?;
        let user_id = claims
            .sub
            .parse::<UserId>()
            .map_err(|_| ApiError::Unauthorized)?;
        if user_id.is_nil() {
            return Err(ApiError::Unauthorized);
        }

        Ok(AuthUser {
            user_id,
            role: claims.role,
        })
    }
}

/// An authenticated administrator.
#[derive(Debug, Clone)]
pub struct AdminUser {
    /// The administrator's user ID.
    pub user_id: UserId,
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if user.role != Role::Admin {
            tracing::warn!(user_id = %user.user_id, "Non-admin caller on admin route");
            return Err(ApiError::Forbidden);
        }
        Ok(AdminUser {
            user_id: user.user_id,
        })
    }
}

/// Validate an HS256 token and return its claims.
fn validate_jwt(token: &str, secret: &str) -> Result<JwtClaims, ApiError> {
    let validation = Validation::new(Algorithm::HS256);
    let token_data = decode::<JwtClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|e| {
        tracing::debug!(error = %e, "JWT validation failed");
        ApiError::Unauthorized
    })?;

    Ok(token_data.claims)
}
