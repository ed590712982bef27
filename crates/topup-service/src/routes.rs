//! Router configuration.

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{health, redemptions, topup, webhooks};
use crate::state::AppState;

/// Maximum concurrent requests for API endpoints.
const API_MAX_CONCURRENT_REQUESTS: usize = 50;

/// Create the service router with all routes and middleware.
///
/// # Routes
///
/// ## Public
/// - `GET /health` - Health check
///
/// ## Redemption codes (admin JWT)
/// - `GET /api/redemption?p=N` - List, newest first
/// - `GET /api/redemption/search?keyword=K` - Exact id or name prefix
/// - `GET /api/redemption/:id` - Fetch one
/// - `POST /api/redemption` - Issue a batch
/// - `PUT /api/redemption[?status_only=1]` - Update name or status
/// - `DELETE /api/redemption/:id` - Delete
///
/// ## User (JWT)
/// - `POST /api/user/topup` - Redeem a code
/// - `GET /api/user/quota` - Current balance
///
/// ## Webhooks (signature verification)
/// - `POST /webhooks/stripe` - Stripe events
pub fn create_router(state: AppState) -> Router {
    let cors = build_cors_layer(&state.config.cors_origins);
    let max_body_bytes = state.config.max_body_bytes;
    let request_timeout_seconds = state.config.request_timeout_seconds;

    let state = Arc::new(state);

    let api_routes = Router::new()
        .route(
            "/redemption",
            get(redemptions::list_redemptions)
                .post(redemptions::create_redemptions)
                .put(redemptions::update_redemption),
        )
        .route("/redemption/search", get(redemptions::search_redemptions))
        .route(
            "/redemption/:id",
            get(redemptions::get_redemption).delete(redemptions::delete_redemption),
        )
        .route("/user/topup", post(topup::topup))
        .route("/user/quota", get(topup::get_quota))
        .layer(ConcurrencyLimitLayer::new(API_MAX_CONCURRENT_REQUESTS));

    Router::new()
        // Health (public, no rate limit)
        .route("/health", get(health::health))
        .nest("/api", api_routes)
        // Webhooks (no rate limit - controlled by Stripe)
        .route("/webhooks/stripe", post(webhooks::stripe_webhook))
        // Global middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TimeoutLayer::new(Duration::from_secs(
            request_timeout_seconds,
        )))
        .with_state(state)
}

/// Build the CORS layer from configured origins.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}
