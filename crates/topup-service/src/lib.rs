//! Quota top-up HTTP service.
//!
//! This crate provides the settlement engines and the HTTP API around them:
//!
//! - Redemption of prepaid codes ([`RedemptionEngine`])
//! - Stripe webhook settlement ([`PaymentProcessor`])
//! - Batch issuance and administration of codes
//!
//! # Authentication
//!
//! User and admin routes take an HS256 bearer token; webhooks are
//! authenticated by the `Stripe-Signature` header.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
// Allow some pedantic lints that are noisy for Axum handler functions
#![allow(clippy::missing_errors_doc)] // Axum handlers all return Result
#![allow(clippy::unused_async)]

pub mod audit;
pub mod auth;
pub mod config;
pub mod crypto;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod settlement;
pub mod state;
pub mod stripe;

pub use audit::{FanoutAuditSink, TracingAuditSink};
pub use config::{ServiceConfig, SettlementConfig};
pub use error::ApiError;
pub use routes::create_router;
pub use settlement::{EventOutcome, PaymentProcessor, RedemptionEngine, SettlementError};
pub use state::AppState;
