//! Core types and utilities for the quota top-up service.
//!
//! This crate provides the foundational types shared by the store and the
//! service:
//!
//! - **Identifiers**: `UserId`, `RedemptionId`
//! - **Redemption codes**: `RedemptionRecord`, `RedemptionStatus`, `BatchSpec`
//! - **Payments**: `EventEnvelope`, `PaymentEvent`, `CheckoutSession`
//! - **Quota**: `to_quota`, `format_quota`
//! - **Audit**: `AuditSink`, `AuditEntry`, `LogCategory`
//!
//! # Quota Unit
//!
//! Quota is a single dimensionless `i64`. A payment of `amount` minor units
//! (cents) buys `floor(amount / 100 * quota_per_unit)` quota.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod account;
pub mod audit;
pub mod error;
pub mod ids;
pub mod payment;
pub mod quota;
pub mod redemption;

pub use account::UserAccount;
pub use audit::{AuditEntry, AuditSink, LogCategory, RecordingAuditSink};
pub use error::{ModelError, Result};
pub use ids::{IdError, RedemptionId, UserId};
pub use payment::{
    CheckoutSession, EventEnvelope, PaymentEvent, PaymentEventError, ProcessedPaymentEvent,
    CHECKOUT_SESSION_COMPLETED, PAYMENT_INTENT_SUCCEEDED,
};
pub use quota::{format_quota, is_valid_rate, to_quota, DEFAULT_QUOTA_PER_UNIT};
pub use redemption::{
    generate_code, BatchSpec, RedemptionRecord, RedemptionStatus, CODE_LENGTH, MAX_BATCH_COUNT,
    MAX_BATCH_NAME_CHARS,
};
