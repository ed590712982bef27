//! Settlement engines.
//!
//! Every credit runs in one store transaction that also writes the state
//! authorizing it: the redeemed record for codes, the processed-event row for
//! payments. A failure anywhere before commit leaves no writes behind.

mod error;
mod issue;
mod manage;
mod payment;
mod redeem;

pub use error::SettlementError;
pub use manage::{RedemptionUpdate, UpdateMode};
pub use payment::{EventOutcome, PaymentProcessor};
pub use redeem::RedemptionEngine;

use topup_store::StoreTx;

/// Result type for settlement operations.
pub type Result<T> = std::result::Result<T, SettlementError>;

/// Roll back a transaction whose outcome is already decided.
async fn abort(tx: Box<dyn StoreTx>) {
    if let Err(e) = tx.rollback().await {
        tracing::warn!(error = %e, "Rollback failed");
    }
}
