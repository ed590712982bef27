//! Settlement error taxonomy.

use topup_core::{PaymentEventError, UserId};
use topup_store::StoreError;

use crate::stripe::SignatureError;

/// Errors returned by the settlement engines.
#[derive(Debug, thiserror::Error)]
pub enum SettlementError {
    /// Caller input failed validation. Nothing was read or written.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// No redemption record has the presented code.
    #[error("redemption code not found")]
    CodeNotFound,

    /// The record exists but is not `Enabled`.
    #[error("redemption code already used or disabled")]
    CodeAlreadyUsed,

    /// The webhook signature did not verify. The payload was not parsed.
    #[error("untrusted event: {0}")]
    UntrustedEvent(#[from] SignatureError),

    /// The payload is authentic but not a decodable event.
    #[error("malformed event: {0}")]
    MalformedEvent(#[from] PaymentEventError),

    /// The redeeming user has no account to credit.
    #[error("no account for user {0}")]
    AccountNotFound(UserId),

    /// The paying customer's email matches no account.
    #[error("no account for customer email {email}")]
    UnknownCustomer {
        /// The email taken from the event.
        email: String,
    },

    /// The settlement inputs cannot produce a credit.
    #[error("settlement precondition failed: {0}")]
    PreconditionFailed(String),

    /// Storage failed during redemption or a code update. The transaction was
    /// rolled back, so retrying is safe.
    #[error("redemption failed: {0}")]
    RedemptionFailed(#[source] StoreError),

    /// Storage failed while crediting a payment. The transaction was rolled
    /// back and the provider will redeliver.
    #[error("credit failed: {0}")]
    CreditFailed(#[source] StoreError),

    /// Batch issuance stopped after persisting some codes.
    #[error("batch issuance stopped after {} codes: {source}", .issued.len())]
    PartialIssue {
        /// Codes persisted before the failure.
        issued: Vec<String>,
        /// The storage error that stopped the batch.
        source: StoreError,
    },
}

impl SettlementError {
    /// Whether the same request can be retried unchanged.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::RedemptionFailed(_) | Self::CreditFailed(_))
    }
}
