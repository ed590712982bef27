//! Error types for the top-up domain model.

use crate::ids::IdError;
use crate::redemption::RedemptionStatus;

/// Result type for domain model operations.
pub type Result<T> = std::result::Result<T, ModelError>;

/// Errors raised by domain model validation and state transitions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    /// Invalid identifier.
    #[error("invalid identifier: {0}")]
    InvalidId(#[from] IdError),

    /// A stored status code that maps to no known status.
    #[error("unknown redemption status code: {0}")]
    UnknownStatus(i16),

    /// A status change the redemption state machine does not allow.
    #[error("invalid status transition from {from} to {to}")]
    InvalidTransition {
        /// The current status.
        from: RedemptionStatus,
        /// The requested status.
        to: RedemptionStatus,
    },

    /// Batch name is empty or too long.
    #[error("batch name must be between 1 and {max} characters, got {length}")]
    InvalidBatchName {
        /// Length of the supplied name in characters.
        length: usize,
        /// Maximum accepted length.
        max: usize,
    },

    /// Batch size outside the accepted range.
    #[error("batch count must be between 1 and {max}, got {count}")]
    InvalidBatchCount {
        /// The requested count.
        count: i64,
        /// Maximum accepted count.
        max: i64,
    },
}
