//! Error types for top-up storage.

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur in storage operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Database operation failed.
    #[error("database error: {0}")]
    Database(String),

    /// A stored row could not be mapped to a domain value.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Record not found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// The kind of record.
        entity: &'static str,
        /// The key that was looked up.
        id: String,
    },

    /// A unique key already exists.
    #[error("duplicate key: {0}")]
    Duplicate(String),
}

impl StoreError {
    /// Shorthand for a missing user account.
    #[must_use]
    pub fn user_not_found(id: impl ToString) -> Self {
        Self::NotFound {
            entity: "user",
            id: id.to_string(),
        }
    }

    /// Shorthand for a missing redemption record.
    #[must_use]
    pub fn redemption_not_found(id: impl ToString) -> Self {
        Self::NotFound {
            entity: "redemption",
            id: id.to_string(),
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                Self::Duplicate(db.message().to_string())
            }
            _ => Self::Database(err.to_string()),
        }
    }
}

impl From<topup_core::ModelError> for StoreError {
    fn from(err: topup_core::ModelError) -> Self {
        Self::Serialization(err.to_string())
    }
}
