//! User account view.
//!
//! Accounts are owned by the wider user system. This service only reads the
//! email for payment resolution and increments `quota`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::UserId;

/// A user account as seen by the top-up service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAccount {
    /// The user ID.
    pub id: UserId,

    /// Account email, used to resolve payment customers.
    pub email: String,

    /// Spendable quota balance.
    pub quota: i64,

    /// When the account was created.
    pub created_at: DateTime<Utc>,
}

impl UserAccount {
    /// Create a new account with zero quota.
    #[must_use]
    pub fn new(id: UserId, email: impl Into<String>) -> Self {
        Self {
            id,
            email: email.into(),
            quota: 0,
            created_at: Utc::now(),
        }
    }

    /// Set the starting balance.
    #[must_use]
    pub fn with_quota(mut self, quota: i64) -> Self {
        self.quota = quota;
        self
    }
}
