//! Redemption code records and their state machine.
//!
//! A redemption record is a prepaid code worth a fixed quota value. It is
//! created `Enabled`, moves to `Used` exactly once when a user redeems it, and
//! can be `Disabled` by an administrator.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};
use crate::{RedemptionId, UserId};

// ============================================================================
// Constants
// ============================================================================

/// Maximum batch name length, in characters.
pub const MAX_BATCH_NAME_CHARS: usize = 20;

/// Maximum number of codes issued by a single batch.
pub const MAX_BATCH_COUNT: i64 = 100;

/// Length of a generated code (UUID v4 in simple hex form).
pub const CODE_LENGTH: usize = 32;

/// Lifecycle status of a redemption code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RedemptionStatus {
    /// The code can be redeemed.
    Enabled,
    /// The code was withdrawn by an administrator.
    Disabled,
    /// The code has been redeemed.
    Used,
}

impl RedemptionStatus {
    /// Stable numeric code used by the storage layer.
    #[must_use]
    pub const fn as_code(self) -> i16 {
        match self {
            Self::Enabled => 1,
            Self::Disabled => 2,
            Self::Used => 3,
        }
    }

    /// Parse a stored numeric code.
    ///
    /// # Errors
    ///
    /// Returns `ModelError::UnknownStatus` for codes outside 1..=3.
    pub const fn from_code(code: i16) -> Result<Self> {
        match code {
            1 => Ok(Self::Enabled),
            2 => Ok(Self::Disabled),
            3 => Ok(Self::Used),
            other => Err(ModelError::UnknownStatus(other)),
        }
    }

    /// Get the status name as a string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Enabled => "enabled",
            Self::Disabled => "disabled",
            Self::Used => "used",
        }
    }
}

impl fmt::Display for RedemptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted redemption code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedemptionRecord {
    /// Record identifier.
    pub id: RedemptionId,

    /// The administrator who issued the batch. Not the redeemer.
    pub owner_user_id: UserId,

    /// Batch name shared by every code of the batch.
    pub name: String,

    /// The opaque code presented by the redeeming user.
    pub code: String,

    /// Current lifecycle status.
    pub status: RedemptionStatus,

    /// Quota credited on redemption.
    pub quota_value: i64,

    /// When the record was issued.
    pub created_at: DateTime<Utc>,

    /// When the record was redeemed. Written once, at the `Used` transition.
    pub redeemed_at: Option<DateTime<Utc>>,
}

impl RedemptionRecord {
    /// Create a new, redeemable record with a freshly generated code.
    #[must_use]
    pub fn issue(owner_user_id: UserId, name: &str, quota_value: i64) -> Self {
        Self {
            id: RedemptionId::generate(),
            owner_user_id,
            name: name.to_string(),
            code: generate_code(),
            status: RedemptionStatus::Enabled,
            quota_value,
            created_at: Utc::now(),
            redeemed_at: None,
        }
    }

    /// Whether the code can currently be redeemed.
    #[must_use]
    pub fn is_redeemable(&self) -> bool {
        self.status == RedemptionStatus::Enabled
    }

    /// Apply the `Enabled -> Used` transition.
    ///
    /// # Errors
    ///
    /// Returns `ModelError::InvalidTransition` unless the record is `Enabled`.
    pub fn mark_redeemed(&mut self, at: DateTime<Utc>) -> Result<()> {
        if self.status != RedemptionStatus::Enabled {
            return Err(ModelError::InvalidTransition {
                from: self.status,
                to: RedemptionStatus::Used,
            });
        }
        self.status = RedemptionStatus::Used;
        self.redeemed_at = Some(at);
        Ok(())
    }

    /// Apply an administrative status change.
    ///
    /// Allowed: `Enabled -> Disabled`, `Used -> Disabled` (the redemption
    /// timestamp is kept), and `Disabled -> Enabled` for codes that were never
    /// redeemed. Setting the current status again is a no-op. `Used` can only
    /// be reached through [`RedemptionRecord::mark_redeemed`].
    ///
    /// # Errors
    ///
    /// Returns `ModelError::InvalidTransition` for any other change.
    pub fn apply_admin_status(&mut self, to: RedemptionStatus) -> Result<()> {
        let allowed = match (self.status, to) {
            (from, to) if from == to => true,
            (RedemptionStatus::Enabled | RedemptionStatus::Used, RedemptionStatus::Disabled) => {
                true
            }
            (RedemptionStatus::Disabled, RedemptionStatus::Enabled) => self.redeemed_at.is_none(),
            _ => false,
        };

        if !allowed {
            return Err(ModelError::InvalidTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }
}

/// Generate an unguessable code: 122 random bits rendered as 32 hex chars.
#[must_use]
pub fn generate_code() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Parameters of a batch issuance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSpec {
    /// Batch name, 1 to 20 characters.
    pub name: String,
    /// Number of codes, 1 to 100.
    pub count: i64,
    /// Quota credited by each code.
    pub quota_value: i64,
}

impl BatchSpec {
    /// Check the name and count bounds.
    ///
    /// # Errors
    ///
    /// Returns `ModelError::InvalidBatchName` or `ModelError::InvalidBatchCount`.
    pub fn validate(&self) -> Result<()> {
        let length = self.name.chars().count();
        if length == 0 || length > MAX_BATCH_NAME_CHARS {
            return Err(ModelError::InvalidBatchName {
                length,
                max: MAX_BATCH_NAME_CHARS,
            });
        }
        if !(1..=MAX_BATCH_COUNT).contains(&self.count) {
            return Err(ModelError::InvalidBatchCount {
                count: self.count,
                max: MAX_BATCH_COUNT,
            });
        }
        Ok(())
    }
}
