//! Audit log contract.
//!
//! Settlement appends a human-readable entry after every credit. Entries are
//! best-effort and are not part of the transaction that moved the quota.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::UserId;

/// Audit log category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogCategory {
    /// Quota credited to a user.
    Topup,
    /// Administrative change to redemption codes.
    Manage,
}

impl LogCategory {
    /// Get the category name as a string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Topup => "topup",
            Self::Manage => "manage",
        }
    }
}

/// One audit log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// The user the entry is about.
    pub user_id: UserId,
    /// Entry category.
    pub category: LogCategory,
    /// Human-readable message.
    pub message: String,
    /// When the entry was produced.
    pub recorded_at: DateTime<Utc>,
}

impl AuditEntry {
    /// Create an entry stamped with the current time.
    #[must_use]
    pub fn new(user_id: UserId, category: LogCategory, message: impl Into<String>) -> Self {
        Self {
            user_id,
            category,
            message: message.into(),
            recorded_at: Utc::now(),
        }
    }
}

/// Append-only audit log sink. Implementations must not block the caller
/// and must swallow their own failures.
pub trait AuditSink: Send + Sync {
    /// Append an entry.
    fn record(&self, entry: AuditEntry);
}

/// Sink that keeps entries in memory.
#[derive(Debug, Default)]
pub struct RecordingAuditSink {
    entries: Mutex<Vec<AuditEntry>>,
}

impl RecordingAuditSink {
    /// Create an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the recorded entries.
    #[must_use]
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }
}

impl AuditSink for RecordingAuditSink {
    fn record(&self, entry: AuditEntry) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(entry);
        }
    }
}
