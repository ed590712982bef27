//! Transactional storage layer for the top-up service.
//!
//! This crate persists redemption codes, user quota balances, and processed
//! payment events. Two backends implement the same contract:
//!
//! - [`PgStore`]: PostgreSQL via `sqlx`; row locks are `SELECT ... FOR UPDATE`.
//! - [`MemoryStore`]: in-process tables with per-row async mutexes, for tests
//!   and single-process deployments.
//!
//! # Transactions
//!
//! Settlement runs inside a [`StoreTx`]. Locks taken by a transaction are held
//! until [`StoreTx::commit`] or [`StoreTx::rollback`]; dropping an uncommitted
//! transaction rolls it back. Quota is only ever changed through
//! [`StoreTx::increment_quota`], which is a single atomic increment.
//!
//! # Example
//!
//! ```no_run
//! use topup_core::{RedemptionRecord, UserAccount, UserId};
//! use topup_store::{MemoryStore, Store};
//!
//! # async fn run() -> topup_store::Result<()> {
//! let store = MemoryStore::new();
//! let user_id = UserId::generate();
//! store.put_account(&UserAccount::new(user_id, "a@example.com")).await?;
//!
//! let record = RedemptionRecord::issue(user_id, "promo", 100);
//! store.insert_redemption(&record).await?;
//!
//! let mut tx = store.begin().await?;
//! if let Some(locked) = tx.lock_redemption_by_code(&record.code).await? {
//!     tx.increment_quota(&user_id, locked.quota_value).await?;
//! }
//! tx.commit().await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod memory;
pub mod postgres;

use async_trait::async_trait;

pub use error::{Result, StoreError};
pub use memory::{FaultPoint, MemoryStore};
pub use postgres::{PgAuditSink, PgStore};

use topup_core::{ProcessedPaymentEvent, RedemptionId, RedemptionRecord, UserAccount, UserId};

/// The storage trait defining all non-transactional operations and the
/// entry point for transactions.
#[async_trait]
pub trait Store: Send + Sync {
    /// Begin a transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if a connection cannot be acquired.
    async fn begin(&self) -> Result<Box<dyn StoreTx>>;

    /// Check that the backend is reachable.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot serve a query.
    async fn ping(&self) -> Result<()>;

    // =========================================================================
    // Redemption Records
    // =========================================================================

    /// Insert a new redemption record.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Duplicate` if the id or code already exists.
    async fn insert_redemption(&self, record: &RedemptionRecord) -> Result<()>;

    /// Get a redemption record by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn get_redemption(&self, id: &RedemptionId) -> Result<Option<RedemptionRecord>>;

    /// List redemption records, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn list_redemptions(&self, limit: usize, offset: usize)
        -> Result<Vec<RedemptionRecord>>;

    /// Find records whose id equals `keyword` or whose name starts with it.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn search_redemptions(&self, keyword: &str) -> Result<Vec<RedemptionRecord>>;

    /// Delete a redemption record.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the record doesn't exist.
    async fn delete_redemption(&self, id: &RedemptionId) -> Result<()>;

    // =========================================================================
    // User Accounts
    // =========================================================================

    /// Insert or replace a user account.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Duplicate` if another account uses the email.
    async fn put_account(&self, account: &UserAccount) -> Result<()>;

    /// Get a user account by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn get_account(&self, user_id: &UserId) -> Result<Option<UserAccount>>;

    /// Resolve an account email to its user ID (exact match).
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserId>>;

    // =========================================================================
    // Payment Events
    // =========================================================================

    /// Get a processed payment event by provider event ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn get_payment_event(&self, event_id: &str) -> Result<Option<ProcessedPaymentEvent>>;
}

/// An open transaction.
#[async_trait]
pub trait StoreTx: Send {
    /// Lock the record with this exact code for the rest of the transaction.
    ///
    /// Returns `None` without locking anything when no record matches.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn lock_redemption_by_code(&mut self, code: &str) -> Result<Option<RedemptionRecord>>;

    /// Lock the record with this ID for the rest of the transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn lock_redemption(&mut self, id: &RedemptionId) -> Result<Option<RedemptionRecord>>;

    /// Persist the mutable fields (`name`, `status`, `redeemed_at`) of a record
    /// previously locked by this transaction.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the record doesn't exist.
    async fn save_redemption(&mut self, record: &RedemptionRecord) -> Result<()>;

    /// Atomically add `delta` to the user's quota.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the account doesn't exist.
    async fn increment_quota(&mut self, user_id: &UserId, delta: i64) -> Result<()>;

    /// Record a credited payment event.
    ///
    /// Returns `false` if the event ID was already recorded, in which case
    /// nothing was written.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn insert_payment_event(&mut self, event: &ProcessedPaymentEvent) -> Result<bool>;

    /// Commit every write and release every lock.
    ///
    /// # Errors
    ///
    /// Returns an error if the commit fails; nothing was written in that case.
    async fn commit(self: Box<Self>) -> Result<()>;

    /// Discard every write and release every lock.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails to roll back cleanly.
    async fn rollback(self: Box<Self>) -> Result<()>;
}
