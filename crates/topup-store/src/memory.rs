//! In-memory storage implementation.
//!
//! Tables live behind a single mutex that is only held for the duration of a
//! read or of the commit step, never across an `.await`. Row locks are
//! per-key `tokio` mutexes owned by the transaction that acquired them, and
//! writes are staged in the transaction until commit. This gives the same
//! lock-then-check semantics as PostgreSQL row locks within one process.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::OwnedMutexGuard;

use topup_core::{ProcessedPaymentEvent, RedemptionId, RedemptionRecord, UserAccount, UserId};

use crate::error::{Result, StoreError};
use crate::{Store, StoreTx};

/// A point at which [`MemoryStore`] can be told to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultPoint {
    /// [`Store::insert_redemption`].
    InsertRedemption,
    /// [`StoreTx::lock_redemption_by_code`] and [`StoreTx::lock_redemption`].
    LockRedemption,
    /// [`StoreTx::increment_quota`].
    IncrementQuota,
    /// [`StoreTx::save_redemption`].
    SaveRedemption,
    /// [`StoreTx::insert_payment_event`].
    InsertPaymentEvent,
    /// [`StoreTx::commit`].
    Commit,
}

#[derive(Default)]
struct Tables {
    redemptions: BTreeMap<RedemptionId, RedemptionRecord>,
    codes: HashMap<String, RedemptionId>,
    accounts: HashMap<UserId, UserAccount>,
    emails: HashMap<String, UserId>,
    payment_events: HashMap<String, ProcessedPaymentEvent>,
}

#[derive(Default)]
struct Inner {
    tables: Mutex<Tables>,
    row_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    faults: Mutex<Vec<(FaultPoint, usize)>>,
}

impl Inner {
    fn tables(&self) -> Result<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| StoreError::Database("memory store poisoned".into()))
    }

    /// Consume a matching fault, if one is armed and its skip count is spent.
    fn trip(&self, point: FaultPoint) -> Result<()> {
        let Ok(mut faults) = self.faults.lock() else {
            return Ok(());
        };
        let Some(index) = faults.iter().position(|(p, _)| *p == point) else {
            return Ok(());
        };
        if faults[index].1 > 0 {
            faults[index].1 -= 1;
            return Ok(());
        }
        faults.remove(index);
        Err(StoreError::Database(format!("injected fault at {point:?}")))
    }

    fn row_lock(&self, key: &str) -> Result<Arc<tokio::sync::Mutex<()>>> {
        let mut locks = self
            .row_locks
            .lock()
            .map_err(|_| StoreError::Database("memory store poisoned".into()))?;
        Ok(locks.entry(key.to_string()).or_default().clone())
    }

    /// Forget the lock for `key` once nobody holds or awaits it.
    ///
    /// Handles are only cloned under the map lock, so a strong count of one
    /// means the map's own handle is the last.
    fn release_row_lock(&self, key: &str) {
        let Ok(mut locks) = self.row_locks.lock() else {
            return;
        };
        if locks.get(key).is_some_and(|lock| Arc::strong_count(lock) == 1) {
            locks.remove(key);
        }
    }
}

fn redemption_key(id: &RedemptionId) -> String {
    format!("redemption:{id}")
}

fn payment_event_key(event_id: &str) -> String {
    format!("payment_event:{event_id}")
}

/// In-memory [`Store`] implementation.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm a one-shot failure at `point`, skipping the first `skip` passes.
    pub fn inject_fault(&self, point: FaultPoint, skip: usize) {
        if let Ok(mut faults) = self.inner.faults.lock() {
            faults.push((point, skip));
        }
    }

    /// Number of stored redemption records.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is poisoned.
    pub fn redemption_count(&self) -> Result<usize> {
        Ok(self.inner.tables()?.redemptions.len())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>> {
        Ok(Box::new(MemoryTx {
            inner: Arc::clone(&self.inner),
            guards: HashMap::new(),
            quota_deltas: Vec::new(),
            record_writes: HashMap::new(),
            payment_events: Vec::new(),
        }))
    }

    async fn ping(&self) -> Result<()> {
        self.inner.tables().map(|_| ())
    }

    async fn insert_redemption(&self, record: &RedemptionRecord) -> Result<()> {
        self.inner.trip(FaultPoint::InsertRedemption)?;
        let mut tables = self.inner.tables()?;

        if tables.redemptions.contains_key(&record.id) || tables.codes.contains_key(&record.code) {
            return Err(StoreError::Duplicate(format!("redemption {}", record.id)));
        }
        tables.codes.insert(record.code.clone(), record.id);
        tables.redemptions.insert(record.id, record.clone());
        Ok(())
    }

    async fn get_redemption(&self, id: &RedemptionId) -> Result<Option<RedemptionRecord>> {
        Ok(self.inner.tables()?.redemptions.get(id).cloned())
    }

    async fn list_redemptions(
        &self,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<RedemptionRecord>> {
        let tables = self.inner.tables()?;
        Ok(tables
            .redemptions
            .values()
            .rev()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn search_redemptions(&self, keyword: &str) -> Result<Vec<RedemptionRecord>> {
        let id = keyword.parse::<RedemptionId>().ok();
        let tables = self.inner.tables()?;
        Ok(tables
            .redemptions
            .values()
            .filter(|r| Some(r.id) == id || r.name.starts_with(keyword))
            .cloned()
            .collect())
    }

    async fn delete_redemption(&self, id: &RedemptionId) -> Result<()> {
        // Wait for any in-flight redemption of this row to finish.
        let key = redemption_key(id);
        let guard = self.inner.row_lock(&key)?.lock_owned().await;

        let removed = self.inner.tables().map(|mut tables| {
            let record = tables.redemptions.remove(id)?;
            tables.codes.remove(&record.code);
            Some(record)
        });
        drop(guard);
        self.inner.release_row_lock(&key);

        match removed? {
            Some(_) => Ok(()),
            None => Err(StoreError::redemption_not_found(id)),
        }
    }

    async fn put_account(&self, account: &UserAccount) -> Result<()> {
        let mut tables = self.inner.tables()?;

        if let Some(owner) = tables.emails.get(&account.email) {
            if *owner != account.id {
                return Err(StoreError::Duplicate(format!("email {}", account.email)));
            }
        }
        if let Some(previous) = tables.accounts.insert(account.id, account.clone()) {
            tables.emails.remove(&previous.email);
        }
        tables.emails.insert(account.email.clone(), account.id);
        Ok(())
    }

    async fn get_account(&self, user_id: &UserId) -> Result<Option<UserAccount>> {
        Ok(self.inner.tables()?.accounts.get(user_id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserId>> {
        Ok(self.inner.tables()?.emails.get(email).copied())
    }

    async fn get_payment_event(&self, event_id: &str) -> Result<Option<ProcessedPaymentEvent>> {
        Ok(self.inner.tables()?.payment_events.get(event_id).cloned())
    }
}

/// A transaction against a [`MemoryStore`].
struct MemoryTx {
    inner: Arc<Inner>,
    /// Row locks held until commit or drop, by key.
    guards: HashMap<String, OwnedMutexGuard<()>>,
    quota_deltas: Vec<(UserId, i64)>,
    record_writes: HashMap<RedemptionId, RedemptionRecord>,
    payment_events: Vec<ProcessedPaymentEvent>,
}

impl MemoryTx {
    /// Acquire the row lock for `key` unless this transaction already holds it.
    async fn acquire(&mut self, key: String) -> Result<()> {
        if self.guards.contains_key(&key) {
            return Ok(());
        }
        let lock = self.inner.row_lock(&key)?;
        let guard = lock.lock_owned().await;
        self.guards.insert(key, guard);
        Ok(())
    }

    /// Read a record as this transaction sees it.
    fn read_record(&self, id: &RedemptionId) -> Result<Option<RedemptionRecord>> {
        if let Some(staged) = self.record_writes.get(id) {
            return Ok(Some(staged.clone()));
        }
        Ok(self.inner.tables()?.redemptions.get(id).cloned())
    }
}

impl Drop for MemoryTx {
    fn drop(&mut self) {
        for (key, guard) in self.guards.drain() {
            drop(guard);
            self.inner.release_row_lock(&key);
        }
    }
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn lock_redemption_by_code(&mut self, code: &str) -> Result<Option<RedemptionRecord>> {
        self.inner.trip(FaultPoint::LockRedemption)?;
        let id = self.inner.tables()?.codes.get(code).copied();
        let Some(id) = id else {
            return Ok(None);
        };

        self.acquire(redemption_key(&id)).await?;
        // Re-read under the lock: the row may have changed or been deleted
        // while this transaction was waiting.
        self.read_record(&id)
    }

    async fn lock_redemption(&mut self, id: &RedemptionId) -> Result<Option<RedemptionRecord>> {
        self.inner.trip(FaultPoint::LockRedemption)?;
        let exists = self.inner.tables()?.redemptions.contains_key(id);
        if !exists {
            return Ok(None);
        }

        self.acquire(redemption_key(id)).await?;
        self.read_record(id)
    }

    async fn save_redemption(&mut self, record: &RedemptionRecord) -> Result<()> {
        self.inner.trip(FaultPoint::SaveRedemption)?;
        if !self.guards.contains_key(&redemption_key(&record.id)) {
            return Err(StoreError::Database(format!(
                "redemption {} saved without holding its lock",
                record.id
            )));
        }
        if self.read_record(&record.id)?.is_none() {
            return Err(StoreError::redemption_not_found(record.id));
        }
        self.record_writes.insert(record.id, record.clone());
        Ok(())
    }

    async fn increment_quota(&mut self, user_id: &UserId, delta: i64) -> Result<()> {
        self.inner.trip(FaultPoint::IncrementQuota)?;
        let exists = self.inner.tables()?.accounts.contains_key(user_id);
        if !exists {
            return Err(StoreError::user_not_found(user_id));
        }
        self.quota_deltas.push((*user_id, delta));
        Ok(())
    }

    async fn insert_payment_event(&mut self, event: &ProcessedPaymentEvent) -> Result<bool> {
        self.inner.trip(FaultPoint::InsertPaymentEvent)?;
        self.acquire(payment_event_key(&event.event_id)).await?;

        let already_committed = self
            .inner
            .tables()?
            .payment_events
            .contains_key(&event.event_id);
        let already_staged = self
            .payment_events
            .iter()
            .any(|e| e.event_id == event.event_id);
        if already_committed || already_staged {
            return Ok(false);
        }
        self.payment_events.push(event.clone());
        Ok(true)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.inner.trip(FaultPoint::Commit)?;
        let mut tables = self.inner.tables()?;

        // Validate every increment before applying any of them, so a failure
        // leaves the tables untouched.
        let mut balances: HashMap<UserId, i64> = HashMap::new();
        for (user_id, delta) in &self.quota_deltas {
            let current = match balances.get(user_id) {
                Some(balance) => *balance,
                None => tables
                    .accounts
                    .get(user_id)
                    .map(|a| a.quota)
                    .ok_or_else(|| StoreError::user_not_found(user_id))?,
            };
            let next = current
                .checked_add(*delta)
                .ok_or_else(|| StoreError::Database(format!("quota overflow for {user_id}")))?;
            balances.insert(*user_id, next);
        }
        for id in self.record_writes.keys() {
            if !tables.redemptions.contains_key(id) {
                return Err(StoreError::redemption_not_found(id));
            }
        }

        for (user_id, balance) in balances {
            if let Some(account) = tables.accounts.get_mut(&user_id) {
                account.quota = balance;
            }
        }
        for (id, record) in &self.record_writes {
            tables.redemptions.insert(*id, record.clone());
        }
        for event in &self.payment_events {
            tables
                .payment_events
                .insert(event.event_id.clone(), event.clone());
        }
        drop(tables);

        tracing::trace!(locks = self.guards.len(), "memory transaction committed");
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        tracing::trace!(locks = self.guards.len(), "memory transaction rolled back");
        Ok(())
    }
}
