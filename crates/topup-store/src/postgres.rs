//! PostgreSQL storage implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

use topup_core::{
    AuditEntry, AuditSink, ModelError, ProcessedPaymentEvent, RedemptionId, RedemptionRecord,
    RedemptionStatus, UserAccount, UserId,
};

use crate::error::{Result, StoreError};
use crate::{Store, StoreTx};

const REDEMPTION_COLUMNS: &str =
    "id, user_id, name, code, status, quota, created_at, redeemed_at";

#[derive(Debug, FromRow)]
struct RedemptionRow {
    id: Uuid,
    user_id: Uuid,
    name: String,
    code: String,
    status: i16,
    quota: i64,
    created_at: DateTime<Utc>,
    redeemed_at: Option<DateTime<Utc>>,
}

impl TryFrom<RedemptionRow> for RedemptionRecord {
    type Error = ModelError;

    fn try_from(row: RedemptionRow) -> std::result::Result<Self, Self::Error> {
        Ok(Self {
            id: RedemptionId::from_uuid(row.id),
            owner_user_id: UserId::from_uuid(row.user_id),
            name: row.name,
            code: row.code,
            status: RedemptionStatus::from_code(row.status)?,
            quota_value: row.quota,
            created_at: row.created_at,
            redeemed_at: row.redeemed_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct AccountRow {
    id: Uuid,
    email: String,
    quota: i64,
    created_at: DateTime<Utc>,
}

impl From<AccountRow> for UserAccount {
    fn from(row: AccountRow) -> Self {
        Self {
            id: UserId::from_uuid(row.id),
            email: row.email,
            quota: row.quota,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct PaymentEventRow {
    event_id: String,
    event_type: String,
    user_id: Uuid,
    amount_minor: i64,
    quota: i64,
    processed_at: DateTime<Utc>,
}

impl From<PaymentEventRow> for ProcessedPaymentEvent {
    fn from(row: PaymentEventRow) -> Self {
        Self {
            event_id: row.event_id,
            event_type: row.event_type,
            user_id: UserId::from_uuid(row.user_id),
            amount_minor: row.amount_minor,
            quota: row.quota,
            processed_at: row.processed_at,
        }
    }
}

fn to_record(row: Option<RedemptionRow>) -> Result<Option<RedemptionRecord>> {
    row.map(RedemptionRecord::try_from)
        .transpose()
        .map_err(StoreError::from)
}

/// Escape `LIKE` wildcards so a keyword only matches literally.
fn escape_like(keyword: &str) -> String {
    let mut escaped = String::with_capacity(keyword.len());
    for c in keyword.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn to_i64(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// PostgreSQL-backed [`Store`].
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect to the database at `url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the pool cannot be created.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;
        Ok(Self { pool })
    }

    /// Wrap an existing pool.
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply the bundled schema migrations.
    ///
    /// # Errors
    ///
    /// Returns an error if a migration fails.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))
    }
}

#[async_trait]
impl Store for PgStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgTx { tx }))
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn insert_redemption(&self, record: &RedemptionRecord) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO redemptions (id, user_id, name, code, status, quota, created_at, redeemed_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ",
        )
        .bind(record.id.to_uuid())
        .bind(record.owner_user_id.as_uuid())
        .bind(&record.name)
        .bind(&record.code)
        .bind(record.status.as_code())
        .bind(record.quota_value)
        .bind(record.created_at)
        .bind(record.redeemed_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_redemption(&self, id: &RedemptionId) -> Result<Option<RedemptionRecord>> {
        let row = sqlx::query_as::<_, RedemptionRow>(&format!(
            "SELECT {REDEMPTION_COLUMNS} FROM redemptions WHERE id = $1"
        ))
        .bind(id.to_uuid())
        .fetch_optional(&self.pool)
        .await?;

        to_record(row)
    }

    async fn list_redemptions(
        &self,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<RedemptionRecord>> {
        let rows = sqlx::query_as::<_, RedemptionRow>(&format!(
            "SELECT {REDEMPTION_COLUMNS} FROM redemptions ORDER BY id DESC LIMIT $1 OFFSET $2"
        ))
        .bind(to_i64(limit))
        .bind(to_i64(offset))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| RedemptionRecord::try_from(row).map_err(StoreError::from))
            .collect()
    }

    async fn search_redemptions(&self, keyword: &str) -> Result<Vec<RedemptionRecord>> {
        let id = keyword.parse::<RedemptionId>().ok().map(|id| id.to_uuid());
        let pattern = format!("{}%", escape_like(keyword));

        let rows = sqlx::query_as::<_, RedemptionRow>(&format!(
            r"SELECT {REDEMPTION_COLUMNS} FROM redemptions
              WHERE id = $1 OR name LIKE $2 ESCAPE '\'
              ORDER BY id DESC"
        ))
        .bind(id)
        .bind(pattern)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| RedemptionRecord::try_from(row).map_err(StoreError::from))
            .collect()
    }

    async fn delete_redemption(&self, id: &RedemptionId) -> Result<()> {
        let result = sqlx::query("DELETE FROM redemptions WHERE id = $1")
            .bind(id.to_uuid())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::redemption_not_found(id));
        }
        Ok(())
    }

    async fn put_account(&self, account: &UserAccount) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO users (id, email, quota, created_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE SET email = EXCLUDED.email, quota = EXCLUDED.quota
            ",
        )
        .bind(account.id.as_uuid())
        .bind(&account.email)
        .bind(account.quota)
        .bind(account.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_account(&self, user_id: &UserId) -> Result<Option<UserAccount>> {
        let row = sqlx::query_as::<_, AccountRow>(
            "SELECT id, email, quota, created_at FROM users WHERE id = $1",
        )
        .bind(user_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(UserAccount::from))
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserId>> {
        let id: Option<Uuid> = sqlx::query_scalar("SELECT id FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        Ok(id.map(UserId::from_uuid))
    }

    async fn get_payment_event(&self, event_id: &str) -> Result<Option<ProcessedPaymentEvent>> {
        let row = sqlx::query_as::<_, PaymentEventRow>(
            r"
            SELECT event_id, event_type, user_id, amount_minor, quota, processed_at
            FROM payment_events
            WHERE event_id = $1
            ",
        )
        .bind(event_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(ProcessedPaymentEvent::from))
    }
}

/// A PostgreSQL transaction. Dropping it without committing rolls back.
struct PgTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTx for PgTx {
    async fn lock_redemption_by_code(&mut self, code: &str) -> Result<Option<RedemptionRecord>> {
        let row = sqlx::query_as::<_, RedemptionRow>(&format!(
            "SELECT {REDEMPTION_COLUMNS} FROM redemptions WHERE code = $1 FOR UPDATE"
        ))
        .bind(code)
        .fetch_optional(&mut *self.tx)
        .await?;

        to_record(row)
    }

    async fn lock_redemption(&mut self, id: &RedemptionId) -> Result<Option<RedemptionRecord>> {
        let row = sqlx::query_as::<_, RedemptionRow>(&format!(
            "SELECT {REDEMPTION_COLUMNS} FROM redemptions WHERE id = $1 FOR UPDATE"
        ))
        .bind(id.to_uuid())
        .fetch_optional(&mut *self.tx)
        .await?;

        to_record(row)
    }

    async fn save_redemption(&mut self, record: &RedemptionRecord) -> Result<()> {
        let result = sqlx::query(
            "UPDATE redemptions SET name = $2, status = $3, redeemed_at = $4 WHERE id = $1",
        )
        .bind(record.id.to_uuid())
        .bind(&record.name)
        .bind(record.status.as_code())
        .bind(record.redeemed_at)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::redemption_not_found(record.id));
        }
        Ok(())
    }

    async fn increment_quota(&mut self, user_id: &UserId, delta: i64) -> Result<()> {
        let result = sqlx::query("UPDATE users SET quota = quota + $2 WHERE id = $1")
            .bind(user_id.as_uuid())
            .bind(delta)
            .execute(&mut *self.tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::user_not_found(user_id));
        }
        Ok(())
    }

    async fn insert_payment_event(&mut self, event: &ProcessedPaymentEvent) -> Result<bool> {
        // A concurrent insert of the same id blocks here until the other
        // transaction finishes, then becomes a no-op if it committed.
        let result = sqlx::query(
            r"
            INSERT INTO payment_events (event_id, event_type, user_id, amount_minor, quota, processed_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (event_id) DO NOTHING
            ",
        )
        .bind(&event.event_id)
        .bind(&event.event_type)
        .bind(event.user_id.as_uuid())
        .bind(event.amount_minor)
        .bind(event.quota)
        .bind(event.processed_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}

/// Writes audit entries to the `audit_logs` table.
///
/// Inserts run on a spawned task so recording never blocks settlement. A
/// failed insert is logged and dropped.
#[derive(Clone)]
pub struct PgAuditSink {
    pool: PgPool,
}

impl PgAuditSink {
    /// Create a sink writing through `pool`.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl AuditSink for PgAuditSink {
    fn record(&self, entry: AuditEntry) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(user_id = %entry.user_id, "no runtime, audit entry dropped");
            return;
        };
        let pool = self.pool.clone();

        handle.spawn(async move {
            let result = sqlx::query(
                r"
                INSERT INTO audit_logs (user_id, category, message, recorded_at)
                VALUES ($1, $2, $3, $4)
                ",
            )
            .bind(entry.user_id.as_uuid())
            .bind(entry.category.as_str())
            .bind(&entry.message)
            .bind(entry.recorded_at)
            .execute(&pool)
            .await;

            if let Err(e) = result {
                tracing::warn!(user_id = %entry.user_id, error = %e, "failed to write audit entry");
            }
        });
    }
}
