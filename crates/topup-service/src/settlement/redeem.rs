//! Code redemption.

use std::sync::Arc;

use chrono::Utc;
use topup_core::{format_quota, AuditEntry, AuditSink, LogCategory, RedemptionRecord, UserId};
use topup_store::{Store, StoreError, StoreTx};

use super::{abort, Result, SettlementError};
use crate::config::SettlementConfig;

/// Redeems codes and manages redemption records.
#[derive(Clone)]
pub struct RedemptionEngine {
    pub(super) store: Arc<dyn Store>,
    pub(super) audit: Arc<dyn AuditSink>,
    pub(super) config: SettlementConfig,
}

impl RedemptionEngine {
    /// Create an engine over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, audit: Arc<dyn AuditSink>, config: SettlementConfig) -> Self {
        Self {
            store,
            audit,
            config,
        }
    }

    /// Redeem `code` for `user_id` and return the credited quota.
    ///
    /// The record is locked for the whole transaction, so concurrent attempts
    /// on one code are serialized and exactly one of them sees it `Enabled`.
    ///
    /// # Errors
    ///
    /// - `InvalidInput` for an empty code or nil user
    /// - `CodeNotFound` if no record has this code
    /// - `CodeAlreadyUsed` if the record is `Used` or `Disabled`
    /// - `AccountNotFound` if `user_id` has no account
    /// - `RedemptionFailed` if storage fails; nothing was written
    #[tracing::instrument(skip_all, fields(user_id = %user_id))]
    pub async fn redeem(&self, code: &str, user_id: UserId) -> Result<i64> {
        if code.is_empty() {
            return Err(SettlementError::InvalidInput("redemption code is empty".into()));
        }
        if user_id.is_nil() {
            return Err(SettlementError::InvalidInput("user id is nil".into()));
        }

        let mut tx = self
            .store
            .begin()
            .await
            .map_err(SettlementError::RedemptionFailed)?;

        let mut record = match tx.lock_redemption_by_code(code).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                abort(tx).await;
                return Err(SettlementError::CodeNotFound);
            }
            Err(e) => {
                abort(tx).await;
                return Err(SettlementError::RedemptionFailed(e));
            }
        };

        if !record.is_redeemable() {
            tracing::info!(
                redemption_id = %record.id,
                status = %record.status,
                "Code is not redeemable"
            );
            abort(tx).await;
            return Err(SettlementError::CodeAlreadyUsed);
        }

        if let Err(e) = credit_and_mark_used(tx.as_mut(), &mut record, user_id).await {
            abort(tx).await;
            return Err(e);
        }
        tx.commit()
            .await
            .map_err(SettlementError::RedemptionFailed)?;

        let quota = record.quota_value;
        tracing::info!(
            redemption_id = %record.id,
            quota = %quota,
            "Redemption code redeemed"
        );
        self.audit.record(AuditEntry::new(
            user_id,
            LogCategory::Topup,
            format!(
                "Top-up via redemption code: {}",
                format_quota(
                    quota,
                    self.config.quota_per_unit,
                    self.config.display_in_currency
                )
            ),
        ));

        Ok(quota)
    }
}

async fn credit_and_mark_used(
    tx: &mut dyn StoreTx,
    record: &mut RedemptionRecord,
    user_id: UserId,
) -> Result<()> {
    tx.increment_quota(&user_id, record.quota_value)
        .await
        .map_err(|e| match e {
            StoreError::NotFound { entity: "user", .. } => SettlementError::AccountNotFound(user_id),
            e => SettlementError::RedemptionFailed(e),
        })?;

    record
        .mark_redeemed(Utc::now())
        .map_err(|_| SettlementError::CodeAlreadyUsed)?;

    tx.save_redemption(record)
        .await
        .map_err(SettlementError::RedemptionFailed)
}
