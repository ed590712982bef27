//! Administrative changes to redemption records.

use topup_core::{
    AuditEntry, LogCategory, RedemptionId, RedemptionRecord, RedemptionStatus, UserId,
    MAX_BATCH_NAME_CHARS,
};

use super::{abort, Result, RedemptionEngine, SettlementError};

/// Which fields an update may touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateMode {
    /// Only `status` changes.
    StatusOnly,
    /// Only `name` changes.
    Details,
}

/// A requested change to one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedemptionUpdate {
    /// The record to change.
    pub id: RedemptionId,
    /// New batch name.
    pub name: Option<String>,
    /// New status, honored in [`UpdateMode::StatusOnly`].
    pub status: Option<RedemptionStatus>,
    /// Quota value as the caller believes it to be. Any other value is
    /// rejected; quota never changes after issue.
    pub quota_value: Option<i64>,
}

impl RedemptionEngine {
    /// Apply an administrative update under the record's row lock.
    ///
    /// # Errors
    ///
    /// - `CodeNotFound` if the record doesn't exist
    /// - `InvalidInput` for a missing status, bad name or changed quota
    /// - `PreconditionFailed` for a status change the state machine forbids
    /// - `RedemptionFailed` if storage fails
    #[tracing::instrument(skip_all, fields(redemption_id = %update.id, mode = ?mode))]
    pub async fn update(
        &self,
        update: RedemptionUpdate,
        mode: UpdateMode,
        admin_id: UserId,
    ) -> Result<RedemptionRecord> {
        let mut tx = self
            .store
            .begin()
            .await
            .map_err(SettlementError::RedemptionFailed)?;

        let mut record = match tx.lock_redemption(&update.id).await {
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

        if let Err(e) = apply_update(&mut record, &update, mode) {
            abort(tx).await;
            return Err(e);
        }
        if let Err(e) = tx.save_redemption(&record).await {
            abort(tx).await;
            return Err(SettlementError::RedemptionFailed(e));
        }
        tx.commit()
            .await
            .map_err(SettlementError::RedemptionFailed)?;

        tracing::info!(status = %record.status, name = %record.name, "Redemption updated");
        self.audit.record(AuditEntry::new(
            admin_id,
            LogCategory::Manage,
            format!(
                "Updated redemption {}: name {}, status {}",
                record.id, record.name, record.status
            ),
        ));

        Ok(record)
    }

    /// Delete a record. Waits for any in-flight redemption of it to finish.
    ///
    /// # Errors
    ///
    /// - `CodeNotFound` if the record doesn't exist
    /// - `RedemptionFailed` if storage fails
    #[tracing::instrument(skip_all, fields(redemption_id = %id))]
    pub async fn delete(&self, id: &RedemptionId, admin_id: UserId) -> Result<()> {
        self.store.delete_redemption(id).await.map_err(|e| match e {
            topup_store::StoreError::NotFound { .. } => SettlementError::CodeNotFound,
            other => SettlementError::RedemptionFailed(other),
        })?;

        tracing::info!("Redemption deleted");
        self.audit.record(AuditEntry::new(
            admin_id,
            LogCategory::Manage,
            format!("Deleted redemption {id}"),
        ));
        Ok(())
    }
}

fn apply_update(
    record: &mut RedemptionRecord,
    update: &RedemptionUpdate,
    mode: UpdateMode,
) -> Result<()> {
    match mode {
        UpdateMode::StatusOnly => {
            let status = update
                .status
                .ok_or_else(|| SettlementError::InvalidInput("status is required".into()))?;
            record
                .apply_admin_status(status)
                .map_err(|e| SettlementError::PreconditionFailed(e.to_string()))
        }
        UpdateMode::Details => {
            if let Some(quota) = update.quota_value {
                if quota != record.quota_value {
                    return Err(SettlementError::InvalidInput(
                        "quota value cannot be changed after issue".into(),
                    ));
                }
            }
            if let Some(name) = &update.name {
                let length = name.chars().count();
                if length == 0 || length > MAX_BATCH_NAME_CHARS {
                    return Err(SettlementError::InvalidInput(format!(
                        "name must be between 1 and {MAX_BATCH_NAME_CHARS} characters"
                    )));
                }
                record.name.clone_from(name);
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> RedemptionRecord {
        RedemptionRecord::issue(UserId::generate(), "promo", 100)
    }

    fn update(record: &RedemptionRecord) -> RedemptionUpdate {
        RedemptionUpdate {
            id: record.id,
            name: None,
            status: None,
            quota_value: None,
        }
    }

    #[test]
    fn details_update_renames() {
        let mut record = record();
        let mut change = update(&record);
        change.name = Some("renamed".into());
        change.quota_value = Some(100);
        change.status = Some(RedemptionStatus::Disabled);

        apply_update(&mut record, &change, UpdateMode::Details).unwrap();
        assert_eq!(record.name, "renamed");
        assert_eq!(record.status, RedemptionStatus::Enabled);
    }

    #[test]
    fn details_update_rejects_quota_change() {
        let mut record = record();
        let mut change = update(&record);
        change.quota_value = Some(999);

        let err = apply_update(&mut record, &change, UpdateMode::Details).unwrap_err();
        assert!(matches!(err, SettlementError::InvalidInput(_)));
        assert_eq!(record.quota_value, 100);
    }

    #[test]
    fn status_only_requires_status() {
        let mut record = record();
        let change = update(&record);
        let err = apply_update(&mut record, &change, UpdateMode::StatusOnly).unwrap_err();
        assert!(matches!(err, SettlementError::InvalidInput(_)));
    }

    #[test]
    fn status_only_rejects_forbidden_transition() {
        let mut record = record();
        let mut change = update(&record);
        change.status = Some(RedemptionStatus::Used);
        let err = apply_update(&mut record, &change, UpdateMode::StatusOnly).unwrap_err();
        assert!(matches!(err, SettlementError::PreconditionFailed(_)));
    }
}
