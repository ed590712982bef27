//! Batch issuance of redemption codes.

use topup_core::{BatchSpec, RedemptionRecord, UserId};

use super::{Result, RedemptionEngine, SettlementError};

impl RedemptionEngine {
    /// Issue `spec.count` fresh codes and return them in creation order.
    ///
    /// Each record is persisted on its own, so a storage failure partway
    /// leaves the earlier codes in place; they are returned inside
    /// `PartialIssue`.
    ///
    /// # Errors
    ///
    /// - `InvalidInput` if the name or count is out of bounds; nothing is
    ///   persisted
    /// - `PartialIssue` if storage fails after validation
    #[tracing::instrument(skip_all, fields(name = %spec.name, count = spec.count))]
    pub async fn issue_batch(&self, spec: &BatchSpec, issuer: UserId) -> Result<Vec<String>> {
        spec.validate()
            .map_err(|e| SettlementError::InvalidInput(e.to_string()))?;
        if issuer.is_nil() {
            return Err(SettlementError::InvalidInput("issuer id is nil".into()));
        }

        let mut issued = Vec::with_capacity(usize::try_from(spec.count).unwrap_or_default());
        for _ in 0..spec.count {
            let record = RedemptionRecord::issue(issuer, &spec.name, spec.quota_value);
            if let Err(source) = self.store.insert_redemption(&record).await {
                tracing::error!(issued = issued.len(), error = %source, "Batch issuance failed");
                return Err(SettlementError::PartialIssue { issued, source });
            }
            issued.push(record.code);
        }

        tracing::info!(issuer = %issuer, "Redemption batch issued");
        Ok(issued)
    }
}
