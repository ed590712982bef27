//! Payment webhook settlement.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use topup_core::{
    format_quota, to_quota, AuditEntry, AuditSink, CheckoutSession, EventEnvelope, LogCategory,
    PaymentEvent, ProcessedPaymentEvent, UserId,
};
use topup_store::{Store, StoreTx};

use super::{abort, Result, SettlementError};
use crate::config::SettlementConfig;
use crate::stripe::verify_signature;

/// What a verified webhook delivery did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum EventOutcome {
    /// The user's quota was credited.
    Credited {
        /// Provider event ID.
        event_id: String,
        /// The credited user.
        user_id: UserId,
        /// Quota credited.
        quota: i64,
        /// Amount paid, in minor units.
        amount_minor: i64,
    },
    /// The event needs no action.
    Ignored {
        /// Provider event ID.
        event_id: String,
        /// Provider event type.
        event_type: String,
    },
    /// The event was already credited by an earlier delivery.
    Duplicate {
        /// Provider event ID.
        event_id: String,
    },
}

/// Verifies and settles Stripe webhook deliveries.
#[derive(Clone)]
pub struct PaymentProcessor {
    store: Arc<dyn Store>,
    audit: Arc<dyn AuditSink>,
    config: SettlementConfig,
}

impl PaymentProcessor {
    /// Create a processor over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, audit: Arc<dyn AuditSink>, config: SettlementConfig) -> Self {
        Self {
            store,
            audit,
            config,
        }
    }

    /// Verify, decode and settle one webhook delivery.
    ///
    /// The signature is checked before the payload is parsed. Only
    /// `checkout.session.completed` credits quota; every credit is recorded
    /// under its event ID in the same transaction, so redeliveries are
    /// reported as [`EventOutcome::Duplicate`] and credit nothing.
    ///
    /// # Errors
    ///
    /// - `UntrustedEvent` if the signature does not verify
    /// - `MalformedEvent` if the payload or checkout object cannot be decoded
    /// - `UnknownCustomer` if no account has the customer email
    /// - `PreconditionFailed` for a non-positive amount
    /// - `CreditFailed` if storage fails; nothing was written
    #[tracing::instrument(skip_all)]
    pub async fn handle_event(
        &self,
        payload: &[u8],
        signature_header: &str,
        secret: &str,
    ) -> Result<EventOutcome> {
        verify_signature(
            payload,
            signature_header,
            secret,
            self.config.signature_tolerance_seconds,
            Utc::now().timestamp(),
        )
        .map_err(|e| {
            tracing::warn!(error = %e, "Rejected webhook signature");
            e
        })?;

        let envelope = EventEnvelope::parse(payload)?;
        let event_id = envelope.id.clone();
        tracing::info!(event_id = %event_id, event_type = %envelope.event_type, "Received Stripe event");

        match envelope.into_event()? {
            PaymentEvent::CheckoutSessionCompleted(session) => {
                self.settle_checkout(event_id, &session).await
            }
            other => {
                tracing::debug!(event_type = %other.event_type(), "Unhandled Stripe event");
                Ok(EventOutcome::Ignored {
                    event_id,
                    event_type: other.event_type().to_string(),
                })
            }
        }
    }

    async fn settle_checkout(
        &self,
        event_id: String,
        session: &CheckoutSession,
    ) -> Result<EventOutcome> {
        let user_id = self
            .store
            .find_user_by_email(&session.customer_email)
            .await
            .map_err(SettlementError::CreditFailed)?
            .ok_or_else(|| {
                tracing::warn!(session_id = %session.id, "No account for checkout customer");
                SettlementError::UnknownCustomer {
                    email: session.customer_email.clone(),
                }
            })?;

        if user_id.is_nil() {
            return Err(SettlementError::PreconditionFailed(
                "customer resolved to nil user".into(),
            ));
        }
        if session.amount_total <= 0 {
            return Err(SettlementError::PreconditionFailed(format!(
                "non-positive amount {}",
                session.amount_total
            )));
        }

        let quota = to_quota(session.amount_total, self.config.quota_per_unit);
        let processed = ProcessedPaymentEvent {
            event_id,
            event_type: topup_core::CHECKOUT_SESSION_COMPLETED.to_string(),
            user_id,
            amount_minor: session.amount_total,
            quota,
            processed_at: Utc::now(),
        };

        let mut tx = self
            .store
            .begin()
            .await
            .map_err(SettlementError::CreditFailed)?;

        match record_and_credit(tx.as_mut(), &processed).await {
            Ok(true) => {}
            Ok(false) => {
                abort(tx).await;
                tracing::info!(event_id = %processed.event_id, "Event already credited");
                return Ok(EventOutcome::Duplicate {
                    event_id: processed.event_id,
                });
            }
            Err(e) => {
                abort(tx).await;
                return Err(SettlementError::CreditFailed(e));
            }
        }
        tx.commit().await.map_err(SettlementError::CreditFailed)?;

        tracing::info!(
            event_id = %processed.event_id,
            user_id = %user_id,
            quota = %quota,
            amount_minor = %processed.amount_minor,
            payment_status = session.payment_status.as_deref().unwrap_or("unknown"),
            "Quota credited from Stripe checkout"
        );
        #[allow(clippy::cast_precision_loss)]
        let paid = processed.amount_minor as f64 / 100.0;
        self.audit.record(AuditEntry::new(
            user_id,
            LogCategory::Topup,
            format!(
                "Online top-up: credited {}, paid {paid:.2}",
                format_quota(
                    quota,
                    self.config.quota_per_unit,
                    self.config.display_in_currency
                )
            ),
        ));

        Ok(EventOutcome::Credited {
            event_id: processed.event_id,
            user_id,
            quota,
            amount_minor: processed.amount_minor,
        })
    }
}

/// Insert the event row, then credit. Returns `false` for a recorded event.
async fn record_and_credit(
    tx: &mut dyn StoreTx,
    processed: &ProcessedPaymentEvent,
) -> topup_store::Result<bool> {
    if !tx.insert_payment_event(processed).await? {
        return Ok(false);
    }
    tx.increment_quota(&processed.user_id, processed.quota)
        .await?;
    Ok(true)
}
