//! Application state.

use std::sync::Arc;

use topup_core::AuditSink;
use topup_store::Store;

use crate::config::ServiceConfig;
use crate::settlement::{PaymentProcessor, RedemptionEngine};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// The storage backend.
    pub store: Arc<dyn Store>,

    /// Service configuration.
    pub config: ServiceConfig,

    /// Redemption code engine.
    pub redemptions: RedemptionEngine,

    /// Stripe webhook processor.
    pub payments: PaymentProcessor,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, audit: Arc<dyn AuditSink>, config: ServiceConfig) -> Self {
        if config.stripe_webhook_secret.is_none() {
            tracing::warn!("Stripe webhook secret not configured - webhooks will be rejected");
        }
        if config.jwt_secret.is_none() {
            tracing::warn!("JWT secret not configured - authenticated routes will be rejected");
        }

        let redemptions = RedemptionEngine::new(
            Arc::clone(&store),
            Arc::clone(&audit),
            config.settlement.clone(),
        );
        let payments = PaymentProcessor::new(Arc::clone(&store), audit, config.settlement.clone());

        Self {
            store,
            config,
            redemptions,
            payments,
        }
    }
}
