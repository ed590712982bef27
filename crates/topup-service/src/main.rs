//! Top-up Service - redemption codes and Stripe settlement over HTTP.

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use topup_core::AuditSink;
use topup_service::{create_router, AppState, FanoutAuditSink, ServiceConfig, TracingAuditSink};
use topup_store::{PgAuditSink, PgStore, Store};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,topup=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Top-up Service");

    let config = ServiceConfig::from_env();

    tracing::info!(
        listen_addr = %config.listen_addr,
        quota_per_unit = %config.settlement.quota_per_unit,
        items_per_page = %config.items_per_page,
        stripe_configured = %config.stripe_webhook_secret.is_some(),
        "Service configuration loaded"
    );

    tracing::info!("Connecting to PostgreSQL");
    let store = PgStore::connect(&config.database_url, config.database_max_connections).await?;
    store.migrate().await?;
    tracing::info!("Database migrations applied");

    let audit_log: Arc<dyn AuditSink> = Arc::new(PgAuditSink::new(store.pool().clone()));
    let audit_trace: Arc<dyn AuditSink> = Arc::new(TracingAuditSink);
    let audit: Arc<dyn AuditSink> = Arc::new(FanoutAuditSink::new(vec![audit_log, audit_trace]));
    let store: Arc<dyn Store> = Arc::new(store);

    let state = AppState::new(store, audit, config.clone());
    let app = create_router(state);

    tracing::info!(listen_addr = %config.listen_addr, "Starting HTTP server");
    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
