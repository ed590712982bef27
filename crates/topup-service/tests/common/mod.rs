//! Common test utilities for top-up integration tests.

#![allow(dead_code)] // Some utilities are used by different test files

use std::sync::Arc;

use axum::http::{HeaderName, HeaderValue};
use axum::Router;
use axum_test::TestServer;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::json;

use topup_core::{AuditSink, RecordingAuditSink, RedemptionRecord, UserAccount, UserId};
use topup_service::auth::{JwtClaims, Role};
use topup_service::stripe::sign_payload;
use topup_service::{
    create_router, AppState, PaymentProcessor, RedemptionEngine, ServiceConfig, SettlementConfig,
};
use topup_store::{MemoryStore, Store};

pub const JWT_SECRET: &str = "test-jwt-secret";
pub const WEBHOOK_SECRET: &str = "whsec_test_secret";
pub const USER_EMAIL: &str = "buyer@example.com";

/// Settlement settings used by every test: one dollar buys 500 000 quota.
pub fn settlement_config() -> SettlementConfig {
    SettlementConfig::default()
}

/// Engines over a fresh in-memory store, without HTTP.
pub struct Engines {
    pub store: MemoryStore,
    pub audit: Arc<RecordingAuditSink>,
    pub redemptions: RedemptionEngine,
    pub payments: PaymentProcessor,
}

impl Engines {
    pub fn new() -> Self {
        let store = MemoryStore::new();
        let audit = Arc::new(RecordingAuditSink::new());
        let shared: Arc<dyn Store> = Arc::new(store.clone());
        let sink: Arc<dyn AuditSink> = audit.clone();

        Self {
            redemptions: RedemptionEngine::new(shared.clone(), sink.clone(), settlement_config()),
            payments: PaymentProcessor::new(shared, sink, settlement_config()),
            store,
            audit,
        }
    }

    /// Create an account and return its id.
    pub async fn add_user(&self, email: &str) -> UserId {
        let user_id = UserId::generate();
        self.store
            .put_account(&UserAccount::new(user_id, email))
            .await
            .expect("Failed to create account");
        user_id
    }

    /// Persist one enabled code worth `quota`.
    pub async fn add_code(&self, quota: i64) -> RedemptionRecord {
        let record = RedemptionRecord::issue(UserId::generate(), "test", quota);
        self.store
            .insert_redemption(&record)
            .await
            .expect("Failed to insert redemption");
        record
    }

    pub async fn quota(&self, user_id: &UserId) -> i64 {
        self.store
            .get_account(user_id)
            .await
            .expect("Failed to read account")
            .expect("Account missing")
            .quota
    }
}

/// Test harness containing everything needed for HTTP integration tests.
pub struct TestHarness {
    /// The test server for making HTTP requests.
    pub server: TestServer,
    /// The backing store, for seeding and assertions.
    pub store: MemoryStore,
    /// Audit entries produced by requests.
    pub audit: Arc<RecordingAuditSink>,
    /// A regular user with an account.
    pub test_user_id: UserId,
    /// An administrator with an account.
    pub admin_user_id: UserId,
}

impl TestHarness {
    /// Create a new test harness with a fresh store.
    pub async fn new() -> Self {
        let store = MemoryStore::new();
        let audit = Arc::new(RecordingAuditSink::new());

        let test_user_id = UserId::generate();
        let admin_user_id = UserId::generate();
        store
            .put_account(&UserAccount::new(test_user_id, USER_EMAIL))
            .await
            .expect("Failed to create user");
        store
            .put_account(&UserAccount::new(admin_user_id, "admin@example.com"))
            .await
            .expect("Failed to create admin");

        let config = ServiceConfig {
            listen_addr: "127.0.0.1:0".into(),
            jwt_secret: Some(JWT_SECRET.into()),
            stripe_webhook_secret: Some(WEBHOOK_SECRET.into()),
            items_per_page: 2,
            settlement: settlement_config(),
            ..ServiceConfig::default()
        };

        let state = AppState::new(Arc::new(store.clone()), audit.clone(), config);
        let router: Router = create_router(state);

        let server = TestServer::new(router).expect("Failed to create test server");

        Self {
            server,
            store,
            audit,
            test_user_id,
            admin_user_id,
        }
    }

    /// Get the authorization header for user authentication.
    pub fn user_auth_header(&self) -> HeaderValue {
        bearer(self.test_user_id, Role::User)
    }

    /// Get the authorization header for admin authentication.
    pub fn admin_auth_header(&self) -> HeaderValue {
        bearer(self.admin_user_id, Role::Admin)
    }

    pub async fn quota(&self, user_id: &UserId) -> i64 {
        self.store
            .get_account(user_id)
            .await
            .expect("Failed to read account")
            .expect("Account missing")
            .quota
    }
}

/// Mint a bearer header valid for one hour.
pub fn bearer(user_id: UserId, role: Role) -> HeaderValue {
    let claims = JwtClaims {
        sub: user_id.to_string(),
        role,
        exp: chrono::Utc::now().timestamp() + 3600,
    };
    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .expect("Failed to sign token");
    header_value(&format!("Bearer {token}"))
}

pub fn header_value(value: &str) -> HeaderValue {
    HeaderValue::from_str(value).expect("Invalid header value")
}

pub fn stripe_signature() -> HeaderName {
    HeaderName::from_static("stripe-signature")
}

/// A signature header for `payload`, signed now.
pub fn sign(payload: &[u8]) -> String {
    sign_payload(payload, WEBHOOK_SECRET, chrono::Utc::now().timestamp())
}

/// [`sign`] as a header value.
pub fn signature_header(payload: &[u8]) -> HeaderValue {
    header_value(&sign(payload))
}

/// A `checkout.session.completed` event body.
pub fn checkout_event(event_id: &str, email: &str, amount_total: i64) -> Vec<u8> {
    json!({
        "id": event_id,
        "type": "checkout.session.completed",
        "api_version": "2024-06-20",
        "created": 1_700_000_000,
        "data": { "object": {
            "id": format!("cs_{event_id}"),
            "object": "checkout.session",
            "amount_total": amount_total,
            "currency": "usd",
            "payment_status": "paid",
            "customer_details": { "email": email }
        }}
    })
    .to_string()
    .into_bytes()
}

/// An event body of any other type.
pub fn other_event(event_id: &str, event_type: &str) -> Vec<u8> {
    json!({
        "id": event_id,
        "type": event_type,
        "data": { "object": { "id": "obj_1", "amount_received": 1000 } }
    })
    .to_string()
    .into_bytes()
}
