//! Service configuration.

use serde::Deserialize;
use std::path::Path;
use topup_core::{is_valid_rate, DEFAULT_QUOTA_PER_UNIT};

/// Default Stripe signature tolerance, in seconds.
pub const DEFAULT_SIGNATURE_TOLERANCE_SECONDS: i64 = 300;

/// Settings shared by the settlement engines.
#[derive(Debug, Clone, PartialEq)]
pub struct SettlementConfig {
    /// Quota bought by one major currency unit.
    pub quota_per_unit: f64,

    /// Render quota as currency in audit messages.
    pub display_in_currency: bool,

    /// Maximum age of a signed webhook timestamp, in seconds.
    pub signature_tolerance_seconds: i64,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            quota_per_unit: DEFAULT_QUOTA_PER_UNIT,
            display_in_currency: true,
            signature_tolerance_seconds: DEFAULT_SIGNATURE_TOLERANCE_SECONDS,
        }
    }
}

/// Service configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Address to listen on (default: "0.0.0.0:8080").
    pub listen_addr: String,

    /// PostgreSQL connection URL.
    pub database_url: String,

    /// Maximum pooled database connections (default: 10).
    pub database_max_connections: u32,

    /// HS256 secret for bearer tokens. Without it every request is rejected.
    pub jwt_secret: Option<String>,

    /// Stripe webhook signing secret. Without it every webhook is rejected.
    pub stripe_webhook_secret: Option<String>,

    /// Redemption codes per listing page (default: 10).
    pub items_per_page: usize,

    /// CORS allowed origins.
    pub cors_origins: Vec<String>,

    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,

    /// Request timeout in seconds.
    pub request_timeout_seconds: u64,

    /// Settlement settings.
    pub settlement: SettlementConfig,
}

/// Stripe secrets file structure.
#[derive(Debug, Deserialize)]
struct StripeSecrets {
    #[serde(default)]
    webhook_secret: Option<String>,
}

impl ServiceConfig {
    /// Load configuration from environment variables and secrets files.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            listen_addr: std::env::var("LISTEN_ADDR").unwrap_or(defaults.listen_addr),
            database_url: std::env::var("DATABASE_URL").unwrap_or(defaults.database_url),
            database_max_connections: env_parse("DATABASE_MAX_CONNECTIONS")
                .unwrap_or(defaults.database_max_connections),
            jwt_secret: std::env::var("AUTH_JWT_SECRET").ok(),
            stripe_webhook_secret: load_stripe_webhook_secret(),
            items_per_page: env_parse("ITEMS_PER_PAGE")
                .filter(|n| *n > 0)
                .unwrap_or(defaults.items_per_page),
            cors_origins: std::env::var("CORS_ORIGINS")
                .unwrap_or_else(|_| "*".into())
                .split(',')
                .map(|s| s.trim().to_string())
                .collect(),
            max_body_bytes: env_parse("MAX_BODY_BYTES").unwrap_or(defaults.max_body_bytes),
            request_timeout_seconds: env_parse("REQUEST_TIMEOUT_SECONDS")
                .unwrap_or(defaults.request_timeout_seconds),
            settlement: SettlementConfig {
                quota_per_unit: load_quota_per_unit(),
                display_in_currency: env_parse("DISPLAY_IN_CURRENCY")
                    .unwrap_or(defaults.settlement.display_in_currency),
                signature_tolerance_seconds: env_parse("STRIPE_SIGNATURE_TOLERANCE_SECONDS")
                    .filter(|s| *s > 0)
                    .unwrap_or(DEFAULT_SIGNATURE_TOLERANCE_SECONDS),
            },
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.trim().parse().ok())
}

fn load_quota_per_unit() -> f64 {
    match env_parse::<f64>("QUOTA_PER_UNIT") {
        Some(rate) if is_valid_rate(rate) => rate,
        Some(rate) => {
            tracing::warn!(rate = %rate, "Invalid QUOTA_PER_UNIT, using default");
            DEFAULT_QUOTA_PER_UNIT
        }
        None => DEFAULT_QUOTA_PER_UNIT,
    }
}

/// Load the Stripe webhook secret from file or environment.
fn load_stripe_webhook_secret() -> Option<String> {
    let secret_paths = [".secrets/stripe.json", "../.secrets/stripe.json"];

    for path in &secret_paths {
        if let Ok(StripeSecrets {
            webhook_secret: Some(secret),
        }) = load_secrets_file::<StripeSecrets>(path)
        {
            tracing::info!(path = %path, "Loaded Stripe webhook secret from file");
            return Some(secret);
        }
    }

    tracing::debug!("Stripe secrets file not found, using environment variables");
    std::env::var("STRIPE_WEBHOOK_SECRET").ok()
}

/// Load secrets from a JSON file.
fn load_secrets_file<T: serde::de::DeserializeOwned>(path: &str) -> Result<T, std::io::Error> {
    let path = Path::new(path);
    if !path.exists() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "Secrets file not found",
        ));
    }
    let contents = std::fs::read_to_string(path)?;
    serde_json::from_str(&contents)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".into(),
            database_url: "postgres://localhost/topup".into(),
            database_max_connections: 10,
            jwt_secret: None,
            stripe_webhook_secret: None,
            items_per_page: 10,
            cors_origins: vec!["*".into()],
            max_body_bytes: 1024 * 1024,
            request_timeout_seconds: 30,
            settlement: SettlementConfig::default(),
        }
    }
}
