//! Stripe webhook event model.
//!
//! Stripe events share an envelope `{id, type, data: {object}}` whose `object`
//! shape depends on `type`. Only checkout completion carries a purchase that
//! credits quota, so the event is modelled as a closed enum where every other
//! type collapses into [`PaymentEvent::Other`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::UserId;

/// Event type for a completed Stripe Checkout session.
pub const CHECKOUT_SESSION_COMPLETED: &str = "checkout.session.completed";

/// Event type for a succeeded payment intent.
pub const PAYMENT_INTENT_SUCCEEDED: &str = "payment_intent.succeeded";

/// Errors raised while decoding a webhook payload.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PaymentEventError {
    /// The payload is not a Stripe event envelope.
    #[error("invalid event envelope: {0}")]
    Envelope(String),

    /// The envelope is valid but the typed object could not be decoded.
    #[error("invalid {event_type} object: {reason}")]
    Object {
        /// The event type being decoded.
        event_type: String,
        /// What was wrong with the object.
        reason: String,
    },
}

/// The Stripe event envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct EventEnvelope {
    /// Event ID (`evt_...`), unique per delivery subject.
    pub id: String,
    /// Event type discriminator.
    #[serde(rename = "type")]
    pub event_type: String,
    /// Event data container.
    pub data: EventData,
    /// Created timestamp (Unix).
    #[serde(default)]
    pub created: i64,
    /// API version the event was rendered with. Not checked.
    #[serde(default)]
    pub api_version: Option<String>,
}

/// Envelope data container.
#[derive(Debug, Clone, Deserialize)]
pub struct EventData {
    /// The type-dependent event object.
    pub object: serde_json::Value,
}

/// A decoded webhook event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentEvent {
    /// A Checkout session finished.
    CheckoutSessionCompleted(CheckoutSession),
    /// A payment intent succeeded. Never credited: the same purchase also
    /// produces a checkout completion.
    PaymentIntentSucceeded {
        /// Payment intent ID.
        payment_intent_id: Option<String>,
    },
    /// Any other event type.
    Other {
        /// The unhandled event type.
        event_type: String,
    },
}

impl PaymentEvent {
    /// The Stripe type string of this event.
    #[must_use]
    pub fn event_type(&self) -> &str {
        match self {
            Self::CheckoutSessionCompleted(_) => CHECKOUT_SESSION_COMPLETED,
            Self::PaymentIntentSucceeded { .. } => PAYMENT_INTENT_SUCCEEDED,
            Self::Other { event_type } => event_type,
        }
    }
}

/// The fields of a Checkout session needed to settle a purchase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSession {
    /// Session ID (`cs_...`).
    pub id: String,
    /// Total charged, in minor currency units.
    pub amount_total: i64,
    /// Email of the paying customer.
    pub customer_email: String,
    /// Stripe payment status (`paid`, `unpaid`, `no_payment_required`).
    pub payment_status: Option<String>,
}

/// A provider event that has been credited. Its `event_id` is the
/// idempotency key: each event credits at most once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessedPaymentEvent {
    /// Provider event ID.
    pub event_id: String,
    /// Provider event type.
    pub event_type: String,
    /// The credited user.
    pub user_id: UserId,
    /// Amount paid, in minor currency units.
    pub amount_minor: i64,
    /// Quota credited.
    pub quota: i64,
    /// When the credit was committed.
    pub processed_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct RawCheckoutSession {
    id: String,
    #[serde(default)]
    amount_total: Option<i64>,
    #[serde(default)]
    customer_details: Option<RawCustomerDetails>,
    #[serde(default)]
    customer_email: Option<String>,
    #[serde(default)]
    payment_status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawCustomerDetails {
    #[serde(default)]
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawPaymentIntent {
    #[serde(default)]
    id: Option<String>,
}

impl EventEnvelope {
    /// Decode the envelope from a raw payload.
    ///
    /// # Errors
    ///
    /// Returns `PaymentEventError::Envelope` if the payload is not an event.
    pub fn parse(payload: &[u8]) -> Result<Self, PaymentEventError> {
        serde_json::from_slice(payload).map_err(|e| PaymentEventError::Envelope(e.to_string()))
    }

    /// Decode the type-dependent object.
    ///
    /// # Errors
    ///
    /// Returns `PaymentEventError::Object` if a handled event type carries an
    /// object without the required fields.
    pub fn into_event(self) -> Result<PaymentEvent, PaymentEventError> {
        match self.event_type.as_str() {
            CHECKOUT_SESSION_COMPLETED => {
                let object_error = |reason: String| PaymentEventError::Object {
                    event_type: CHECKOUT_SESSION_COMPLETED.to_string(),
                    reason,
                };
                let raw: RawCheckoutSession = serde_json::from_value(self.data.object)
                    .map_err(|e| object_error(e.to_string()))?;

                let amount_total = raw
                    .amount_total
                    .ok_or_else(|| object_error("missing amount_total".into()))?;
                let customer_email = raw
                    .customer_details
                    .and_then(|d| d.email)
                    .or(raw.customer_email)
                    .filter(|email| !email.trim().is_empty())
                    .ok_or_else(|| object_error("missing customer email".into()))?;

                Ok(PaymentEvent::CheckoutSessionCompleted(CheckoutSession {
                    id: raw.id,
                    amount_total,
                    customer_email,
                    payment_status: raw.payment_status,
                }))
            }
            PAYMENT_INTENT_SUCCEEDED => {
                let payment_intent_id = serde_json::from_value::<RawPaymentIntent>(self.data.object)
                    .ok()
                    .and_then(|pi| pi.id);
                Ok(PaymentEvent::PaymentIntentSucceeded { payment_intent_id })
            }
            _ => Ok(PaymentEvent::Other {
                event_type: self.event_type,
            }),
        }
    }
}
