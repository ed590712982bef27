//! Stripe webhook authentication.

pub mod signature;

pub use signature::{sign_payload, verify_signature, SignatureError, SIGNATURE_HEADER};
