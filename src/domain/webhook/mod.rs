//! Webhook domain module.
//!
//! Authenticity and shape of inbound payment-provider deliveries.
//!
//! # Module Structure
//!
//! - `errors` - WebhookError with error-kind classification and HTTP mapping
//! - `event` - Tagged parse of the provider envelope
//! - `verifier` - HMAC-SHA256 signature verification over the raw body

mod errors;
mod event;
mod verifier;

pub use errors::{ErrorKind, WebhookError};
pub use event::{EventData, EventType, PaymentDetails, WebhookEvent};
pub use verifier::{compute_signature, SignatureVerifier};
