//! HTTP adapter for payment webhooks.
//!
//! - `POST /webhooks/payment-events` - Signed payment provider deliveries

pub mod dto;
mod handlers;
mod routes;

pub use handlers::{
    client_source, handle_payment_webhook, WebhookApiError, WebhookAppState, EVENT_ID_HEADER,
    SIGNATURE_HEADER,
};
pub use routes::{webhook_router, webhook_routes};
