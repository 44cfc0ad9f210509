//! Webhook delivery pipeline.
//!
//! - `handle_webhook_delivery` - Rate limit, authenticate, deduplicate, route, record
//! - `event_router` - Type-based dispatch
//! - `payment_success` / `payment_failure` - Subscription transitions

mod event_router;
mod handle_webhook_delivery;
mod payment_failure;
mod payment_success;

pub use event_router::EventRouter;
pub use handle_webhook_delivery::{
    DeliveryOutcome, DeliverySettings, HandleWebhookDeliveryHandler, WebhookDelivery,
};
pub use payment_failure::PaymentFailureHandler;
pub use payment_success::PaymentSuccessHandler;

use crate::domain::billing::PurchaseStatus;
use crate::domain::webhook::WebhookError;
use crate::ports::PurchaseRepository;

/// What a handler did with an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    /// Payment completed and subscription activated.
    Activated,
    /// Payment failed and subscription cancelled.
    PaymentFailed,
    /// Subscription was already completed; nothing written.
    AlreadyCompleted,
    /// Failure event for an order with no subscription.
    SubscriptionMissing,
    /// Event type the service does not act on.
    Ignored,
}

/// Best-effort purchase mirror write. Failures are logged, never returned.
async fn mirror_purchase(
    purchases: &dyn PurchaseRepository,
    order_id: &str,
    status: PurchaseStatus,
    payment_id: Option<&str>,
) {
    match purchases.update_status(order_id, status, payment_id).await {
        Ok(0) => tracing::debug!(order_id, "No purchase to mirror"),
        Ok(_) => tracing::debug!(order_id, status = %status, "Purchase updated"),
        Err(e) => {
            let err = WebhookError::AuxWriteFailed(e.message);
            tracing::warn!(order_id, error = %err, "Failed to update purchase");
        }
    }
}
