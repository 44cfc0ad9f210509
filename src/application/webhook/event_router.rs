//! EventRouter - Dispatches a parsed event to its handler by type.

use std::sync::Arc;

use crate::domain::webhook::{EventData, WebhookError, WebhookEvent};
use crate::ports::{PurchaseRepository, SubscriptionRepository};

use super::{EventOutcome, PaymentFailureHandler, PaymentSuccessHandler};

/// Routes events to the success or failure handler.
///
/// Unrecognized types are acknowledged as `Ignored` so the ledger marks them
/// processed and the provider stops redelivering them.
pub struct EventRouter {
    success: PaymentSuccessHandler,
    failure: PaymentFailureHandler,
}

impl EventRouter {
    pub fn new(
        subscriptions: Arc<dyn SubscriptionRepository>,
        purchases: Arc<dyn PurchaseRepository>,
    ) -> Self {
        Self {
            success: PaymentSuccessHandler::new(subscriptions.clone(), purchases.clone()),
            failure: PaymentFailureHandler::new(subscriptions, purchases),
        }
    }

    /// Validates the event's shape and runs its handler.
    ///
    /// # Errors
    ///
    /// - `MalformedEvent` if required identifiers are missing
    /// - `SubscriptionNotFound` for a success event with no subscription
    /// - `StoreUnavailable` / `Database` when persistence fails
    pub async fn route(&self, event: &WebhookEvent) -> Result<EventOutcome, WebhookError> {
        match event.data()? {
            EventData::PaymentSucceeded(details) => self.success.handle(&details).await,
            EventData::PaymentFailed(details) => self.failure.handle(&details).await,
            EventData::Unrecognized => {
                tracing::info!(event_type = %event.event_type, "Unhandled event type");
                Ok(EventOutcome::Ignored)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{InMemoryPurchaseRepository, InMemorySubscriptionRepository};
    use crate::domain::billing::Subscription;
    use crate::domain::foundation::UserId;
    use serde_json::json;

    fn event(value: serde_json::Value) -> WebhookEvent {
        WebhookEvent::parse(value.to_string().as_bytes(), None).unwrap()
    }

    async fn router_with(order_id: Option<&str>) -> EventRouter {
        let subscriptions = Arc::new(InMemorySubscriptionRepository::new());
        if let Some(order_id) = order_id {
            subscriptions
                .insert(Subscription::pending(UserId::new(), order_id).unwrap())
                .await;
        }
        EventRouter::new(subscriptions, Arc::new(InMemoryPurchaseRepository::new()))
    }

    #[tokio::test]
    async fn routes_captured_payment_to_success_handler() {
        let router = router_with(Some("order_1")).await;
        let event = event(json!({
            "event": "payment.captured",
            "payload": {"payment": {"entity": {"id": "pay_1", "order_id": "order_1"}}}
        }));

        assert_eq!(router.route(&event).await.unwrap(), EventOutcome::Activated);
    }

    #[tokio::test]
    async fn routes_order_paid_to_success_handler() {
        let router = router_with(Some("order_7")).await;
        let event = event(json!({
            "event": "order.paid",
            "payload": {"order": {"entity": {"id": "order_7"}}}
        }));

        assert_eq!(router.route(&event).await.unwrap(), EventOutcome::Activated);
    }

    #[tokio::test]
    async fn routes_failed_payment_to_failure_handler() {
        let router = router_with(None).await;
        let event = event(json!({
            "event": "payment.failed",
            "payload": {"payment": {"entity": {"order_id": "order_2"}}}
        }));

        assert_eq!(
            router.route(&event).await.unwrap(),
            EventOutcome::SubscriptionMissing
        );
    }

    #[tokio::test]
    async fn unknown_type_is_ignored() {
        let router = router_with(None).await;
        let event = event(json!({"event": "refund.created", "payload": {}}));

        assert_eq!(router.route(&event).await.unwrap(), EventOutcome::Ignored);
    }

    #[tokio::test]
    async fn malformed_success_event_is_an_error() {
        let router = router_with(None).await;
        let event = event(json!({"event": "payment.captured", "payload": {}}));

        let err = router.route(&event).await.unwrap_err();

        assert_eq!(
            err,
            WebhookError::malformed("Missing payment or order data in event")
        );
    }
}
