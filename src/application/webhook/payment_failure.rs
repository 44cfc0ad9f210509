//! PaymentFailureHandler - Cancels the subscription behind a failed payment.

use std::sync::Arc;

use crate::domain::billing::{PurchaseStatus, TransitionOutcome};
use crate::domain::webhook::{PaymentDetails, WebhookError};
use crate::ports::{PurchaseRepository, SubscriptionRepository};

use super::{mirror_purchase, EventOutcome};

/// Handles `payment.failed`.
///
/// A failure for an unknown order carries no obligation and is acknowledged.
/// A completed subscription is never downgraded: a stale failure delivered
/// after activation leaves it completed.
pub struct PaymentFailureHandler {
    subscriptions: Arc<dyn SubscriptionRepository>,
    purchases: Arc<dyn PurchaseRepository>,
}

impl PaymentFailureHandler {
    pub fn new(
        subscriptions: Arc<dyn SubscriptionRepository>,
        purchases: Arc<dyn PurchaseRepository>,
    ) -> Self {
        Self {
            subscriptions,
            purchases,
        }
    }

    pub async fn handle(&self, details: &PaymentDetails) -> Result<EventOutcome, WebhookError> {
        let Some(subscription) = self
            .subscriptions
            .find_by_order_id(&details.order_id)
            .await?
        else {
            tracing::warn!(order_id = %details.order_id, "Subscription not found for failed payment");
            return Ok(EventOutcome::SubscriptionMissing);
        };

        let outcome = if subscription.is_payment_completed() {
            TransitionOutcome::AlreadyCompleted
        } else {
            self.subscriptions.fail_payment(&subscription.id).await?
        };

        if outcome == TransitionOutcome::AlreadyCompleted {
            tracing::warn!(
                subscription_id = %subscription.id,
                order_id = %details.order_id,
                "Ignoring payment failure for completed subscription"
            );
            return Ok(EventOutcome::AlreadyCompleted);
        }

        mirror_purchase(
            self.purchases.as_ref(),
            &details.order_id,
            PurchaseStatus::Failed,
            details.payment_id.as_deref(),
        )
        .await;

        tracing::info!(
            subscription_id = %subscription.id,
            order_id = %details.order_id,
            "Subscription payment failed"
        );

        Ok(EventOutcome::PaymentFailed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{InMemoryPurchaseRepository, InMemorySubscriptionRepository};
    use crate::domain::billing::{PaymentStatus, Subscription, SubscriptionStatus};
    use crate::domain::foundation::UserId;

    fn details(order_id: &str) -> PaymentDetails {
        PaymentDetails {
            order_id: order_id.to_string(),
            payment_id: None,
        }
    }

    fn handler() -> (
        Arc<InMemorySubscriptionRepository>,
        Arc<InMemoryPurchaseRepository>,
        PaymentFailureHandler,
    ) {
        let subscriptions = Arc::new(InMemorySubscriptionRepository::new());
        let purchases = Arc::new(InMemoryPurchaseRepository::new());
        let handler = PaymentFailureHandler::new(subscriptions.clone(), purchases.clone());
        (subscriptions, purchases, handler)
    }

    #[tokio::test]
    async fn fails_pending_subscription() {
        let (subscriptions, purchases, handler) = handler();
        let subscription = Subscription::pending(UserId::new(), "order_2").unwrap();
        subscriptions.insert(subscription.clone()).await;
        purchases.insert_pending("order_2").await;

        let outcome = handler.handle(&details("order_2")).await.unwrap();

        assert_eq!(outcome, EventOutcome::PaymentFailed);
        let stored = subscriptions.get(&subscription.id).await.unwrap();
        assert_eq!(stored.payment_status, PaymentStatus::Failed);
        assert_eq!(stored.status, SubscriptionStatus::Cancelled);
        assert_eq!(
            purchases.get("order_2").await.unwrap().status,
            PurchaseStatus::Failed
        );
    }

    #[tokio::test]
    async fn unknown_order_is_acknowledged() {
        let (subscriptions, _, handler) = handler();

        let outcome = handler.handle(&details("order_2")).await.unwrap();

        assert_eq!(outcome, EventOutcome::SubscriptionMissing);
        assert_eq!(subscriptions.write_count(), 0);
    }

    #[tokio::test]
    async fn failure_after_completion_keeps_subscription_completed() {
        let (subscriptions, purchases, handler) = handler();
        let subscription = Subscription::pending(UserId::new(), "order_1").unwrap();
        subscriptions.insert(subscription.clone()).await;
        subscriptions.complete_payment(&subscription.id, Some("pay_1")).await.unwrap();
        purchases.insert_pending("order_1").await;

        let outcome = handler.handle(&details("order_1")).await.unwrap();

        assert_eq!(outcome, EventOutcome::AlreadyCompleted);
        let stored = subscriptions.get(&subscription.id).await.unwrap();
        assert_eq!(stored.payment_status, PaymentStatus::Completed);
        assert_eq!(stored.status, SubscriptionStatus::Active);
        assert_eq!(
            purchases.get("order_1").await.unwrap().status,
            PurchaseStatus::Pending
        );
    }

    #[tokio::test]
    async fn repeated_failure_is_harmless() {
        let (subscriptions, _, handler) = handler();
        let subscription = Subscription::pending(UserId::new(), "order_2").unwrap();
        subscriptions.insert(subscription.clone()).await;

        handler.handle(&details("order_2")).await.unwrap();
        let second = handler.handle(&details("order_2")).await.unwrap();

        assert_eq!(second, EventOutcome::PaymentFailed);
        assert_eq!(
            subscriptions.get(&subscription.id).await.unwrap().payment_status,
            PaymentStatus::Failed
        );
    }
}
