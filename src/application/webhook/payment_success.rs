//! PaymentSuccessHandler - Activates the subscription behind a captured payment.

use std::sync::Arc;

use crate::domain::billing::{PurchaseStatus, TransitionOutcome};
use crate::domain::webhook::{PaymentDetails, WebhookError};
use crate::ports::{PurchaseRepository, SubscriptionRepository};

use super::{mirror_purchase, EventOutcome};

/// Handles `payment.captured` and `order.paid`.
///
/// The subscription must exist. Activation is skipped without any write when
/// the payment is already completed; otherwise the store applies a
/// conditional transition, so a concurrent duplicate that slips past the
/// read still cannot activate twice.
pub struct PaymentSuccessHandler {
    subscriptions: Arc<dyn SubscriptionRepository>,
    purchases: Arc<dyn PurchaseRepository>,
}

impl PaymentSuccessHandler {
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
        let subscription = self
            .subscriptions
            .find_by_order_id(&details.order_id)
            .await?
            .ok_or_else(|| WebhookError::SubscriptionNotFound(details.order_id.clone()))?;

        if subscription.is_payment_completed() {
            tracing::info!(
                subscription_id = %subscription.id,
                order_id = %details.order_id,
                "Subscription already completed, skipping activation"
            );
            return Ok(EventOutcome::AlreadyCompleted);
        }

        let outcome = self
            .subscriptions
            .complete_payment(&subscription.id, details.payment_id.as_deref())
            .await?;

        if outcome == TransitionOutcome::AlreadyCompleted {
            tracing::info!(
                subscription_id = %subscription.id,
                "Subscription completed concurrently, skipping activation"
            );
            return Ok(EventOutcome::AlreadyCompleted);
        }

        mirror_purchase(
            self.purchases.as_ref(),
            &details.order_id,
            PurchaseStatus::Paid,
            details.payment_id.as_deref(),
        )
        .await;

        tracing::info!(
            subscription_id = %subscription.id,
            user_id = %subscription.user_id,
            order_id = %details.order_id,
            payment_id = details.payment_id.as_deref().unwrap_or("none"),
            "Subscription activated"
        );

        Ok(EventOutcome::Activated)
    }
}
