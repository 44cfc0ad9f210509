//! Subscription repository port.
//!
//! The billing subsystem owns subscriptions; webhook processing only looks
//! them up by provider order id and applies payment transitions.
//!
//! Both transitions are conditional writes evaluated by the store in a
//! single statement, so concurrent duplicate deliveries cannot interleave a
//! read and a write.

use async_trait::async_trait;

use crate::domain::billing::{Subscription, TransitionOutcome};
use crate::domain::foundation::{DomainError, SubscriptionId};

/// Repository port for subscription payment state.
#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    /// Find the subscription correlated with a provider order.
    ///
    /// Returns `None` if no subscription references the order.
    async fn find_by_order_id(&self, order_id: &str) -> Result<Option<Subscription>, DomainError>;

    /// Completes the payment unless it is already completed.
    ///
    /// Sets `payment_status = completed`, `status = active` and, when given,
    /// the payment id. Returns `AlreadyCompleted` without writing if the
    /// payment was completed before.
    ///
    /// # Errors
    ///
    /// - `SubscriptionNotFound` if the subscription disappeared
    /// - `StoreUnavailable` / `DatabaseError` on persistence failure
    async fn complete_payment(
        &self,
        id: &SubscriptionId,
        payment_id: Option<&str>,
    ) -> Result<TransitionOutcome, DomainError>;

    /// Fails the payment unless it is already completed.
    ///
    /// Sets `payment_status = failed` and `status = cancelled`.
    async fn fail_payment(&self, id: &SubscriptionId) -> Result<TransitionOutcome, DomainError>;
}
