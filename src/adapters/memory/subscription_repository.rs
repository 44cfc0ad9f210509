//! In-memory subscription store.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::RwLock;

use crate::domain::billing::{Subscription, TransitionOutcome};
use crate::domain::foundation::{DomainError, ErrorCode, SubscriptionId, Timestamp};
use crate::ports::SubscriptionRepository;

/// In-memory subscription store that counts applied writes.
#[derive(Debug, Default)]
pub struct InMemorySubscriptionRepository {
    subscriptions: RwLock<HashMap<SubscriptionId, Subscription>>,
    writes: AtomicUsize,
    unavailable: AtomicBool,
}

impl InMemorySubscriptionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds or replaces a subscription.
    pub async fn insert(&self, subscription: Subscription) {
        self.subscriptions
            .write()
            .await
            .insert(subscription.id, subscription);
    }

    pub async fn get(&self, id: &SubscriptionId) -> Option<Subscription> {
        self.subscriptions.read().await.get(id).cloned()
    }

    /// Number of transitions that changed stored state.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Makes every subsequent call fail with `StoreUnavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn ensure_available(&self) -> Result<(), DomainError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(DomainError::store_unavailable("subscription store unavailable"));
        }
        Ok(())
    }

    async fn transition<F>(&self, id: &SubscriptionId, apply: F) -> Result<TransitionOutcome, DomainError>
    where
        F: FnOnce(&mut Subscription, Timestamp) -> TransitionOutcome + Send,
    {
        self.ensure_available()?;
        let mut subscriptions = self.subscriptions.write().await;
        let subscription = subscriptions.get_mut(id).ok_or_else(|| {
            DomainError::new(
                ErrorCode::SubscriptionNotFound,
                format!("Subscription {} not found", id),
            )
        })?;

        let outcome = apply(subscription, Timestamp::now());
        if outcome == TransitionOutcome::Applied {
            self.writes.fetch_add(1, Ordering::SeqCst);
        }
        Ok(outcome)
    }
}

#[async_trait]
impl SubscriptionRepository for InMemorySubscriptionRepository {
    async fn find_by_order_id(&self, order_id: &str) -> Result<Option<Subscription>, DomainError> {
        self.ensure_available()?;
        Ok(self
            .subscriptions
            .read()
            .await
            .values()
            .find(|s| s.order_id == order_id)
            .cloned())
    }

    async fn complete_payment(
        &self,
        id: &SubscriptionId,
        payment_id: Option<&str>,
    ) -> Result<TransitionOutcome, DomainError> {
        let payment_id = payment_id.map(str::to_string);
        self.transition(id, move |s, at| s.activate(payment_id, at)).await
    }

    async fn fail_payment(&self, id: &SubscriptionId) -> Result<TransitionOutcome, DomainError> {
        self.transition(id, |s, at| s.fail(at)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::billing::{PaymentStatus, SubscriptionStatus};
    use crate::domain::foundation::UserId;

    async fn seeded(order_id: &str) -> (InMemorySubscriptionRepository, SubscriptionId) {
        let repo = InMemorySubscriptionRepository::new();
        let subscription = Subscription::pending(UserId::new(), order_id).unwrap();
        let id = subscription.id;
        repo.insert(subscription).await;
        (repo, id)
    }

    #[tokio::test]
    async fn finds_by_order_id() {
        let (repo, id) = seeded("order_1").await;

        let found = repo.find_by_order_id("order_1").await.unwrap().unwrap();

        assert_eq!(found.id, id);
        assert!(repo.find_by_order_id("order_2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn complete_payment_twice_writes_once() {
        let (repo, id) = seeded("order_1").await;

        let first = repo.complete_payment(&id, Some("pay_1")).await.unwrap();
        let second = repo.complete_payment(&id, Some("pay_2")).await.unwrap();

        assert_eq!(first, TransitionOutcome::Applied);
        assert_eq!(second, TransitionOutcome::AlreadyCompleted);
        assert_eq!(repo.write_count(), 1);

        let stored = repo.get(&id).await.unwrap();
        assert_eq!(stored.payment_status, PaymentStatus::Completed);
        assert_eq!(stored.status, SubscriptionStatus::Active);
        assert_eq!(stored.payment_id.as_deref(), Some("pay_1"));
    }

    #[tokio::test]
    async fn fail_payment_does_not_touch_completed() {
        let (repo, id) = seeded("order_1").await;
        repo.complete_payment(&id, None).await.unwrap();

        let outcome = repo.fail_payment(&id).await.unwrap();

        assert_eq!(outcome, TransitionOutcome::AlreadyCompleted);
        assert_eq!(
            repo.get(&id).await.unwrap().payment_status,
            PaymentStatus::Completed
        );
    }

    #[tokio::test]
    async fn unknown_subscription_is_not_found() {
        let repo = InMemorySubscriptionRepository::new();

        let err = repo.fail_payment(&SubscriptionId::new()).await.unwrap_err();

        assert_eq!(err.code, ErrorCode::SubscriptionNotFound);
    }
}
