//! Subscription aggregate.
//!
//! Only the payment-related slice of a billing subscription lives here. The
//! webhook pipeline drives two transitions on it:
//!
//! - **activate**: `pending | failed -> completed`, records the payment id and
//!   upgrades `status` to active. Idempotent: activating a completed
//!   subscription is a no-op.
//! - **fail**: `pending | failed -> failed`, downgrades `status` to cancelled.
//!   A completed subscription is left untouched, so a stale failure event
//!   cannot undo a captured payment.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{StateMachine, SubscriptionId, Timestamp, UserId, ValidationError};

use super::{PaymentStatus, SubscriptionStatus};

/// Result of applying a payment transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// The subscription changed and must be persisted.
    Applied,
    /// The subscription was already completed; nothing was changed.
    AlreadyCompleted,
}

/// Subscription aggregate, correlated to the provider by `order_id`.
///
/// # Invariants
///
/// - `order_id` is non-empty and unique across subscriptions
/// - once `payment_status` is `Completed` it never changes again
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub user_id: UserId,

    /// Provider order this subscription was created for.
    pub order_id: String,

    /// Provider payment that settled the order, once known.
    pub payment_id: Option<String>,

    pub payment_status: PaymentStatus,
    pub status: SubscriptionStatus,
    pub updated_at: Timestamp,
}

impl Subscription {
    /// Creates a subscription awaiting payment for the given order.
    ///
    /// # Errors
    ///
    /// Returns `EmptyField` if `order_id` is blank.
    pub fn pending(user_id: UserId, order_id: impl Into<String>) -> Result<Self, ValidationError> {
        let order_id = order_id.into();
        if order_id.trim().is_empty() {
            return Err(ValidationError::empty_field("order_id"));
        }
        Ok(Self {
            id: SubscriptionId::new(),
            user_id,
            order_id,
            payment_id: None,
            payment_status: PaymentStatus::Pending,
            status: SubscriptionStatus::Pending,
            updated_at: Timestamp::now(),
        })
    }

    /// Returns true once the payment has been captured.
    pub fn is_payment_completed(&self) -> bool {
        self.payment_status == PaymentStatus::Completed
    }

    /// Marks the payment as captured and the subscription as active.
    ///
    /// A missing `payment_id` keeps whatever id was already recorded.
    pub fn activate(&mut self, payment_id: Option<String>, at: Timestamp) -> TransitionOutcome {
        let Ok(next) = self.payment_status.transition_to(PaymentStatus::Completed) else {
            return TransitionOutcome::AlreadyCompleted;
        };
        self.payment_status = next;
        if payment_id.is_some() {
            self.payment_id = payment_id;
        }
        self.status = SubscriptionStatus::Active;
        self.updated_at = at;
        TransitionOutcome::Applied
    }

    /// Marks the payment as failed and the subscription as cancelled.
    pub fn fail(&mut self, at: Timestamp) -> TransitionOutcome {
        match self.payment_status.transition_to(PaymentStatus::Failed) {
            Ok(next) => {
                self.payment_status = next;
                self.status = SubscriptionStatus::Cancelled;
                self.updated_at = at;
                TransitionOutcome::Applied
            }
            Err(_) => TransitionOutcome::AlreadyCompleted,
        }
    }
}
