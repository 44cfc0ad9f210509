//! PostgreSQL implementation of SubscriptionRepository.
//!
//! Payment transitions are single conditional `UPDATE`s guarded by
//! `payment_status <> 'completed'`, making the absorbing state hold under
//! concurrent duplicate deliveries across instances.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::time::Duration;
use uuid::Uuid;

use crate::domain::billing::{PaymentStatus, Subscription, SubscriptionStatus, TransitionOutcome};
use crate::domain::foundation::{DomainError, ErrorCode, SubscriptionId, Timestamp, UserId};
use crate::ports::SubscriptionRepository;

use super::bounded;

/// PostgreSQL implementation of the SubscriptionRepository port.
pub struct PostgresSubscriptionRepository {
    pool: PgPool,
    timeout: Duration,
}

impl PostgresSubscriptionRepository {
    /// Creates a repository whose statements are bounded by `timeout`.
    pub fn new(pool: PgPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }

    async fn exists(&self, id: &SubscriptionId) -> Result<bool, DomainError> {
        let found: Option<i32> = bounded(
            self.timeout,
            "Failed to find subscription",
            sqlx::query_scalar("SELECT 1 FROM subscriptions WHERE id = $1")
                .bind(id.as_uuid())
                .fetch_optional(&self.pool),
        )
        .await?;
        Ok(found.is_some())
    }

    async fn outcome_for_unchanged(
        &self,
        id: &SubscriptionId,
    ) -> Result<TransitionOutcome, DomainError> {
        if self.exists(id).await? {
            Ok(TransitionOutcome::AlreadyCompleted)
        } else {
            Err(DomainError::new(
                ErrorCode::SubscriptionNotFound,
                format!("Subscription {} not found", id),
            ))
        }
    }
}

/// Database row representation of a subscription.
#[derive(Debug, sqlx::FromRow)]
struct SubscriptionRow {
    id: Uuid,
    user_id: Uuid,
    order_id: String,
    payment_id: Option<String>,
    payment_status: String,
    status: String,
    updated_at: DateTime<Utc>,
}

impl TryFrom<SubscriptionRow> for Subscription {
    type Error = DomainError;

    fn try_from(row: SubscriptionRow) -> Result<Self, Self::Error> {
        let payment_status = row.payment_status.parse::<PaymentStatus>().map_err(|e| {
            DomainError::new(ErrorCode::DatabaseError, format!("Invalid payment_status: {}", e))
        })?;
        let status = row.status.parse::<SubscriptionStatus>().map_err(|e| {
            DomainError::new(ErrorCode::DatabaseError, format!("Invalid status: {}", e))
        })?;

        Ok(Subscription {
            id: SubscriptionId::from_uuid(row.id),
            user_id: UserId::from_uuid(row.user_id),
            order_id: row.order_id,
            payment_id: row.payment_id,
            payment_status,
            status,
            updated_at: Timestamp::from_datetime(row.updated_at),
        })
    }
}

#[async_trait]
impl SubscriptionRepository for PostgresSubscriptionRepository {
    async fn find_by_order_id(&self, order_id: &str) -> Result<Option<Subscription>, DomainError> {
        let row: Option<SubscriptionRow> = bounded(
            self.timeout,
            "Failed to find subscription",
            sqlx::query_as(
                r#"
                SELECT id, user_id, order_id, payment_id, payment_status, status, updated_at
                FROM subscriptions
                WHERE order_id = $1
                "#,
            )
            .bind(order_id)
            .fetch_optional(&self.pool),
        )
        .await?;

        row.map(Subscription::try_from).transpose()
    }

    async fn complete_payment(
        &self,
        id: &SubscriptionId,
        payment_id: Option<&str>,
    ) -> Result<TransitionOutcome, DomainError> {
        let result = bounded(
            self.timeout,
            "Failed to complete subscription payment",
            sqlx::query(
                r#"
                UPDATE subscriptions SET
                    payment_status = $2,
                    status = $3,
                    payment_id = COALESCE($4, payment_id),
                    updated_at = NOW()
                WHERE id = $1 AND payment_status <> $2
                "#,
            )
            .bind(id.as_uuid())
            .bind(PaymentStatus::Completed.as_str())
            .bind(SubscriptionStatus::Active.as_str())
            .bind(payment_id)
            .execute(&self.pool),
        )
        .await?;

        if result.rows_affected() == 0 {
            return self.outcome_for_unchanged(id).await;
        }

        Ok(TransitionOutcome::Applied)
    }

    async fn fail_payment(&self, id: &SubscriptionId) -> Result<TransitionOutcome, DomainError> {
        let result = bounded(
            self.timeout,
            "Failed to fail subscription payment",
            sqlx::query(
                r#"
                UPDATE subscriptions SET
                    payment_status = $2,
                    status = $3,
                    updated_at = NOW()
                WHERE id = $1 AND payment_status <> $4
                "#,
            )
            .bind(id.as_uuid())
            .bind(PaymentStatus::Failed.as_str())
            .bind(SubscriptionStatus::Cancelled.as_str())
            .bind(PaymentStatus::Completed.as_str())
            .execute(&self.pool),
        )
        .await?;

        if result.rows_affected() == 0 {
            return self.outcome_for_unchanged(id).await;
        }

        Ok(TransitionOutcome::Applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(payment_status: &str, status: &str) -> SubscriptionRow {
        SubscriptionRow {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            order_id: "order_1".to_string(),
            payment_id: None,
            payment_status: payment_status.to_string(),
            status: status.to_string(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn billing_status_outside_known_set_still_loads() {
        let subscription = Subscription::try_from(row("pending", "trialing")).unwrap();

        assert_eq!(
            subscription.status,
            SubscriptionStatus::Other("trialing".to_string())
        );
        assert_eq!(subscription.payment_status, PaymentStatus::Pending);
    }

    #[test]
    fn unknown_payment_status_is_rejected() {
        let err = Subscription::try_from(row("refunded_maybe", "active")).unwrap_err();
        assert_eq!(err.code, ErrorCode::DatabaseError);
    }
}
