//! PostgreSQL implementation of PurchaseRepository.

use async_trait::async_trait;
use sqlx::PgPool;
use std::time::Duration;

use crate::domain::billing::PurchaseStatus;
use crate::domain::foundation::DomainError;
use crate::ports::PurchaseRepository;

use super::bounded;

/// PostgreSQL implementation of the PurchaseRepository port.
pub struct PostgresPurchaseRepository {
    pool: PgPool,
    timeout: Duration,
}

impl PostgresPurchaseRepository {
    /// Creates a repository whose statements are bounded by `timeout`.
    pub fn new(pool: PgPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }
}

#[async_trait]
impl PurchaseRepository for PostgresPurchaseRepository {
    async fn update_status(
        &self,
        order_id: &str,
        status: PurchaseStatus,
        payment_id: Option<&str>,
    ) -> Result<u64, DomainError> {
        let result = bounded(
            self.timeout,
            "Failed to update purchase",
            sqlx::query(
                r#"
                UPDATE purchases SET
                    status = $2,
                    payment_id = COALESCE($3, payment_id),
                    updated_at = NOW()
                WHERE order_id = $1
                "#,
            )
            .bind(order_id)
            .bind(status.as_str())
            .bind(payment_id)
            .execute(&self.pool),
        )
        .await?;

        Ok(result.rows_affected())
    }
}
