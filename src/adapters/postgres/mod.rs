//! PostgreSQL adapters - Database implementations for repository ports.
//!
//! This module provides adapters for PostgreSQL-backed persistence:
//! - `PostgresProcessedEventStore` - Idempotency ledger (`processed_webhook_events`)
//! - `PostgresSubscriptionRepository` - Conditional payment transitions
//! - `PostgresPurchaseRepository` - Purchase mirror updates
//!
//! Every statement is bounded by the configured store timeout. Timeouts and
//! connection-level failures map to `ErrorCode::StoreUnavailable` so the
//! pipeline can answer 503 and let the provider redeliver.

mod processed_event_store;
mod purchase_repository;
mod subscription_repository;

pub use processed_event_store::PostgresProcessedEventStore;
pub use purchase_repository::PostgresPurchaseRepository;
pub use subscription_repository::PostgresSubscriptionRepository;

use std::future::Future;
use std::time::Duration;

use crate::domain::foundation::{DomainError, ErrorCode};

/// Runs a query future under `timeout`, mapping failures to `DomainError`.
pub(crate) async fn bounded<T, F>(timeout: Duration, context: &str, query: F) -> Result<T, DomainError>
where
    F: Future<Output = Result<T, sqlx::Error>>,
{
    match tokio::time::timeout(timeout, query).await {
        Ok(result) => result.map_err(|e| map_sqlx_error(e, context)),
        Err(_) => Err(DomainError::store_unavailable(format!(
            "{}: timed out after {}ms",
            context,
            timeout.as_millis()
        ))),
    }
}

/// Classifies a sqlx error as unavailability or a plain database error.
pub(crate) fn map_sqlx_error(e: sqlx::Error, context: &str) -> DomainError {
    match e {
        sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::WorkerCrashed => {
            DomainError::store_unavailable(format!("{}: {}", context, e))
        }
        other => DomainError::new(ErrorCode::DatabaseError, format!("{}: {}", context, other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_timeout_is_unavailable() {
        let err = map_sqlx_error(sqlx::Error::PoolTimedOut, "Failed to record event");
        assert!(err.is_unavailable());
        assert!(err.message.starts_with("Failed to record event"));
    }

    #[test]
    fn row_not_found_is_database_error() {
        let err = map_sqlx_error(sqlx::Error::RowNotFound, "Failed to load");
        assert_eq!(err.code, ErrorCode::DatabaseError);
        assert!(!err.is_unavailable());
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_query_times_out_as_unavailable() {
        let stalled = std::future::pending::<Result<(), sqlx::Error>>();
        let err = bounded(Duration::from_millis(50), "Failed to find", stalled)
            .await
            .unwrap_err();

        assert!(err.is_unavailable());
        assert!(err.message.contains("timed out after 50ms"));
    }

    #[tokio::test]
    async fn completed_query_passes_through() {
        let value = bounded(Duration::from_secs(1), "ctx", async { Ok::<_, sqlx::Error>(7) })
            .await
            .unwrap();
        assert_eq!(value, 7);
    }
}
