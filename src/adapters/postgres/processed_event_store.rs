//! PostgreSQL implementation of the idempotency ledger.
//!
//! Claiming an event is an `INSERT ... ON CONFLICT DO NOTHING` on the
//! `event_id` primary key; the database, not the process, decides which
//! concurrent delivery wins. Stale claims are taken over with a single
//! conditional `UPDATE`, so reclaiming has exactly one winner as well.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::time::Duration;

use crate::domain::foundation::{DomainError, ErrorCode, Timestamp};
use crate::ports::{
    EventStatus, NewEventRecord, ProcessedEventRecord, ProcessedEventStore, RecordResult,
};

use super::bounded;

/// PostgreSQL implementation of the ProcessedEventStore port.
pub struct PostgresProcessedEventStore {
    pool: PgPool,
    timeout: Duration,
}

impl PostgresProcessedEventStore {
    /// Creates a store whose statements are bounded by `timeout`.
    pub fn new(pool: PgPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ProcessedEventRow {
    event_id: String,
    event_type: String,
    order_id: Option<String>,
    payment_id: Option<String>,
    payload: serde_json::Value,
    status: String,
    error_message: Option<String>,
    created_at: DateTime<Utc>,
    claimed_at: DateTime<Utc>,
    processed_at: Option<DateTime<Utc>>,
}

impl TryFrom<ProcessedEventRow> for ProcessedEventRecord {
    type Error = DomainError;

    fn try_from(row: ProcessedEventRow) -> Result<Self, Self::Error> {
        let status = row.status.parse::<EventStatus>().map_err(|e| {
            DomainError::new(ErrorCode::DatabaseError, format!("Invalid event status: {}", e))
        })?;

        Ok(ProcessedEventRecord {
            event_id: row.event_id,
            event_type: row.event_type,
            order_id: row.order_id,
            payment_id: row.payment_id,
            payload: row.payload,
            status,
            error_message: row.error_message,
            created_at: Timestamp::from_datetime(row.created_at),
            claimed_at: Timestamp::from_datetime(row.claimed_at),
            processed_at: row.processed_at.map(Timestamp::from_datetime),
        })
    }
}

#[async_trait]
impl ProcessedEventStore for PostgresProcessedEventStore {
    async fn record_if_new(
        &self,
        event: NewEventRecord,
        lease_secs: u64,
    ) -> Result<RecordResult, DomainError> {
        let inserted = bounded(
            self.timeout,
            "Failed to record webhook event",
            sqlx::query(
                r#"
                INSERT INTO processed_webhook_events (
                    event_id, event_type, order_id, payment_id, payload,
                    status, created_at, claimed_at
                ) VALUES ($1, $2, $3, $4, $5, 'recorded', NOW(), NOW())
                ON CONFLICT (event_id) DO NOTHING
                "#,
            )
            .bind(&event.event_id)
            .bind(&event.event_type)
            .bind(&event.order_id)
            .bind(&event.payment_id)
            .bind(&event.payload)
            .execute(&self.pool),
        )
        .await?;

        if inserted.rows_affected() == 1 {
            return Ok(RecordResult::Inserted);
        }

        let reclaimed = bounded(
            self.timeout,
            "Failed to reclaim webhook event",
            sqlx::query(
                r#"
                UPDATE processed_webhook_events
                SET claimed_at = NOW(), payload = $2
                WHERE event_id = $1
                  AND status = 'recorded'
                  AND claimed_at <= NOW() - make_interval(secs => $3)
                "#,
            )
            .bind(&event.event_id)
            .bind(&event.payload)
            .bind(lease_secs as f64)
            .execute(&self.pool),
        )
        .await?;

        if reclaimed.rows_affected() == 1 {
            tracing::info!(event_id = %event.event_id, "Reclaimed stale webhook event claim");
            return Ok(RecordResult::Inserted);
        }

        let status: Option<String> = bounded(
            self.timeout,
            "Failed to read webhook event status",
            sqlx::query_scalar("SELECT status FROM processed_webhook_events WHERE event_id = $1")
                .bind(&event.event_id)
                .fetch_optional(&self.pool),
        )
        .await?;

        match status.as_deref().map(str::parse::<EventStatus>) {
            Some(Ok(EventStatus::Recorded)) => Ok(RecordResult::InFlight),
            Some(Ok(_)) => Ok(RecordResult::AlreadyProcessed),
            Some(Err(e)) => Err(DomainError::new(
                ErrorCode::DatabaseError,
                format!("Invalid event status: {}", e),
            )),
            // ledger rows are never deleted
            None => Err(DomainError::new(
                ErrorCode::DatabaseError,
                format!("Webhook event {} missing after insert conflict", event.event_id),
            )),
        }
    }

    async fn mark_outcome(
        &self,
        event_id: &str,
        error_message: Option<String>,
    ) -> Result<(), DomainError> {
        let status = if error_message.is_some() {
            EventStatus::ProcessedWithError
        } else {
            EventStatus::Processed
        };

        let result = bounded(
            self.timeout,
            "Failed to mark webhook event outcome",
            sqlx::query(
                r#"
                UPDATE processed_webhook_events
                SET status = $2, error_message = $3, processed_at = NOW()
                WHERE event_id = $1
                "#,
            )
            .bind(event_id)
            .bind(status.as_str())
            .bind(&error_message)
            .execute(&self.pool),
        )
        .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::new(
                ErrorCode::EventNotFound,
                format!("Webhook event {} not found", event_id),
            ));
        }

        Ok(())
    }

    async fn release(&self, event_id: &str) -> Result<(), DomainError> {
        bounded(
            self.timeout,
            "Failed to release webhook event",
            sqlx::query(
                r#"
                UPDATE processed_webhook_events
                SET claimed_at = 'epoch'
                WHERE event_id = $1 AND status = 'recorded'
                "#,
            )
            .bind(event_id)
            .execute(&self.pool),
        )
        .await?;

        Ok(())
    }

    async fn find(&self, event_id: &str) -> Result<Option<ProcessedEventRecord>, DomainError> {
        let row: Option<ProcessedEventRow> = bounded(
            self.timeout,
            "Failed to find webhook event",
            sqlx::query_as(
                r#"
                SELECT event_id, event_type, order_id, payment_id, payload, status,
                       error_message, created_at, claimed_at, processed_at
                FROM processed_webhook_events
                WHERE event_id = $1
                "#,
            )
            .bind(event_id)
            .fetch_optional(&self.pool),
        )
        .await?;

        row.map(ProcessedEventRecord::try_from).transpose()
    }
}
