//! In-memory idempotency ledger.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;

use crate::domain::foundation::{DomainError, ErrorCode, Timestamp};
use crate::ports::{
    EventStatus, NewEventRecord, ProcessedEventRecord, ProcessedEventStore, RecordResult,
};

/// In-memory ledger. The map lock makes `record_if_new` atomic within one
/// process only.
#[derive(Debug, Default)]
pub struct InMemoryProcessedEventStore {
    records: Mutex<HashMap<String, ProcessedEventRecord>>,
    unavailable: AtomicBool,
}

impl InMemoryProcessedEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent call fail with `StoreUnavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of ledger rows.
    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn ensure_available(&self) -> Result<(), DomainError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(DomainError::store_unavailable("ledger store unavailable"));
        }
        Ok(())
    }
}

#[async_trait]
impl ProcessedEventStore for InMemoryProcessedEventStore {
    async fn record_if_new(
        &self,
        event: NewEventRecord,
        lease_secs: u64,
    ) -> Result<RecordResult, DomainError> {
        self.ensure_available()?;
        let now = Timestamp::now();
        let mut records = self.records.lock().await;

        match records.get_mut(&event.event_id) {
            None => {
                records.insert(
                    event.event_id.clone(),
                    ProcessedEventRecord::recorded(event, now),
                );
                Ok(RecordResult::Inserted)
            }
            Some(existing) if existing.claim_expired(now, lease_secs) => {
                existing.claimed_at = now;
                existing.payload = event.payload;
                Ok(RecordResult::Inserted)
            }
            Some(existing) if existing.status.is_terminal() => Ok(RecordResult::AlreadyProcessed),
            Some(_) => Ok(RecordResult::InFlight),
        }
    }

    async fn mark_outcome(
        &self,
        event_id: &str,
        error_message: Option<String>,
    ) -> Result<(), DomainError> {
        self.ensure_available()?;
        let mut records = self.records.lock().await;
        let record = records.get_mut(event_id).ok_or_else(|| {
            DomainError::new(
                ErrorCode::EventNotFound,
                format!("Webhook event {} not found", event_id),
            )
        })?;

        record.status = if error_message.is_some() {
            EventStatus::ProcessedWithError
        } else {
            EventStatus::Processed
        };
        record.error_message = error_message;
        record.processed_at = Some(Timestamp::now());
        Ok(())
    }

    async fn release(&self, event_id: &str) -> Result<(), DomainError> {
        self.ensure_available()?;
        let mut records = self.records.lock().await;
        if let Some(record) = records.get_mut(event_id) {
            if record.status == EventStatus::Recorded {
                // far enough back that any lease has expired
                record.claimed_at = record.created_at.minus_secs(u64::from(u32::MAX));
            }
        }
        Ok(())
    }

    async fn find(&self, event_id: &str) -> Result<Option<ProcessedEventRecord>, DomainError> {
        self.ensure_available()?;
        Ok(self.records.lock().await.get(event_id).cloned())
    }
}
