//! ProcessedEventStore port - Idempotency ledger for webhook deliveries.
//!
//! Payment providers deliver events at least once and may redeliver the same
//! event concurrently after a timeout. Every delivery is recorded here under
//! its event id before any side effect runs; the store's uniqueness guarantee
//! on that id is the only mutual-exclusion boundary in the pipeline.
//!
//! ## Record lifecycle
//!
//! ```text
//! (absent) ──record_if_new──▶ recorded ──mark_outcome──▶ processed
//!                                 │                      processed_with_error
//!                                 └── lease expires / release ──▶ reclaimable
//! ```
//!
//! A `recorded` row whose claim is older than the lease can be reclaimed by a
//! later delivery, so a worker that crashed before `mark_outcome` does not
//! leave the event stuck.

use async_trait::async_trait;
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::{DomainError, Timestamp, ValidationError};

/// Port for the idempotency ledger.
#[async_trait]
pub trait ProcessedEventStore: Send + Sync {
    /// Atomically records a delivery unless its event id is already claimed.
    ///
    /// Under concurrent calls with the same id exactly one caller observes
    /// `Inserted`. A stale claim (older than `lease_secs`) is taken over and
    /// reported as `Inserted`.
    async fn record_if_new(
        &self,
        event: NewEventRecord,
        lease_secs: u64,
    ) -> Result<RecordResult, DomainError>;

    /// Stores the processing outcome of a claimed event.
    ///
    /// `None` marks it `processed`, `Some(message)` marks it
    /// `processed_with_error` and keeps the message for operators.
    async fn mark_outcome(
        &self,
        event_id: &str,
        error_message: Option<String>,
    ) -> Result<(), DomainError>;

    /// Gives up a `recorded` claim so the next delivery may take it.
    ///
    /// No-op for events that already reached a terminal status.
    async fn release(&self, event_id: &str) -> Result<(), DomainError>;

    /// Loads a ledger row.
    async fn find(&self, event_id: &str) -> Result<Option<ProcessedEventRecord>, DomainError>;
}

/// Data captured for a delivery at first sighting.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEventRecord {
    pub event_id: String,
    pub event_type: String,
    pub order_id: Option<String>,
    pub payment_id: Option<String>,
    pub payload: serde_json::Value,
}

/// Outcome of `record_if_new`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordResult {
    /// This caller owns the event and must process it.
    Inserted,
    /// A previous delivery already reached a terminal status.
    AlreadyProcessed,
    /// Another delivery holds a live claim on the event.
    InFlight,
}

impl RecordResult {
    /// Returns true if the caller should process the event.
    pub fn inserted(&self) -> bool {
        matches!(self, RecordResult::Inserted)
    }

    /// Returns true if the event reached a terminal status earlier.
    pub fn already_processed(&self) -> bool {
        matches!(self, RecordResult::AlreadyProcessed)
    }
}

/// Ledger status of a recorded event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventStatus {
    Recorded,
    Processed,
    ProcessedWithError,
}

impl EventStatus {
    /// Returns the database representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Recorded => "recorded",
            EventStatus::Processed => "processed",
            EventStatus::ProcessedWithError => "processed_with_error",
        }
    }

    /// Returns true once processing finished, with or without error.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, EventStatus::Recorded)
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "recorded" => Ok(EventStatus::Recorded),
            "processed" => Ok(EventStatus::Processed),
            "processed_with_error" => Ok(EventStatus::ProcessedWithError),
            other => Err(ValidationError::invalid_format(
                "event_status",
                format!("unknown status '{}'", other),
            )),
        }
    }
}

/// One ledger row.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedEventRecord {
    pub event_id: String,
    pub event_type: String,
    pub order_id: Option<String>,
    pub payment_id: Option<String>,
    pub payload: serde_json::Value,
    pub status: EventStatus,
    pub error_message: Option<String>,
    pub created_at: Timestamp,
    /// When the current claim was taken; refreshed on reclaim.
    pub claimed_at: Timestamp,
    pub processed_at: Option<Timestamp>,
}

impl ProcessedEventRecord {
    /// Creates a fresh `recorded` row claimed at `now`.
    pub fn recorded(event: NewEventRecord, now: Timestamp) -> Self {
        Self {
            event_id: event.event_id,
            event_type: event.event_type,
            order_id: event.order_id,
            payment_id: event.payment_id,
            payload: event.payload,
            status: EventStatus::Recorded,
            error_message: None,
            created_at: now,
            claimed_at: now,
            processed_at: None,
        }
    }

    /// Returns true if a `recorded` claim has outlived the lease.
    pub fn claim_expired(&self, now: Timestamp, lease_secs: u64) -> bool {
        self.status == EventStatus::Recorded
            && !now.minus_secs(lease_secs).is_before(&self.claimed_at)
    }
}
