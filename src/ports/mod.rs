//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! ## Webhook Ports
//!
//! - `ProcessedEventStore` - Idempotency ledger keyed by provider event id
//! - `RateLimiter` - Sliding-window limits per delivery source
//!
//! ## Billing Ports
//!
//! - `SubscriptionRepository` - Conditional payment transitions by order id
//! - `PurchaseRepository` - Best-effort purchase mirror

mod processed_event_store;
mod purchase_repository;
mod rate_limiter;
mod subscription_repository;

pub use processed_event_store::{
    EventStatus, NewEventRecord, ProcessedEventRecord, ProcessedEventStore, RecordResult,
};
pub use purchase_repository::PurchaseRepository;
pub use rate_limiter::{
    RateLimitDenied, RateLimitError, RateLimitKey, RateLimitResult, RateLimitStatus, RateLimiter,
};
pub use subscription_repository::SubscriptionRepository;
