//! In-memory adapters for the persistence ports.
//!
//! Used for local development without a database and as test doubles. Each
//! store can be switched into an unavailable mode to exercise the
//! store-outage paths of the pipeline.

mod processed_event_store;
mod purchase_repository;
mod subscription_repository;

pub use processed_event_store::InMemoryProcessedEventStore;
pub use purchase_repository::{InMemoryPurchaseRepository, PurchaseEntry};
pub use subscription_repository::InMemorySubscriptionRepository;
