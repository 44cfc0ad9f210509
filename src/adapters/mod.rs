//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the domain to external systems:
//! - `http` - Axum webhook endpoint
//! - `memory` - In-memory persistence (development, tests)
//! - `postgres` - PostgreSQL persistence
//! - `rate_limiter` - In-memory and Redis rate limiters

pub mod http;
pub mod memory;
pub mod postgres;
pub mod rate_limiter;
