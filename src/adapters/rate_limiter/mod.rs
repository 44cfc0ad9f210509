//! Rate limiter adapters.
//!
//! Implementations of the RateLimiter port for different backends.
//!
//! ## Available Adapters
//!
//! - `InMemoryRateLimiter` - Bounded in-memory sliding window, single instance
//! - `RedisRateLimiter` - Redis sorted-set sliding window, shared across instances
//!
//! ## Usage
//!
//! ```ignore
//! use payment_webhooks::adapters::rate_limiter::{InMemoryRateLimiter, RateLimitConfig};
//!
//! let limiter = Arc::new(InMemoryRateLimiter::new(RateLimitConfig::default()));
//! let sweeper = Arc::clone(&limiter).spawn_sweeper();
//!
//! let limiter = RedisRateLimiter::new(conn, RateLimitConfig::default());
//! ```

mod config;
mod in_memory;
mod redis;

pub use config::RateLimitConfig;
pub use in_memory::InMemoryRateLimiter;
pub use self::redis::RedisRateLimiter;
