//! Rate limiting port for bounding inbound delivery volume.
//!
//! Limits are a sliding window per source: at most `limit` admitted requests
//! in any trailing `window_secs` interval. Implementations can use in-memory
//! storage for a single node or Redis when several nodes share a budget.

use async_trait::async_trait;
use std::fmt;

/// Port for rate limiting operations.
///
/// Implementations must be thread-safe. A check both tests and consumes:
/// an allowed check counts toward the window, a denied one does not.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Check if a request from `key` is admitted, recording it if so.
    async fn check(&self, key: RateLimitKey) -> Result<RateLimitResult, RateLimitError>;

    /// Clear recorded requests for a key (admin operation).
    async fn reset(&self, key: RateLimitKey) -> Result<(), RateLimitError>;
}

/// Key identifying the source being limited.
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub struct RateLimitKey {
    /// Logical endpoint, e.g. `razorpay`.
    pub bucket: String,
    /// Client identity within the bucket, usually an IP address.
    pub source: String,
}

impl RateLimitKey {
    /// Creates a key for a client IP within a bucket.
    ///
    /// A blank source collapses to `unknown`, so unidentifiable clients
    /// share one budget rather than escaping the limit.
    pub fn ip(bucket: &str, ip: &str) -> Self {
        let ip = ip.trim();
        Self {
            bucket: bucket.to_string(),
            source: if ip.is_empty() { "unknown".to_string() } else { ip.to_string() },
        }
    }

    /// Returns the Redis key string for this rate limit key.
    pub fn to_redis_key(&self) -> String {
        format!("ratelimit:webhook:{}:{}", self.bucket, self.source)
    }
}

impl fmt::Display for RateLimitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.bucket, self.source)
    }
}

/// Result of a rate limit check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimitResult {
    /// Request is admitted; includes current status.
    Allowed(RateLimitStatus),
    /// Request is refused; includes denial details.
    Denied(RateLimitDenied),
}

impl RateLimitResult {
    /// Returns true if the request was allowed.
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateLimitResult::Allowed(_))
    }

    /// Returns true if the request was denied.
    pub fn is_denied(&self) -> bool {
        matches!(self, RateLimitResult::Denied(_))
    }
}

/// Rate limit status after an admitted request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitStatus {
    /// Maximum requests allowed in the window.
    pub limit: u32,
    /// Remaining requests in the current window.
    pub remaining: u32,
    /// Window duration in seconds.
    pub window_secs: u32,
}

/// Details of a rate limit denial.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitDenied {
    /// Maximum requests allowed in the window.
    pub limit: u32,
    /// Seconds until the oldest admitted request leaves the window.
    pub retry_after_secs: u32,
}

/// Errors that can occur during rate limiting operations.
#[derive(Debug, thiserror::Error)]
pub enum RateLimitError {
    /// Rate limiter backend is unavailable.
    #[error("rate limiter unavailable: {0}")]
    Unavailable(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ip_key_keeps_bucket_and_source() {
        let key = RateLimitKey::ip("razorpay", "192.168.1.1");
        assert_eq!(key.bucket, "razorpay");
        assert_eq!(key.source, "192.168.1.1");
    }

    #[test]
    fn blank_source_collapses_to_unknown() {
        let key = RateLimitKey::ip("razorpay", "   ");
        assert_eq!(key.source, "unknown");
    }

    #[test]
    fn redis_key_format() {
        let key = RateLimitKey::ip("razorpay", "10.0.0.1");
        assert_eq!(key.to_redis_key(), "ratelimit:webhook:razorpay:10.0.0.1");
    }

    #[test]
    fn rate_limit_result_is_allowed_works() {
        let result = RateLimitResult::Allowed(RateLimitStatus {
            limit: 100,
            remaining: 50,
            window_secs: 60,
        });
        assert!(result.is_allowed());
        assert!(!result.is_denied());
    }

    #[test]
    fn rate_limit_result_is_denied_works() {
        let result = RateLimitResult::Denied(RateLimitDenied {
            limit: 100,
            retry_after_secs: 30,
        });
        assert!(result.is_denied());
        assert!(!result.is_allowed());
    }
}
