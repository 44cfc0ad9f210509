//! Redis-backed sliding-window rate limiter for multi-instance deployments.
//!
//! Each source is a sorted set of admitted request times (milliseconds). A
//! Lua script trims expired entries, counts, and conditionally adds the new
//! request in one round trip, so concurrent instances cannot both take the
//! last slot. Keys expire with the window, so idle sources cost nothing.

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Script};

use crate::domain::foundation::Timestamp;
use crate::ports::{
    RateLimitDenied, RateLimitError, RateLimitKey, RateLimitResult, RateLimitStatus, RateLimiter,
};

use super::config::RateLimitConfig;

// KEYS[1] = key, ARGV = now_ms, window_ms, limit, member
// returns {admitted, count, retry_after_ms}
const SLIDING_WINDOW_SCRIPT: &str = r#"
local key = KEYS[1]
local now = tonumber(ARGV[1])
local window = tonumber(ARGV[2])
local limit = tonumber(ARGV[3])

redis.call('ZREMRANGEBYSCORE', key, '-inf', now - window)
local count = redis.call('ZCARD', key)

if count >= limit then
  local retry = window
  local oldest = redis.call('ZRANGE', key, 0, 0, 'WITHSCORES')
  if oldest[2] then
    retry = tonumber(oldest[2]) + window - now
  end
  return {0, count, retry}
end

redis.call('ZADD', key, now, ARGV[4])
redis.call('PEXPIRE', key, window)
return {1, count + 1, 0}
"#;

/// Redis-backed rate limiter for production multi-server deployments.
#[derive(Clone)]
pub struct RedisRateLimiter {
    conn: MultiplexedConnection,
    config: RateLimitConfig,
    script: Script,
}

impl RedisRateLimiter {
    /// Create a new Redis rate limiter.
    pub fn new(conn: MultiplexedConnection, config: RateLimitConfig) -> Self {
        Self {
            conn,
            config,
            script: Script::new(SLIDING_WINDOW_SCRIPT),
        }
    }

    fn window_ms(&self) -> i64 {
        i64::from(self.config.window_secs) * 1000
    }
}

fn unavailable(e: redis::RedisError) -> RateLimitError {
    RateLimitError::Unavailable(e.to_string())
}

#[async_trait]
impl RateLimiter for RedisRateLimiter {
    async fn check(&self, key: RateLimitKey) -> Result<RateLimitResult, RateLimitError> {
        let limit = self.config.max_requests;
        let now_ms = Timestamp::now().as_datetime().timestamp_millis();
        let member = format!("{}-{}", now_ms, uuid::Uuid::new_v4());

        let mut conn = self.conn.clone();
        let (admitted, count, retry_after_ms): (i64, i64, i64) = self
            .script
            .key(key.to_redis_key())
            .arg(now_ms)
            .arg(self.window_ms())
            .arg(limit)
            .arg(member)
            .invoke_async(&mut conn)
            .await
            .map_err(unavailable)?;

        if admitted == 0 {
            let retry_after_secs = (retry_after_ms.max(0) + 999) / 1000;
            return Ok(RateLimitResult::Denied(RateLimitDenied {
                limit,
                retry_after_secs: u32::try_from(retry_after_secs).unwrap_or(u32::MAX).max(1),
            }));
        }

        Ok(RateLimitResult::Allowed(RateLimitStatus {
            limit,
            remaining: limit.saturating_sub(u32::try_from(count).unwrap_or(u32::MAX)),
            window_secs: self.config.window_secs,
        }))
    }

    async fn reset(&self, key: RateLimitKey) -> Result<(), RateLimitError> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(key.to_redis_key())
            .await
            .map_err(unavailable)?;
        Ok(())
    }
}

impl std::fmt::Debug for RedisRateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisRateLimiter")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
