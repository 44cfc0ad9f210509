//! In-memory sliding-window rate limiter.
//!
//! Each source keeps the instants of its admitted requests inside the
//! trailing window. Memory is bounded: the number of tracked sources is
//! capped and idle sources are swept periodically, since source addresses
//! are attacker-influenced. Suitable for single-instance deployments; use
//! the Redis limiter when several instances share a budget.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::ports::{
    RateLimitDenied, RateLimitError, RateLimitKey, RateLimitResult, RateLimitStatus, RateLimiter,
};

use super::config::RateLimitConfig;

/// Source that absorbs new keys once the tracked-source bound is reached.
const OVERFLOW_SOURCE: &str = "~overflow";

/// In-memory rate limiter for tests and single-server deployments.
#[derive(Debug)]
pub struct InMemoryRateLimiter {
    config: RateLimitConfig,
    windows: Arc<RwLock<HashMap<RateLimitKey, VecDeque<Instant>>>>,
}

impl InMemoryRateLimiter {
    /// Create a new in-memory rate limiter.
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            windows: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Create a rate limiter with default configuration (100 per 60s).
    pub fn with_defaults() -> Self {
        Self::new(RateLimitConfig::default())
    }

    fn window(&self) -> Duration {
        Duration::from_secs(u64::from(self.config.window_secs))
    }

    /// Number of sources currently tracked.
    pub async fn tracked_sources(&self) -> usize {
        self.windows.read().await.len()
    }

    /// Drops sources with no request inside the window.
    ///
    /// Returns the number of sources removed.
    pub async fn sweep(&self) -> usize {
        let mut windows = self.windows.write().await;
        prune_idle(&mut windows, Instant::now(), self.window())
    }

    /// Spawns a background task sweeping idle sources every
    /// `sweep_interval_secs`. The task runs until aborted.
    pub fn spawn_sweeper(self: Arc<Self>) -> JoinHandle<()> {
        let period = Duration::from_secs(self.config.sweep_interval_secs);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let removed = self.sweep().await;
                if removed > 0 {
                    tracing::debug!(removed, "Swept idle rate limit sources");
                }
            }
        })
    }
}

fn evict_expired(hits: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while let Some(oldest) = hits.front() {
        if now.duration_since(*oldest) >= window {
            hits.pop_front();
        } else {
            break;
        }
    }
}

fn prune_idle(
    windows: &mut HashMap<RateLimitKey, VecDeque<Instant>>,
    now: Instant,
    window: Duration,
) -> usize {
    let before = windows.len();
    windows.retain(|_, hits| {
        evict_expired(hits, now, window);
        !hits.is_empty()
    });
    before - windows.len()
}

fn ceil_secs(duration: Duration) -> u32 {
    let secs = duration.as_secs() + u64::from(duration.subsec_nanos() > 0);
    u32::try_from(secs).unwrap_or(u32::MAX)
}

#[async_trait]
impl RateLimiter for InMemoryRateLimiter {
    async fn check(&self, key: RateLimitKey) -> Result<RateLimitResult, RateLimitError> {
        let limit = self.config.max_requests;
        let window = self.window();
        let now = Instant::now();

        let mut windows = self.windows.write().await;

        let mut key = key;
        if !windows.contains_key(&key) && windows.len() >= self.config.max_tracked_sources {
            prune_idle(&mut windows, now, window);
            if windows.len() >= self.config.max_tracked_sources {
                tracing::warn!(
                    source = %key,
                    tracked = windows.len(),
                    "Rate limiter source table full, using overflow bucket"
                );
                key = RateLimitKey::ip(&key.bucket, OVERFLOW_SOURCE);
            }
        }

        let hits = windows.entry(key).or_default();
        evict_expired(hits, now, window);

        if hits.len() >= limit as usize {
            let retry_after = hits
                .front()
                .map(|oldest| window.saturating_sub(now.duration_since(*oldest)))
                .unwrap_or(window);

            return Ok(RateLimitResult::Denied(RateLimitDenied {
                limit,
                retry_after_secs: ceil_secs(retry_after).max(1),
            }));
        }

        hits.push_back(now);
        let remaining = limit.saturating_sub(hits.len() as u32);

        Ok(RateLimitResult::Allowed(RateLimitStatus {
            limit,
            remaining,
            window_secs: self.config.window_secs,
        }))
    }

    async fn reset(&self, key: RateLimitKey) -> Result<(), RateLimitError> {
        self.windows.write().await.remove(&key);
        Ok(())
    }
}
