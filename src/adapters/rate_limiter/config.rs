//! Rate limit configuration types.

use serde::{Deserialize, Serialize};

/// Sliding-window limits applied to inbound deliveries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Window length in seconds.
    #[serde(default = "default_window_secs")]
    pub window_secs: u32,

    /// Maximum admitted requests per source within one window.
    #[serde(default = "default_max_requests")]
    pub max_requests: u32,

    /// Upper bound on distinct sources tracked in memory.
    ///
    /// When full, idle sources are evicted first; if every tracked source is
    /// active, new sources share the overflow bucket.
    #[serde(default = "default_max_tracked_sources")]
    pub max_tracked_sources: usize,

    /// How often idle sources are swept from memory.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

fn default_window_secs() -> u32 {
    60
}

fn default_max_requests() -> u32 {
    100
}

fn default_max_tracked_sources() -> usize {
    10_000
}

fn default_sweep_interval_secs() -> u64 {
    60
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_secs: default_window_secs(),
            max_requests: default_max_requests(),
            max_tracked_sources: default_max_tracked_sources(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

impl RateLimitConfig {
    /// Creates a config with the given limit and window, other values default.
    pub fn new(max_requests: u32, window_secs: u32) -> Self {
        Self {
            window_secs,
            max_requests,
            ..Self::default()
        }
    }

    /// Set the tracked-source bound.
    pub fn with_max_tracked_sources(mut self, max: usize) -> Self {
        self.max_tracked_sources = max;
        self
    }

    /// Validates the limits, returning a description of the first problem.
    pub fn validate(&self) -> Result<(), String> {
        if self.window_secs == 0 {
            return Err("rate_limit.window_secs must be greater than 0".to_string());
        }
        if self.max_requests == 0 {
            return Err("rate_limit.max_requests must be greater than 0".to_string());
        }
        if self.max_tracked_sources == 0 {
            return Err("rate_limit.max_tracked_sources must be greater than 0".to_string());
        }
        if self.sweep_interval_secs == 0 {
            return Err("rate_limit.sweep_interval_secs must be greater than 0".to_string());
        }
        Ok(())
    }
}
