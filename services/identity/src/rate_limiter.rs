//! Sliding-window rate limiter keyed by client address
//!
//! A request is admitted only if fewer than `max_requests` prior timestamps
//! from the same key fall within the trailing window. Timestamps are trimmed
//! on every check, and a rejected request does not consume budget.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::warn;

/// Rate limiter configuration
#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    /// Maximum number of requests allowed within the window
    pub max_requests: u32,
    /// Length of the trailing window
    pub window: Duration,
}

/// Sliding-window rate limiter
#[derive(Debug, Clone)]
pub struct RateLimiter {
    config: RateLimiterConfig,
    entries: Arc<Mutex<HashMap<String, Vec<Instant>>>>,
}

impl RateLimiter {
    /// Create a new rate limiter
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            config: RateLimiterConfig {
                max_requests,
                window,
            },
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Check whether a request from `key` is admitted, recording it if so
    pub async fn is_allowed(&self, key: &str) -> bool {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();

        // Trim every key and drop the ones left empty; quiet clients must
        // not keep the map growing with distinct addresses.
        entries.retain(|_, timestamps| {
            timestamps.retain(|t| now.duration_since(*t) < self.config.window);
            !timestamps.is_empty()
        });

        let timestamps = entries.entry(key.to_string()).or_default();
        if timestamps.len() as u32 >= self.config.max_requests {
            warn!("Rate limit exceeded for key {}", key);
            return false;
        }

        timestamps.push(now);
        true
    }

    /// Get the rate limiter configuration
    pub fn config(&self) -> &RateLimiterConfig {
        &self.config
    }

    #[cfg(test)]
    async fn tracked_keys(&self) -> usize {
        self.entries.lock().await.len()
    }
}
