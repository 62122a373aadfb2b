//! Sliding-window rate limiter
//!
//! Keeps the start instants of the calls made in the last window. `acquire` admits a
//! call when fewer than `limit` starts remain in the window; otherwise it sleeps until
//! the oldest start ages out and tries again. The lock is never held across a sleep
//! and each sleep is at most one window long.

use crate::config::RateLimitConfig;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

#[derive(Debug)]
pub struct RateLimiter {
    limit: usize,
    window: Duration,
    starts: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    /// At most `limit` calls may start in any `window`
    ///
    /// A zero limit is treated as one.
    pub fn new(limit: u32, window: Duration) -> Self {
        let limit = limit.max(1) as usize;
        Self {
            limit,
            window,
            starts: Mutex::new(VecDeque::with_capacity(limit)),
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.count, Duration::from_secs(config.window_seconds))
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Wait until a call may start, then record it; returns the time spent waiting
    pub async fn acquire(&self) -> Duration {
        let started = Instant::now();
        loop {
            let wait = {
                let mut starts = self.starts.lock().await;
                let now = Instant::now();
                while starts
                    .front()
                    .is_some_and(|&oldest| now.duration_since(oldest) >= self.window)
                {
                    starts.pop_front();
                }

                if starts.len() < self.limit {
                    starts.push_back(now);
                    return started.elapsed();
                }

                match starts.front() {
                    Some(&oldest) => (oldest + self.window).saturating_duration_since(now),
                    None => Duration::ZERO,
                }
            };

            tracing::debug!(
                wait_ms = wait.as_millis() as u64,
                limit = self.limit,
                window_ms = self.window.as_millis() as u64,
                "Rate limit reached, waiting"
            );
            tokio::time::sleep(wait).await;
        }
    }

    /// Calls started within the current window
    pub async fn in_window(&self) -> usize {
        let starts = self.starts.lock().await;
        let now = Instant::now();
        starts
            .iter()
            .filter(|&&start| now.duration_since(start) < self.window)
            .count()
    }
}
