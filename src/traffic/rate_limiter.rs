//! # Rate Limiter
//!
//! Admission control for requests headed to the upstream authentication
//! service. A fixed-window counter is kept per named operation: when the
//! current window has expired it is reset lazily on access, and a permit is
//! granted only while the consumed count is below the configured limit.
//!
//! Denial is not an error condition. It is a control signal the proxy
//! handler maps to a `RATE_LIMITED` outcome; no retry happens here.
//!
//! ## Concurrency
//! Each operation key owns its own window state behind a `parking_lot`
//! mutex inside a `DashMap`, so admission is atomic per operation without
//! serializing unrelated operations. Two concurrent callers can never both
//! observe a stale count for the same key.

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::debug;

/// Configuration for the per-operation rate limiter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimiterConfig {
    /// Maximum permits granted per window
    pub permits_per_window: u32,

    /// Duration of the fixed window
    #[serde(with = "humantime_serde")]
    pub window_duration: Duration,

    /// Optional bound on how long `acquire` may wait for the window to roll
    /// before rejecting. `None` makes admission strictly non-blocking.
    #[serde(default, with = "humantime_serde::option")]
    pub acquire_timeout: Option<Duration>,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            permits_per_window: 5,
            window_duration: Duration::from_secs(1),
            acquire_timeout: None,
        }
    }
}

/// Per-operation window state, guarded by its own lock
#[derive(Debug)]
struct WindowState {
    window_start: Instant,
    consumed: u32,
}

/// Fixed-window rate limiter keyed by operation name
pub struct RateLimiter {
    config: RateLimiterConfig,
    windows: DashMap<String, Mutex<WindowState>>,
}

impl RateLimiter {
    pub fn new(config: RateLimiterConfig) -> Self {
        Self {
            config,
            windows: DashMap::new(),
        }
    }

    /// Try to acquire a permit for the given operation without waiting
    ///
    /// Returns `true` when admission is granted. Resets the window first if
    /// it has expired, so a limiter that sat idle does not carry stale
    /// counts into the next burst.
    pub fn try_acquire(&self, operation: &str) -> bool {
        let entry = self
            .windows
            .entry(operation.to_string())
            .or_insert_with(|| {
                Mutex::new(WindowState {
                    window_start: Instant::now(),
                    consumed: 0,
                })
            });

        let mut state = entry.lock();
        let now = Instant::now();

        if now.duration_since(state.window_start) >= self.config.window_duration {
            state.window_start = now;
            state.consumed = 0;
        }

        if state.consumed < self.config.permits_per_window {
            state.consumed += 1;
            true
        } else {
            debug!(
                operation = %operation,
                limit = self.config.permits_per_window,
                "rate limiter denied admission"
            );
            false
        }
    }

    /// Acquire a permit, waiting up to the configured bound for the window
    /// to roll
    ///
    /// With no `acquire_timeout` configured this is equivalent to
    /// [`try_acquire`](Self::try_acquire). The wait is never longer than the
    /// time remaining in the current window, and the deadline is respected
    /// even if other callers drain the fresh window first.
    pub async fn acquire(&self, operation: &str) -> bool {
        if self.try_acquire(operation) {
            return true;
        }

        let Some(timeout) = self.config.acquire_timeout else {
            return false;
        };
        let deadline = Instant::now() + timeout;

        loop {
            let wait = match self.time_until_window_rolls(operation) {
                Some(wait) => wait,
                None => return self.try_acquire(operation),
            };

            if Instant::now() + wait > deadline {
                return false;
            }
            tokio::time::sleep(wait).await;

            if self.try_acquire(operation) {
                return true;
            }
        }
    }

    /// Time remaining in the operation's current window, if any
    fn time_until_window_rolls(&self, operation: &str) -> Option<Duration> {
        let entry = self.windows.get(operation)?;
        let state = entry.lock();
        let elapsed = state.window_start.elapsed();
        self.config.window_duration.checked_sub(elapsed)
    }

    pub fn config(&self) -> &RateLimiterConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn limiter(permits: u32, window: Duration) -> RateLimiter {
        RateLimiter::new(RateLimiterConfig {
            permits_per_window: permits,
            window_duration: window,
            acquire_timeout: None,
        })
    }

    #[test]
    fn test_grants_up_to_limit_then_denies() {
        let limiter = limiter(3, Duration::from_secs(60));

        assert!(limiter.try_acquire("login"));
        assert!(limiter.try_acquire("login"));
        assert!(limiter.try_acquire("login"));
        assert!(!limiter.try_acquire("login"));
        assert!(!limiter.try_acquire("login"));
    }

    #[test]
    fn test_operations_are_independent() {
        let limiter = limiter(1, Duration::from_secs(60));

        assert!(limiter.try_acquire("login"));
        assert!(!limiter.try_acquire("login"));
        // A different operation key has its own window.
        assert!(limiter.try_acquire("logout"));
    }

    #[test]
    fn test_window_resets_lazily() {
        let limiter = limiter(2, Duration::from_millis(50));

        assert!(limiter.try_acquire("login"));
        assert!(limiter.try_acquire("login"));
        assert!(!limiter.try_acquire("login"));

        std::thread::sleep(Duration::from_millis(80));

        assert!(limiter.try_acquire("login"));
        assert!(limiter.try_acquire("login"));
        assert!(!limiter.try_acquire("login"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_admission_never_exceeds_limit() {
        let limiter = Arc::new(limiter(10, Duration::from_secs(60)));

        let mut handles = Vec::new();
        for _ in 0..50 {
            let limiter = Arc::clone(&limiter);
            handles.push(tokio::spawn(
                async move { limiter.try_acquire("login") as u32 },
            ));
        }

        let mut granted = 0;
        for handle in handles {
            granted += handle.await.unwrap();
        }
        assert_eq!(granted, 10);
    }

    #[tokio::test]
    async fn test_acquire_without_timeout_is_non_blocking() {
        let limiter = limiter(1, Duration::from_secs(60));

        assert!(limiter.acquire("login").await);
        let start = Instant::now();
        assert!(!limiter.acquire("login").await);
        assert!(start.elapsed() < Duration::from_millis(20));
    }

    #[tokio::test]
    async fn test_acquire_waits_for_window_to_roll() {
        let limiter = RateLimiter::new(RateLimiterConfig {
            permits_per_window: 1,
            window_duration: Duration::from_millis(50),
            acquire_timeout: Some(Duration::from_millis(200)),
        });

        assert!(limiter.acquire("login").await);
        // Second acquisition has to wait for the next window but stays
        // within the configured bound.
        assert!(limiter.acquire("login").await);
    }

    #[tokio::test]
    async fn test_acquire_gives_up_when_wait_exceeds_bound() {
        let limiter = RateLimiter::new(RateLimiterConfig {
            permits_per_window: 1,
            window_duration: Duration::from_secs(60),
            acquire_timeout: Some(Duration::from_millis(30)),
        });

        assert!(limiter.acquire("login").await);
        assert!(!limiter.acquire("login").await);
    }
}
