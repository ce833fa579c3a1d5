//! Fixed-window gate in front of the generation API.
//!
//! One counter per limiter instance: the window opens on the first call,
//! every call increments the count, and the count resets once more than
//! `window` has elapsed since the window opened. A call that pushes the
//! count past `max_requests` is either suspended until the window would
//! have closed ([`ThrottlePolicy::Block`]) or rejected with a retry hint
//! ([`ThrottlePolicy::FailFast`]).
//!
//! The whole check-increment-suspend sequence runs under one async mutex,
//! so concurrent requests queue through the gate in order. The suspension
//! is a `tokio::time::sleep`, which yields to the runtime instead of
//! parking a worker thread. Every change to the counter is also published
//! to a plain mutex that [`RateLimiter::snapshot`] reads, so status readers
//! never wait behind a suspended caller.

use std::sync::Mutex as SyncMutex;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

/// What to do with a call that exceeds the window's quota.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ThrottlePolicy {
    /// Suspend the caller until the window closes, then admit it.
    #[default]
    Block,
    /// Reject the caller immediately with [`Throttled`].
    FailFast,
}

/// Configuration for a [`RateLimiter`].
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Calls admitted per window without waiting. Default: 50.
    pub max_requests: u32,
    /// Window length. Default: 60 seconds.
    pub window: Duration,
    /// Over-quota behaviour. Default: [`ThrottlePolicy::Block`].
    pub policy: ThrottlePolicy,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 50,
            window: Duration::from_secs(60),
            policy: ThrottlePolicy::Block,
        }
    }
}

/// Counter state: when the current window opened and how many calls it has seen.
#[derive(Debug, Clone, Copy)]
pub struct RateWindow {
    pub window_start: Instant,
    pub count: u32,
}

/// How a call got through the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Under quota; admitted without waiting.
    Immediate,
    /// Over quota; admitted after being suspended for the given duration.
    Waited(Duration),
}

/// Rejection under [`ThrottlePolicy::FailFast`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("rate limit exceeded, retry after {:.1}s", .retry_after.as_secs_f64())]
pub struct Throttled {
    /// Time until the current window closes.
    pub retry_after: Duration,
}

/// Single-counter fixed-window limiter.
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    /// Held for the whole admission, including any suspension.
    window: Mutex<RateWindow>,
    /// Last admitted state; never held across an await.
    published: SyncMutex<RateWindow>,
}

impl RateLimiter {
    /// Create a limiter whose first window opens now.
    ///
    /// `max_requests` is clamped to at least 1.
    pub fn new(mut config: RateLimitConfig) -> Self {
        config.max_requests = config.max_requests.max(1);
        let window = RateWindow {
            window_start: Instant::now(),
            count: 0,
        };
        Self {
            config,
            window: Mutex::new(window),
            published: SyncMutex::new(window),
        }
    }

    fn publish(&self, window: RateWindow) {
        *self.published.lock().unwrap_or_else(|e| e.into_inner()) = window;
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Pass one call through the gate.
    ///
    /// Under [`ThrottlePolicy::Block`] this never fails; it may suspend for
    /// at most one window length. After a suspension the window restarts
    /// with this call counted in it.
    pub async fn acquire(&self) -> Result<Admission, Throttled> {
        let mut window = self.window.lock().await;

        let now = Instant::now();
        let elapsed = now.duration_since(window.window_start);
        if elapsed > self.config.window {
            debug!(
                "Rate window expired after {:.1}s ({} calls), resetting",
                elapsed.as_secs_f64(),
                window.count
            );
            window.count = 0;
            window.window_start = now;
        }

        window.count = window.count.saturating_add(1);
        if window.count <= self.config.max_requests {
            self.publish(*window);
            return Ok(Admission::Immediate);
        }

        let remaining = self.config.window.saturating_sub(elapsed);
        match self.config.policy {
            ThrottlePolicy::FailFast => {
                // A rejected call does not occupy a slot.
                window.count -= 1;
                self.publish(*window);
                warn!(
                    "Rate limit hit ({} per {:.0}s). Rejecting, retry after {:.2}s",
                    self.config.max_requests,
                    self.config.window.as_secs_f64(),
                    remaining.as_secs_f64()
                );
                Err(Throttled {
                    retry_after: remaining,
                })
            }
            ThrottlePolicy::Block => {
                warn!(
                    "Rate limit hit. Waiting for {:.2} seconds...",
                    remaining.as_secs_f64()
                );
                // Readers see the full window, not the suspended call.
                self.publish(RateWindow {
                    count: self.config.max_requests,
                    ..*window
                });
                // The lock stays held: callers behind us would be over quota too.
                tokio::time::sleep(remaining).await;
                window.window_start = Instant::now();
                window.count = 1;
                self.publish(*window);
                Ok(Admission::Waited(remaining))
            }
        }
    }

    /// Copy of the counter as of the last admission or rejection.
    ///
    /// Does not wait for a caller suspended in [`acquire`](Self::acquire).
    pub fn snapshot(&self) -> RateWindow {
        *self.published.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn limiter(max_requests: u32, policy: ThrottlePolicy) -> RateLimiter {
        RateLimiter::new(RateLimitConfig {
            max_requests,
            window: Duration::from_secs(60),
            policy,
        })
    }

    #[tokio::test(start_paused = true)]
    async fn calls_under_quota_are_immediate() {
        let limiter = limiter(50, ThrottlePolicy::Block);
        for _ in 0..50 {
            assert_eq!(limiter.acquire().await, Ok(Admission::Immediate));
        }
        assert_eq!(limiter.snapshot().count, 50);
    }

    #[tokio::test(start_paused = true)]
    async fn call_over_quota_waits_out_the_window_and_counts_itself() {
        let limiter = limiter(50, ThrottlePolicy::Block);
        for _ in 0..50 {
            limiter.acquire().await.unwrap();
        }
        tokio::time::advance(Duration::from_secs(10)).await;

        let before = Instant::now();
        let admission = limiter.acquire().await.unwrap();
        let waited = before.elapsed();

        assert_eq!(admission, Admission::Waited(Duration::from_secs(50)));
        assert!(waited >= Duration::from_secs(50));
        assert!(waited <= Duration::from_secs(60));

        let window = limiter.snapshot();
        assert_eq!(window.count, 1);
        assert!(window.window_start >= before + Duration::from_secs(50));
    }

    #[tokio::test(start_paused = true)]
    async fn expired_window_resets_the_count() {
        let limiter = limiter(3, ThrottlePolicy::Block);
        for _ in 0..3 {
            limiter.acquire().await.unwrap();
        }
        tokio::time::advance(Duration::from_secs(61)).await;

        assert_eq!(limiter.acquire().await, Ok(Admission::Immediate));
        assert_eq!(limiter.snapshot().count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn fail_fast_rejects_without_consuming_a_slot() {
        let limiter = limiter(2, ThrottlePolicy::FailFast);
        limiter.acquire().await.unwrap();
        limiter.acquire().await.unwrap();
        tokio::time::advance(Duration::from_secs(15)).await;

        let err = limiter.acquire().await.unwrap_err();
        assert_eq!(err.retry_after, Duration::from_secs(45));
        assert_eq!(limiter.snapshot().count, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_callers_serialize_through_the_gate() {
        let limiter = Arc::new(limiter(2, ThrottlePolicy::Block));
        let mut handles = Vec::new();
        for _ in 0..3 {
            let limiter = limiter.clone();
            handles.push(tokio::spawn(async move { limiter.acquire().await }));
        }

        let mut waited = 0;
        for handle in handles {
            if let Admission::Waited(_) = handle.await.unwrap().unwrap() {
                waited += 1;
            }
        }
        assert_eq!(waited, 1);
        assert_eq!(limiter.snapshot().count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn snapshot_does_not_wait_for_a_suspended_caller() {
        let limiter = Arc::new(limiter(1, ThrottlePolicy::Block));
        limiter.acquire().await.unwrap();

        let waiting = {
            let limiter = limiter.clone();
            tokio::spawn(async move { limiter.acquire().await })
        };
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }

        assert!(!waiting.is_finished());
        assert_eq!(limiter.snapshot().count, 1);

        assert!(matches!(
            waiting.await.unwrap(),
            Ok(Admission::Waited(_))
        ));
        assert_eq!(limiter.snapshot().count, 1);
    }

    #[test]
    fn zero_quota_is_clamped() {
        let limiter = limiter(0, ThrottlePolicy::Block);
        assert_eq!(limiter.config().max_requests, 1);
    }
}
