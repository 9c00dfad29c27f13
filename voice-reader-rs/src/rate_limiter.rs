//! Sliding-window limiter for the summarizer API.
//!
//! Bounds both the number of requests and the estimated token volume inside
//! a trailing window. Callers await `wait_if_needed` before every request.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::{info, warn};

use crate::config::RateLimitConfig;

/// One recorded request inside the window.
#[derive(Debug, Clone, Copy)]
struct RateWindowEntry {
    timestamp: Instant,
    tokens: u64,
}

#[derive(Debug)]
pub struct TokenRateLimiter {
    requests: VecDeque<Instant>,
    token_usage: VecDeque<RateWindowEntry>,
    max_requests: usize,
    max_tokens: u64,
    window: Duration,
    guard: Duration,
}

impl TokenRateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            guard: Duration::from_millis(config.guard_ms),
            ..Self::with_limits(
                config.max_requests,
                config.max_tokens,
                Duration::from_millis(config.window_ms),
            )
        }
    }

    pub fn with_limits(max_requests: usize, max_tokens: u64, window: Duration) -> Self {
        Self {
            requests: VecDeque::new(),
            token_usage: VecDeque::new(),
            max_requests,
            max_tokens,
            window,
            guard: Duration::from_millis(RateLimitConfig::default().guard_ms),
        }
    }

    fn prune(&mut self, now: Instant) {
        while let Some(&t) = self.requests.front() {
            if now.duration_since(t) >= self.window {
                self.requests.pop_front();
            } else {
                break;
            }
        }
        while let Some(entry) = self.token_usage.front() {
            if now.duration_since(entry.timestamp) >= self.window {
                self.token_usage.pop_front();
            } else {
                break;
            }
        }
    }

    fn current_tokens(&self) -> u64 {
        self.token_usage.iter().map(|e| e.tokens).sum()
    }

    /// Time until `oldest` leaves the window, plus the guard margin.
    fn wait_for(&self, now: Instant, oldest: Instant) -> Duration {
        (self.window + self.guard).saturating_sub(now.duration_since(oldest))
    }

    /// Wait until a request costing `estimated_tokens` fits, then record it.
    ///
    /// The request-count and token checks are evaluated independently against
    /// the same `now`, so both waits can be paid back to back. If the window
    /// is still over a limit afterwards the checks run again. Returns the
    /// total time spent waiting.
    pub async fn wait_if_needed(&mut self, estimated_tokens: u64) -> Duration {
        let started = Instant::now();

        if estimated_tokens > self.max_tokens {
            warn!(
                "Estimated {estimated_tokens} tokens exceeds the {} token window; \
                 request will only be admitted into an empty window",
                self.max_tokens
            );
        }

        loop {
            let now = Instant::now();
            self.prune(now);
            let current_tokens = self.current_tokens();
            let mut waited = false;

            if self.requests.len() >= self.max_requests {
                if let Some(&oldest) = self.requests.front() {
                    let wait = self.wait_for(now, oldest);
                    if !wait.is_zero() {
                        info!(
                            "Request limit reached ({}/{}), waiting {}s",
                            self.requests.len(),
                            self.max_requests,
                            wait.as_millis().div_ceil(1000)
                        );
                        sleep(wait).await;
                        waited = true;
                    }
                }
            }

            if current_tokens + estimated_tokens > self.max_tokens {
                if let Some(oldest) = self.token_usage.front().map(|e| e.timestamp) {
                    let wait = self.wait_for(now, oldest);
                    if !wait.is_zero() {
                        info!(
                            "Token limit reached ({current_tokens}+{estimated_tokens}/{}), waiting {}s",
                            self.max_tokens,
                            wait.as_millis().div_ceil(1000)
                        );
                        sleep(wait).await;
                        waited = true;
                    }
                }
            }

            if !waited {
                break;
            }
        }

        let now = Instant::now();
        self.requests.push_back(now);
        self.token_usage.push_back(RateWindowEntry {
            timestamp: now,
            tokens: estimated_tokens,
        });

        now.duration_since(started)
    }

    /// Requests and tokens currently inside the window.
    pub fn usage(&mut self) -> (usize, u64) {
        self.prune(Instant::now());
        (self.requests.len(), self.current_tokens())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_under_limit_does_not_wait() {
        let mut limiter = TokenRateLimiter::with_limits(3, 100, Duration::from_secs(60));
        assert_eq!(limiter.wait_if_needed(30).await, Duration::ZERO);
        assert_eq!(limiter.wait_if_needed(30).await, Duration::ZERO);
        assert_eq!(limiter.usage(), (2, 60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_third_call_blocks_until_window_frees() {
        let mut limiter = TokenRateLimiter::with_limits(2, 100, Duration::from_millis(1000));
        let start = Instant::now();

        limiter.wait_if_needed(50).await;
        tokio::time::advance(Duration::from_millis(5)).await;
        limiter.wait_if_needed(50).await;
        tokio::time::advance(Duration::from_millis(5)).await;
        assert!(start.elapsed() < Duration::from_millis(20));

        let waited = limiter.wait_if_needed(50).await;
        assert!(start.elapsed() >= Duration::from_millis(990));

        // Request and token waits both fire and are paid one after the other
        let single = Duration::from_millis(1000 + 1000 - 10);
        assert_eq!(waited, single * 2);
        assert_eq!(start.elapsed(), Duration::from_millis(10) + single * 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_entries_expire_after_window() {
        let mut limiter = TokenRateLimiter::with_limits(1, 100, Duration::from_millis(500));
        limiter.wait_if_needed(100).await;
        tokio::time::advance(Duration::from_millis(500)).await;
        assert_eq!(limiter.usage(), (0, 0));
        assert_eq!(limiter.wait_if_needed(100).await, Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_never_exceeds_limits() {
        let mut limiter = TokenRateLimiter::with_limits(3, 100, Duration::from_millis(1000));
        let costs = [10, 90, 50, 30, 70, 100, 5, 5, 5, 60, 40, 1];

        for (i, cost) in costs.into_iter().enumerate() {
            limiter.wait_if_needed(cost).await;
            let (requests, tokens) = limiter.usage();
            assert!(requests <= 3, "call {i}: {requests} requests in window");
            assert!(tokens <= 100, "call {i}: {tokens} tokens in window");
            tokio::time::advance(Duration::from_millis(120)).await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_oversize_request_is_admitted_into_empty_window() {
        let mut limiter = TokenRateLimiter::with_limits(10, 100, Duration::from_millis(1000));
        assert_eq!(limiter.wait_if_needed(500).await, Duration::ZERO);
        assert_eq!(limiter.usage(), (1, 500));
    }
}
