//! th-runtime: the token-bucket Rate Limiter (§4.6).
//!
//! Shared across all workers in the process; a contended `acquire`
//! suspends cooperatively rather than blocking a thread. Optional — callers
//! that don't configure one use `NullRateLimiter`, a null object that never
//! suspends.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::time::sleep;
use tracing::trace;

#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Suspends the caller until `n` tokens are available, then deducts
    /// them.
    async fn acquire(&self, n: u64);
}

struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

pub struct TokenBucketLimiter {
    capacity: f64,
    refill_rate: f64,
    state: Mutex<BucketState>,
}

impl TokenBucketLimiter {
    pub fn new(capacity: u64, refill_rate: f64) -> Self {
        Self { capacity: capacity as f64, refill_rate, state: Mutex::new(BucketState { tokens: capacity as f64, last_refill: Instant::now() }) }
    }

    /// How long the caller must wait for `n` tokens to become available,
    /// given the current state, without mutating it.
    fn wait_for(&self, n: f64) -> Option<Duration> {
        let mut state = self.state.lock().expect("rate limiter lock poisoned");
        let elapsed = state.last_refill.elapsed();
        let refreshed = (state.tokens + elapsed.as_secs_f64() * self.refill_rate).min(self.capacity);
        state.tokens = refreshed;
        state.last_refill = Instant::now();

        if state.tokens >= n {
            state.tokens -= n;
            None
        } else {
            let deficit = n - state.tokens;
            let seconds = if self.refill_rate > 0.0 { deficit / self.refill_rate } else { f64::INFINITY };
            Some(Duration::from_secs_f64(seconds.max(0.0)))
        }
    }
}

#[async_trait]
impl RateLimiter for TokenBucketLimiter {
    async fn acquire(&self, n: u64) {
        let n = n as f64;
        loop {
            match self.wait_for(n) {
                None => return,
                Some(duration) => {
                    trace!(?duration, tokens_requested = n, "rate limiter suspending caller until refill");
                    sleep(duration).await;
                }
            }
        }
    }
}

/// Null object used when no rate limiter is configured (§4.6).
#[derive(Default)]
pub struct NullRateLimiter;

#[async_trait]
impl RateLimiter for NullRateLimiter {
    async fn acquire(&self, _n: u64) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn acquire_within_capacity_does_not_suspend() {
        let limiter = TokenBucketLimiter::new(5, 1.0);
        let start = Instant::now();
        limiter.acquire(5).await;
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[tokio::test]
    async fn acquire_beyond_capacity_waits_for_refill() {
        let limiter = TokenBucketLimiter::new(1, 100.0);
        limiter.acquire(1).await;
        let start = Instant::now();
        limiter.acquire(1).await;
        assert!(start.elapsed() >= Duration::from_millis(5));
    }

    #[tokio::test]
    async fn null_limiter_never_suspends() {
        let limiter = NullRateLimiter;
        let start = Instant::now();
        limiter.acquire(1_000_000).await;
        assert!(start.elapsed() < Duration::from_millis(10));
    }
}
