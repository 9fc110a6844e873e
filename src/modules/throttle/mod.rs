// Copyright © 2025 mailbroker.com
// Licensed under MailBroker License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use dashmap::DashMap;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::debug;

use crate::modules::metrics::MAILBROKER_THROTTLE_WAIT_SECONDS;


/// Per-account token bucket smoothing the outbound Gmail request rate,
/// independent of reactive retry.
///
/// Refill is computed lazily on every touch; there is no background timer.
/// A bucket "catches up" exactly once when read or consumed, which keeps
/// the component testable under a paused clock. Absence of tokens is
/// signaled by the return value, never by an error.
pub struct AccountRateLimiter {
    buckets: DashMap<String, BucketState>,
    rate_per_second: f64,
    capacity: f64,
}

#[derive(Debug, Clone, Copy)]
struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

impl BucketState {
    fn full(capacity: f64) -> Self {
        BucketState {
            tokens: capacity,
            last_refill: Instant::now(),
        }
    }

    /// Add `elapsed × rate` tokens, clamped to capacity. Called before
    /// every read or consume.
    fn refill(&mut self, rate_per_second: f64, capacity: f64) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * rate_per_second).min(capacity);
        self.last_refill = now;
    }
}

impl AccountRateLimiter {
    pub fn new(rate_per_second: f64, capacity: f64) -> Self {
        AccountRateLimiter {
            buckets: DashMap::new(),
            rate_per_second,
            capacity,
        }
    }

    /// Consume `cost` tokens from the account's bucket if available.
    /// Returns false without mutating the token count (beyond the refill)
    /// when the bucket cannot cover the cost.
    pub fn try_consume(&self, key: &str, cost: f64) -> bool {
        let mut bucket = self.bucket(key);
        bucket.refill(self.rate_per_second, self.capacity);
        if bucket.tokens >= cost {
            bucket.tokens -= cost;
            true
        } else {
            false
        }
    }

    /// Time until `cost` tokens become available, rounded up to the next
    /// millisecond so callers never wake early. Zero when the bucket can
    /// already cover the cost.
    pub fn time_until_available(&self, key: &str, cost: f64) -> Duration {
        let mut bucket = self.bucket(key);
        bucket.refill(self.rate_per_second, self.capacity);
        if bucket.tokens >= cost {
            return Duration::ZERO;
        }
        let deficit = cost - bucket.tokens;
        Duration::from_millis(((deficit / self.rate_per_second) * 1000.0).ceil() as u64)
    }

    /// Suspend until `cost` tokens are available, then consume them.
    /// Guaranteed to succeed once the wait elapses: the final subtraction
    /// clamps at zero to absorb floating point slack.
    pub async fn wait_and_consume(&self, key: &str, cost: f64) {
        let wait = self.time_until_available(key, cost);
        MAILBROKER_THROTTLE_WAIT_SECONDS.observe(wait.as_secs_f64());
        if !wait.is_zero() {
            debug!(
                key,
                wait_ms = wait.as_millis() as u64,
                "token bucket exhausted, waiting for refill"
            );
            sleep(wait).await;
        }
        let mut bucket = self.bucket(key);
        bucket.refill(self.rate_per_second, self.capacity);
        bucket.tokens = (bucket.tokens - cost).max(0.0);
    }

    /// Current token level after refill. Read-only apart from the refill.
    pub fn current_level(&self, key: &str) -> f64 {
        let mut bucket = self.bucket(key);
        bucket.refill(self.rate_per_second, self.capacity);
        bucket.tokens
    }

    /// Drop the bucket for one account; the next touch starts full.
    pub fn reset(&self, key: &str) {
        self.buckets.remove(key);
    }

    /// Drop every bucket.
    pub fn reset_all(&self) {
        self.buckets.clear();
    }

    fn bucket(&self, key: &str) -> dashmap::mapref::one::RefMut<'_, String, BucketState> {
        self.buckets
            .entry(key.to_string())
            .or_insert_with(|| BucketState::full(self.capacity))
    }
}
