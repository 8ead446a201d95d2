//! Per-provider token bucket for outbound requests
//!
//! Buckets are non-blocking: when empty, the caller gets `false` and the
//! request fails instead of waiting.

use parking_lot::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug)]
struct TokenBucket {
    capacity: f64,
    tokens: f64,
    /// Tokens added per second
    refill_rate: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn per_minute(limit: u32) -> Self {
        Self {
            capacity: limit as f64,
            tokens: limit as f64,
            refill_rate: limit as f64 / 60.0,
            last_refill: Instant::now(),
        }
    }

    fn refill(&mut self, now: Instant) {
        let elapsed = now.duration_since(self.last_refill);
        self.tokens = (self.tokens + elapsed.as_secs_f64() * self.refill_rate).min(self.capacity);
        self.last_refill = now;
    }

    fn try_acquire(&mut self, now: Instant) -> bool {
        self.refill(now);
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    fn time_until_available(&self) -> Duration {
        if self.tokens >= 1.0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64((1.0 - self.tokens) / self.refill_rate)
        }
    }
}

#[derive(Debug)]
pub struct RateLimiter {
    bucket: Mutex<TokenBucket>,
}

impl RateLimiter {
    pub fn per_minute(limit: u32) -> Self {
        Self {
            bucket: Mutex::new(TokenBucket::per_minute(limit)),
        }
    }

    pub fn try_acquire(&self) -> bool {
        self.bucket.lock().try_acquire(Instant::now())
    }

    pub fn retry_after(&self) -> Duration {
        self.bucket.lock().time_until_available()
    }
}
