//! Fractional token bucket.

use std::time::Duration;

use tokio::time::Instant;

/// Continuous-refill token bucket.
///
/// `tokens` is kept in `[0, capacity]`.
#[derive(Debug, Clone)]
pub struct TokenBucket {
    capacity: f64,
    tokens: f64,
    refill_per_sec: f64,
    last_refill: Instant,
}

impl TokenBucket {
    /// A full bucket sized for `requests_per_minute`.
    #[must_use]
    pub fn per_minute(requests_per_minute: u32, now: Instant) -> Self {
        let capacity = f64::from(requests_per_minute.max(1));
        Self {
            capacity,
            tokens: capacity,
            refill_per_sec: capacity / 60.0,
            last_refill: now,
        }
    }

    #[must_use]
    pub const fn capacity(&self) -> f64 {
        self.capacity
    }

    #[must_use]
    pub const fn tokens(&self) -> f64 {
        self.tokens
    }

    #[must_use]
    pub const fn refill_per_sec(&self) -> f64 {
        self.refill_per_sec
    }

    /// Tokens that would be available at `now`, without consuming any.
    #[must_use]
    pub fn available(&self, now: Instant) -> f64 {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        elapsed
            .mul_add(self.refill_per_sec, self.tokens)
            .min(self.capacity)
    }

    fn refill(&mut self, now: Instant) {
        self.tokens = self.available(now);
        self.last_refill = now;
    }

    /// Refill, then take one token.
    ///
    /// Returns `None` when a token was taken, otherwise the time until one
    /// will be available (never zero).
    pub fn try_acquire(&mut self, now: Instant) -> Option<Duration> {
        self.refill(now);
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            return None;
        }
        let secs = (1.0 - self.tokens) / self.refill_per_sec;
        let millis = (secs * 1000.0).ceil().max(1.0);
        Some(Duration::from_millis(millis as u64))
    }

    /// Resize to a live requests-per-minute ceiling.
    ///
    /// Tokens are clamped to the new capacity and, when known, to the
    /// provider's reported remaining count. A zero or missing limit leaves
    /// the size untouched.
    pub fn recalibrate(&mut self, limit: Option<u32>, remaining: Option<u32>, now: Instant) {
        self.refill(now);
        if let Some(limit) = limit.filter(|l| *l > 0) {
            self.capacity = f64::from(limit);
            self.refill_per_sec = self.capacity / 60.0;
            self.tokens = self.tokens.min(self.capacity);
        }
        if let Some(remaining) = remaining {
            self.tokens = self.tokens.min(f64::from(remaining));
        }
    }
}
