use std::time::Duration;
use tokio::time::{sleep, Instant};

/// Token-bucket admission gate. Tokens refill lazily at `qps / 1000` per
/// millisecond up to `capacity` (= qps), so a fresh bucket allows a burst
/// of `capacity` requests before settling at the steady-state rate.
///
/// Each worker owns its own bucket; nothing here is shared.
#[derive(Debug)]
pub struct TokenBucket {
    capacity: f64,
    tokens: f64,
    refill_per_ms: f64,
    last_refill: Instant,
}

impl TokenBucket {
    pub fn new(qps: f64) -> Self {
        Self {
            capacity: qps,
            tokens: qps,
            refill_per_ms: qps / 1000.0,
            last_refill: Instant::now(),
        }
    }

    fn refill(&mut self, now: Instant) {
        let elapsed_ms = now.duration_since(self.last_refill).as_secs_f64() * 1000.0;
        if elapsed_ms > 0.0 {
            self.tokens = (self.tokens + elapsed_ms * self.refill_per_ms).min(self.capacity);
            self.last_refill = now;
        }
    }

    /// Consumes one token, sleeping until one has accrued. Returns the wait
    /// actually observed (zero when a token was ready).
    pub async fn acquire(&mut self) -> Duration {
        self.refill(Instant::now());
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            return Duration::ZERO;
        }

        let deficit = 1.0 - self.tokens;
        let wait = Duration::from_secs_f64(deficit / self.refill_per_ms / 1000.0);
        let started = Instant::now();
        sleep(wait).await;
        self.refill(Instant::now());
        // Float slop can leave the balance a hair under one token.
        self.tokens = (self.tokens - 1.0).max(0.0);
        started.elapsed()
    }
}
