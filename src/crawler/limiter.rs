//! Token-bucket rate limiter
//!
//! One bucket is shared by all workers, so the configured rate bounds the
//! whole crawl rather than each worker. Tokens refill continuously at
//! `rate` per second up to `burst`; the bucket starts full.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::{CrawlError, Result};

/// Shared token bucket with an adjustable rate.
pub struct TokenBucket {
    state: Mutex<BucketState>,
}

struct BucketState {
    tokens: f64,
    capacity: f64,
    rate: f64,
    last_refill: Instant,
}

impl BucketState {
    fn refill(&mut self, now: Instant) {
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.rate).min(self.capacity);
        self.last_refill = now;
    }
}

impl TokenBucket {
    /// Creates a bucket refilling at `rate` tokens per second, holding at
    /// most `burst` tokens, starting full.
    pub fn new(rate: f64, burst: u32) -> Self {
        let capacity = f64::from(burst.max(1));
        Self {
            state: Mutex::new(BucketState {
                tokens: capacity,
                capacity,
                rate,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Waits for one token, surfacing cancellation as an error.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<()> {
        loop {
            let wait = {
                let mut state = self.state.lock().await;
                state.refill(Instant::now());

                if state.tokens >= 1.0 {
                    state.tokens -= 1.0;
                    return Ok(());
                }

                if state.rate <= 0.0 {
                    // An unset rate never refills; treat it as unlimited
                    // rather than stalling the crawl forever.
                    return Ok(());
                }

                Duration::from_secs_f64(((1.0 - state.tokens) / state.rate).max(0.001))
            };

            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = cancel.cancelled() => return Err(CrawlError::Cancelled),
            }
        }
    }

    /// Atomically switches to a new steady-state rate and burst size.
    ///
    /// Accumulated tokens are settled at the old rate first, then clamped
    /// to the new capacity.
    pub async fn set_rate(&self, rate: f64, burst: u32) {
        let mut state = self.state.lock().await;
        state.refill(Instant::now());
        state.rate = rate;
        state.capacity = f64::from(burst.max(1));
        state.tokens = state.tokens.min(state.capacity);
    }
}
