//! Token-bucket rate limiting for outbound probes.
//!
//! One bucket exists per provider so a slow endpoint never head-of-line
//! blocks probes against the others. Buckets refill continuously at the
//! configured steady-state rate up to their burst capacity.

use parking_lot::Mutex;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

#[derive(Debug, Error)]
pub enum RateLimitError {
    #[error("requested {requested} tokens but bucket capacity is {capacity}")]
    ExceedsCapacity { requested: u32, capacity: u32 },
}

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

/// A token bucket with steady-state rate `rate` (tokens/second) and burst
/// capacity `burst`.
///
/// [`acquire`](TokenBucket::acquire) suspends the caller until tokens are
/// available; waiters are served in FIFO order.
/// [`try_acquire`](TokenBucket::try_acquire) never blocks.
pub struct TokenBucket {
    rate: f64,
    burst: f64,
    state: Mutex<BucketState>,
    // Fair mutex: acquire() callers queue here so tokens are handed out in
    // arrival order instead of racing on every refill.
    turnstile: tokio::sync::Mutex<()>,
}

impl TokenBucket {
    /// Create a bucket. Panics if `rate` or `burst` is not positive: a
    /// misconfigured bucket is a programmer error.
    pub fn new(rate: f64, burst: u32) -> Self {
        assert!(rate > 0.0, "token bucket rate must be positive");
        assert!(burst > 0, "token bucket burst must be positive");
        Self {
            rate,
            burst: f64::from(burst),
            state: Mutex::new(BucketState {
                tokens: f64::from(burst),
                last_refill: Instant::now(),
            }),
            turnstile: tokio::sync::Mutex::new(()),
        }
    }

    fn refill(state: &mut BucketState, rate: f64, burst: f64) {
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill).as_secs_f64();
        state.tokens = (state.tokens + elapsed * rate).min(burst);
        state.last_refill = now;
    }

    /// Take `n` tokens if they are available right now.
    pub fn try_acquire(&self, n: u32) -> bool {
        let needed = f64::from(n);
        if needed > self.burst {
            return false;
        }
        let mut state = self.state.lock();
        Self::refill(&mut state, self.rate, self.burst);
        if state.tokens >= needed {
            state.tokens -= needed;
            true
        } else {
            false
        }
    }

    /// Wait until `n` tokens are available, then take them.
    ///
    /// Returns an error only for contract violations (`n` above burst
    /// capacity, which could never be satisfied).
    pub async fn acquire(&self, n: u32) -> Result<(), RateLimitError> {
        let needed = f64::from(n);
        if needed > self.burst {
            return Err(RateLimitError::ExceedsCapacity {
                requested: n,
                capacity: self.burst as u32,
            });
        }

        // tokio's Mutex is fair, so holding it for the full wait gives FIFO
        // service order across concurrent acquirers.
        let _turn = self.turnstile.lock().await;
        loop {
            let wait = {
                let mut state = self.state.lock();
                Self::refill(&mut state, self.rate, self.burst);
                if state.tokens >= needed {
                    state.tokens -= needed;
                    return Ok(());
                }
                Duration::from_secs_f64((needed - state.tokens) / self.rate)
            };
            tokio::time::sleep(wait).await;
        }
    }

    /// Current token count, refilled to now. Test and diagnostics hook.
    pub fn available(&self) -> f64 {
        let mut state = self.state.lock();
        Self::refill(&mut state, self.rate, self.burst);
        state.tokens
    }
}
