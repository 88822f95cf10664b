//! Wait strategies between timeout retries.
//!
//! A [`Backoff`] may be shared across calls through an `Arc`. The engine
//! only ever calls [`Backoff::next`]; concurrent calls sharing one stateful
//! instance interleave their progressions, so give each call its own
//! instance when that matters.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use rand::Rng;

pub trait Backoff: Send + Sync {
    /// Returns the progression to its initial wait.
    fn reset(&self);

    /// Wait before the next retry; advances the progression.
    fn next(&self) -> Duration;
}

/// Same interval every time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConstantBackoff {
    pub interval: Duration,
}

impl ConstantBackoff {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl Backoff for ConstantBackoff {
    fn reset(&self) {}

    fn next(&self) -> Duration {
        self.interval
    }
}

/// Doubles the wait on each retry, capped at `max`.
#[derive(Debug)]
pub struct ExponentialBackoff {
    base: Duration,
    max: Duration,
    step: AtomicU32,
}

impl ExponentialBackoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max: max.max(base),
            step: AtomicU32::new(0),
        }
    }

    fn advance(&self) -> Duration {
        let exp = self.step.fetch_add(1, Ordering::Relaxed).min(16);
        self.base.saturating_mul(1u32 << exp).min(self.max)
    }
}

impl Backoff for ExponentialBackoff {
    fn reset(&self) {
        self.step.store(0, Ordering::Relaxed);
    }

    fn next(&self) -> Duration {
        self.advance()
    }
}

/// Exponential progression with a random spread of `±ratio` around each step.
#[derive(Debug)]
pub struct JitteredBackoff {
    inner: ExponentialBackoff,
    ratio: f64,
}

impl JitteredBackoff {
    pub fn new(base: Duration, max: Duration, ratio: f64) -> Self {
        Self {
            inner: ExponentialBackoff::new(base, max),
            ratio: ratio.clamp(0.0, 1.0),
        }
    }
}

impl Backoff for JitteredBackoff {
    fn reset(&self) {
        self.inner.reset();
    }

    fn next(&self) -> Duration {
        let wait = self.inner.advance();
        let wait_ms = wait.as_millis().min(u64::MAX as u128) as u64;
        if self.ratio <= f64::EPSILON || wait_ms <= 1 {
            return wait;
        }

        let span = ((wait_ms as f64) * self.ratio).round().max(1.0) as u64;
        let low = wait_ms.saturating_sub(span);
        let high = wait_ms.saturating_add(span);
        let max_ms = self.inner.max.as_millis().min(u64::MAX as u128) as u64;
        let sampled = rand::rng().random_range(low..=high).min(max_ms.max(1));
        Duration::from_millis(sampled)
    }
}
