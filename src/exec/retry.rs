// src/exec/retry.rs

//! Backoff arithmetic for [`RetryPolicy`].
//!
//! Attempts are 1-based: attempt 1 is the first execution, and the delay for
//! attempt `n` is the wait between attempt `n` failing and attempt `n + 1`
//! starting.
//!
//! - fixed: `base`
//! - linear: `base * n`
//! - exponential: `base * 2^(n-1)`, plus up to 10% random jitter when enabled
//!
//! Every delay is capped by `max_delay_ms` when set.

use std::time::Duration;

use crate::config::RetryPolicy;
use crate::types::BackoffStrategy;

/// Upper bound of the random jitter, as a share of the nominal delay.
pub const JITTER_RATIO: f64 = 0.1;

/// Exponent cap; keeps `2^(n-1)` from overflowing.
const MAX_EXPONENT: u32 = 30;

impl RetryPolicy {
    /// Whether a step that just failed attempt `attempt` gets another one.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// Delay before the next attempt, without jitter.
    pub fn nominal_delay(&self, attempt: u32) -> Duration {
        let attempt = attempt.max(1);
        let base = self.base_delay_ms;

        let ms = match self.backoff {
            BackoffStrategy::Fixed => base,
            BackoffStrategy::Linear => base.saturating_mul(u64::from(attempt)),
            BackoffStrategy::Exponential => {
                let exponent = (attempt - 1).min(MAX_EXPONENT);
                base.saturating_mul(1u64 << exponent)
            }
        };

        self.capped(Duration::from_millis(ms))
    }

    /// Delay before the next attempt, jitter included.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let nominal = self.nominal_delay(attempt);

        if self.jitter && self.backoff == BackoffStrategy::Exponential {
            let extra = nominal.mul_f64(JITTER_RATIO * rand::random::<f64>());
            return self.capped(nominal + extra);
        }

        nominal
    }

    fn capped(&self, delay: Duration) -> Duration {
        match self.max_delay_ms {
            Some(max) => delay.min(Duration::from_millis(max)),
            None => delay,
        }
    }
}
