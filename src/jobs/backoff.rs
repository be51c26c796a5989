//! Retry delays for failed jobs
//!
//! `base * 2^(attempt-1)`, with ±`jitter` randomness, never above `max`.

use std::time::Duration;
use rand::Rng;
use crate::config::JobsConfig;

const DEFAULT_JITTER: f64 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub base: Duration,
    pub max: Duration,
    pub jitter: f64,
}

impl RetryPolicy {
    pub fn from_config(config: &JobsConfig) -> Self {
        Self {
            base: Duration::from_secs(config.retry_base_seconds),
            max: Duration::from_secs(config.retry_max_seconds),
            jitter: DEFAULT_JITTER,
        }
    }

    /// Delay before the next try, given the attempt that just failed (1-based)
    pub fn delay_for(&self, attempt: i32) -> Duration {
        let unit: f64 = rand::thread_rng().gen_range(-1.0..=1.0);
        self.delay_with_jitter(attempt, unit)
    }

    /// Deterministic core of [`delay_for`](Self::delay_for); `unit` is in `[-1, 1]`
    pub fn delay_with_jitter(&self, attempt: i32, unit: f64) -> Duration {
        let exponent = attempt.saturating_sub(1).clamp(0, 30) as u32;
        let exponential = self
            .base
            .checked_mul(1u32 << exponent)
            .unwrap_or(self.max)
            .min(self.max);

        let factor = 1.0 + self.jitter.clamp(0.0, 1.0) * unit.clamp(-1.0, 1.0);
        exponential.mul_f64(factor).min(self.max)
    }
}
