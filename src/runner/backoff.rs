//! Retry delays.

use crate::config::BackoffConfig;
use std::time::Duration;

/// Exponential backoff between attempts of a failing step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    base: Duration,
    max: Duration,
}

impl RetryPolicy {
    /// Policy doubling from `base`, never exceeding `max`.
    pub fn new(base: Duration, max: Duration) -> Self {
        Self { base, max }
    }

    /// No delay between attempts.
    pub fn immediate() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }

    /// Delay before retry number `retry` (1-based).
    ///
    /// `base * 2^(retry - 1)`, capped at `max`.
    pub fn delay_for(&self, retry: u32) -> Duration {
        if retry == 0 {
            return Duration::ZERO;
        }
        let factor = 1u32.checked_shl(retry - 1).unwrap_or(u32::MAX);
        self.base
            .checked_mul(factor)
            .unwrap_or(self.max)
            .min(self.max)
    }
}

impl From<&BackoffConfig> for RetryPolicy {
    fn from(config: &BackoffConfig) -> Self {
        Self::new(config.base, config.max)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&BackoffConfig::default())
    }
}
