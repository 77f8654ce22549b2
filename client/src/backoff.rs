//! Exponential backoff with additive jitter.

use std::time::Duration;

use primer_config::BackoffConfig;

/// Delay calculator for retry spacing.
///
/// `delay(attempt)` grows as `base * 2^(attempt-1)` plus a uniform jitter in
/// `[0, base)`, capped at `max`. Exponential growth keeps repeated failures
/// from hammering the upstream; the jitter desynchronizes concurrent
/// callers; the cap bounds worst-case added latency.
#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    base: Duration,
    max: Duration,
}

impl Backoff {
    #[must_use]
    pub const fn new(base: Duration, max: Duration) -> Self {
        Self { base, max }
    }

    #[must_use]
    pub fn from_config(config: &BackoffConfig) -> Self {
        Self::new(config.base(), config.max())
    }

    /// Delay before retry `attempt` (1-based; 0 is treated as 1).
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(32);
        let grown = self
            .base
            .checked_mul(1_u32.checked_shl(exp).unwrap_or(u32::MAX))
            .unwrap_or(self.max);
        let jitter = self.base.mul_f64(rand::random::<f64>());
        (grown + jitter).min(self.max)
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::from_config(&BackoffConfig::default())
    }
}
