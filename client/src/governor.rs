//! Rolling-window request throttle shared by all callers.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

/// Throttle threshold as a fraction of the limit, in tenths.
const THROTTLE_NUMERATOR: u64 = 9;
const THROTTLE_DENOMINATOR: u64 = 10;

#[derive(Debug)]
struct Window {
    started: Instant,
    count: u32,
}

/// Soft rate limiter over a rolling window.
///
/// Tracks attempts since the window start; once the count reaches 90% of
/// the limit, [`RateGovernor::throttle_delay`] asks the caller to wait out
/// the remainder of the window. Crossing a window boundary resets the count
/// and advances the window start. The only effect is added latency - a
/// request is never denied, and the check never fails.
///
/// The counter is shared mutable state across concurrent callers; updates
/// are atomic behind a mutex, but two callers may both observe a sub-limit
/// count and both proceed. That race is accepted: this is a soft limit,
/// not admission control.
#[derive(Debug)]
pub struct RateGovernor {
    limit: u32,
    window: Duration,
    state: Mutex<Window>,
}

impl RateGovernor {
    #[must_use]
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window,
            state: Mutex::new(Window {
                started: Instant::now(),
                count: 0,
            }),
        }
    }

    /// How long the caller should pause before its next attempt, or `None`
    /// to proceed immediately. Rolls the window forward when it has lapsed.
    #[must_use]
    pub fn throttle_delay(&self) -> Option<Duration> {
        let now = Instant::now();
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let elapsed = now.duration_since(state.started);
        if elapsed >= self.window {
            state.started = now;
            state.count = 0;
            return None;
        }
        if u64::from(state.count) * THROTTLE_DENOMINATOR
            >= u64::from(self.limit) * THROTTLE_NUMERATOR
        {
            return Some(self.window - elapsed);
        }
        None
    }

    /// Record one upstream attempt, rolling the window first if it lapsed.
    pub fn record_attempt(&self) {
        let now = Instant::now();
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if now.duration_since(state.started) >= self.window {
            state.started = now;
            state.count = 0;
        }
        state.count = state.count.saturating_add(1);
    }

    /// Sleep out the remaining window when throttled, then return.
    pub async fn wait_if_throttled(&self) {
        if let Some(delay) = self.throttle_delay() {
            tracing::debug!(delay_ms = delay.as_millis(), "throttled; waiting out window");
            tokio::time::sleep(delay).await;
        }
    }

    /// Current in-window attempt count.
    #[must_use]
    pub fn count(&self) -> u32 {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .count
    }
}
