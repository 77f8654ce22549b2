//! Outer retry: re-drive a whole pipeline with backoff spacing.

use std::fmt::Display;

use crate::backoff::Backoff;

/// Run `op` up to `max_attempts` times, sleeping between attempts.
///
/// This wraps an entire fallback-sweep-plus-recovery pipeline, not a single
/// HTTP call: any error re-drives the whole closure from scratch. The sleep
/// before each re-drive is `backoff.delay(remaining)`, so the first retry
/// waits longest and the budget tapers off. Returns the last error once
/// exhausted.
pub async fn retry_with_backoff<T, E, F, Fut>(
    mut op: F,
    max_attempts: u32,
    backoff: Backoff,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < max_attempts => {
                let remaining = max_attempts - attempt;
                let delay = backoff.delay(remaining);
                tracing::debug!(
                    attempt,
                    remaining,
                    delay_ms = delay.as_millis(),
                    error = %err,
                    "pipeline attempt failed; re-driving"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
