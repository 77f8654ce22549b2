//! Resilient completion client.
//!
//! # Architecture
//!
//! One logical "complete this prompt" request flows through:
//!
//! - [`RateGovernor`] - rolling-window throttle shared by all callers
//! - [`CompletionApi`] - a single HTTP call to one model
//! - [`Orchestrator::complete_with_fallback`] - one sweep across the model
//!   fallback chain, one attempt per model
//! - [`retry_with_backoff`] - optional re-drive of a whole pipeline with
//!   [`Backoff`] spacing, applied per content kind by the engine
//!
//! # Error Handling
//!
//! A single model's failure is an [`UpstreamError`]; it never escapes the
//! orchestrator, which absorbs it to drive fallback. Only when every model
//! in the chain has failed does the caller see [`AllModelsFailed`], carrying
//! the last error and the full attempt log.

mod api;
mod backoff;
mod governor;
mod orchestrator;
mod retry;

pub use api::{CompletionApi, CompletionOptions, UpstreamError};
pub use backoff::Backoff;
pub use governor::RateGovernor;
pub use orchestrator::{AllModelsFailed, AttemptLog, Completion, Orchestrator};
pub use retry::retry_with_backoff;

use std::sync::OnceLock;
use std::time::Duration;

const CONNECT_TIMEOUT_SECS: u64 = 10;
const TCP_KEEPALIVE_SECS: u64 = 60;
const POOL_MAX_IDLE_PER_HOST: usize = 8;
const POOL_IDLE_TIMEOUT_SECS: u64 = 90;

/// Process-wide HTTP client with hardened defaults.
///
/// Https-only: the bearer token never travels over plaintext. Tests that
/// talk to a local plain-http mock server swap in their own client via
/// [`CompletionApi::with_client`]. Per-request timeouts are applied at the
/// request level so one client can serve callers with different budgets.
pub fn http_client() -> &'static reqwest::Client {
    static CLIENT: OnceLock<reqwest::Client> = OnceLock::new();
    CLIENT.get_or_init(|| {
        base_client_builder().build().unwrap_or_else(|e| {
            tracing::error!("Failed to build hardened HTTP client: {e}. Falling back to minimal.");
            reqwest::Client::builder()
                .redirect(reqwest::redirect::Policy::none())
                .https_only(true)
                .build()
                .expect("minimal HTTP client must build")
        })
    })
}

fn base_client_builder() -> reqwest::ClientBuilder {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .redirect(reqwest::redirect::Policy::none())
        .https_only(true)
        .tcp_keepalive(Some(Duration::from_secs(TCP_KEEPALIVE_SECS)))
        .pool_max_idle_per_host(POOL_MAX_IDLE_PER_HOST)
        .pool_idle_timeout(Some(Duration::from_secs(POOL_IDLE_TIMEOUT_SECS)))
}
