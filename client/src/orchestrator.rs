//! One completion sweep across the model fallback chain.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;

use primer_types::ModelCatalog;

use crate::api::{CompletionApi, UpstreamError};
use crate::governor::RateGovernor;

/// One upstream attempt, as observed by the orchestrator.
#[derive(Debug, Clone)]
pub struct AttemptLog {
    pub at: DateTime<Utc>,
    pub model: &'static str,
    pub success: bool,
    pub error: Option<String>,
}

/// Successful sweep result: the raw model text plus which model produced it.
#[derive(Debug, Clone)]
pub struct Completion {
    pub text: String,
    pub model: &'static str,
    pub attempts: Vec<AttemptLog>,
}

/// Every model in the fallback chain failed.
#[derive(Debug, Error)]
#[error("all {} models failed; last error: {last}", attempts.len())]
pub struct AllModelsFailed {
    pub attempts: Vec<AttemptLog>,
    #[source]
    pub last: UpstreamError,
}

/// Drives one logical completion request through the fallback chain.
///
/// The governor is consulted once up front (sleeping out the window when
/// throttled); each model then gets exactly one attempt, in catalog order
/// starting from the preferred model, fired back-to-back with no
/// inter-model delay. Re-driving a whole sweep is [`crate::retry_with_backoff`]'s
/// job, not this one's.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    api: CompletionApi,
    catalog: ModelCatalog,
    governor: Arc<RateGovernor>,
}

impl Orchestrator {
    #[must_use]
    pub fn new(api: CompletionApi, catalog: ModelCatalog, governor: Arc<RateGovernor>) -> Self {
        Self {
            api,
            catalog,
            governor,
        }
    }

    #[must_use]
    pub fn catalog(&self) -> &ModelCatalog {
        &self.catalog
    }

    #[must_use]
    pub fn governor(&self) -> &Arc<RateGovernor> {
        &self.governor
    }

    /// Complete `prompt`, starting with `preferred` and falling back through
    /// the rest of the catalog. Fails only when every model has failed.
    ///
    /// Non-2xx statuses and timeouts are treated identically here: any
    /// failure moves to the next model. Auth failures burn through the
    /// chain like everything else; they stay visible in the attempt log.
    pub async fn complete_with_fallback(
        &self,
        prompt: &str,
        preferred: &str,
    ) -> Result<Completion, AllModelsFailed> {
        self.governor.wait_if_throttled().await;

        let mut attempts = Vec::new();
        let mut last_error: Option<UpstreamError> = None;

        for model in self.catalog.fallback_order(preferred) {
            self.governor.record_attempt();
            match self.api.complete(model, prompt).await {
                Ok(text) => {
                    tracing::info!(model, attempt = attempts.len() + 1, "completion succeeded");
                    attempts.push(AttemptLog {
                        at: Utc::now(),
                        model,
                        success: true,
                        error: None,
                    });
                    return Ok(Completion {
                        text,
                        model,
                        attempts,
                    });
                }
                Err(err) => {
                    tracing::warn!(
                        model,
                        attempt = attempts.len() + 1,
                        timeout = err.is_timeout(),
                        retry_after_ms = err.retry_after().map(|d| d.as_millis()),
                        error = %err,
                        "completion attempt failed; falling back"
                    );
                    attempts.push(AttemptLog {
                        at: Utc::now(),
                        model,
                        success: false,
                        error: Some(err.to_string()),
                    });
                    last_error = Some(err);
                }
            }
        }

        // fallback_order is never empty for a validated catalog, so a
        // fall-through always carries a last error.
        let last = last_error.unwrap_or_else(|| UpstreamError::MalformedResponse {
            model: preferred.to_string(),
            detail: "empty model catalog".to_string(),
        });
        tracing::error!(attempts = attempts.len(), error = %last, "all models failed");
        Err(AllModelsFailed { attempts, last })
    }
}
