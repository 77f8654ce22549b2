//! HTTP client for the upstream chat-completions API.

use std::time::Duration;

use reqwest::header::HeaderMap;
use serde::Deserialize;
use serde_json::{Value, json};
use thiserror::Error;

const COMPLETIONS_PATH: &str = "/chat/completions";

/// Error bodies can be arbitrarily large; keep only this much for logs.
const MAX_ERROR_BODY_BYTES: usize = 8 * 1024;

/// Failure of a single model's completion attempt.
///
/// All variants are fallback-worthy: the orchestrator treats an HTTP status,
/// a transport failure, and a timeout identically and moves to the next
/// model in the chain.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("model {model}: HTTP {status}: {message}")]
    Http {
        model: String,
        status: u16,
        message: String,
        /// Server-suggested pause from the `Retry-After` header, if any.
        retry_after: Option<Duration>,
    },
    #[error("model {model}: request failed: {source}")]
    Transport {
        model: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("model {model}: malformed response: {detail}")]
    MalformedResponse { model: String, detail: String },
}

impl UpstreamError {
    #[must_use]
    pub fn model(&self) -> &str {
        match self {
            UpstreamError::Http { model, .. }
            | UpstreamError::Transport { model, .. }
            | UpstreamError::MalformedResponse { model, .. } => model,
        }
    }

    /// True when the failure was a client-side timeout.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, UpstreamError::Transport { source, .. } if source.is_timeout())
    }

    /// The server-suggested pause, when the response carried one.
    #[must_use]
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            UpstreamError::Http { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

/// Sampling parameters sent with every completion request.
#[derive(Debug, Clone, Copy)]
pub struct CompletionOptions {
    pub temperature: f64,
    pub max_tokens: u32,
    pub top_p: f64,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 2048,
            top_p: 0.9,
        }
    }
}

#[derive(Deserialize)]
struct ChatCompletion {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: String,
}

/// One-shot client for the upstream completion endpoint: a POST per call,
/// bearer auth, fixed timeout, no streaming.
#[derive(Debug, Clone)]
pub struct CompletionApi {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    timeout: Duration,
    options: CompletionOptions,
}

impl CompletionApi {
    #[must_use]
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: crate::http_client().clone(),
            base_url: trim_trailing_slash(base_url.into()),
            api_key: api_key.into(),
            timeout,
            options: CompletionOptions::default(),
        }
    }

    /// Replace the shared HTTP client, e.g. to point tests at a local
    /// mock server.
    #[must_use]
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    #[must_use]
    pub fn with_options(mut self, options: CompletionOptions) -> Self {
        self.options = options;
        self
    }

    /// Issue one completion request against one model.
    ///
    /// A timeout counts as a transport failure; once issued, the upstream
    /// call runs to completion or timeout and is not cancelled.
    pub async fn complete(&self, model: &str, prompt: &str) -> Result<String, UpstreamError> {
        let body = json!({
            "model": model,
            "messages": [{ "role": "user", "content": prompt }],
            "temperature": self.options.temperature,
            "max_tokens": self.options.max_tokens,
            "top_p": self.options.top_p,
        });

        let response = self
            .client
            .post(format!("{}{COMPLETIONS_PATH}", self.base_url))
            .bearer_auth(&self.api_key)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|source| UpstreamError::Transport {
                model: model.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = parse_retry_after(response.headers());
            let raw = response.text().await.unwrap_or_default();
            return Err(UpstreamError::Http {
                model: model.to_string(),
                status: status.as_u16(),
                message: extract_error_message(&raw),
                retry_after,
            });
        }

        let completion: ChatCompletion =
            response
                .json()
                .await
                .map_err(|source| UpstreamError::Transport {
                    model: model.to_string(),
                    source,
                })?;

        completion
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| UpstreamError::MalformedResponse {
                model: model.to_string(),
                detail: "response contained no choices".to_string(),
            })
    }
}

/// Maximum `Retry-After` value we honor; anything longer is ignored.
const MAX_RETRY_AFTER: Duration = Duration::from_secs(60);

/// Parse a `Retry-After` header (whole seconds).
///
/// Returns `Some(duration)` only for values in `(0, 60s)`; missing,
/// unparsable, or out-of-range headers yield `None`.
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    if let Some(val) = headers.get("retry-after")
        && let Ok(s) = val.to_str()
        && let Ok(secs) = s.parse::<u64>()
    {
        let duration = Duration::from_secs(secs);
        if duration > Duration::ZERO && duration < MAX_RETRY_AFTER {
            return Some(duration);
        }
    }
    None
}

fn trim_trailing_slash(mut url: String) -> String {
    while url.ends_with('/') {
        url.pop();
    }
    url
}

/// Pull the human-readable message out of an upstream error body.
///
/// Bodies are usually `{"error":{"message":...}}` envelopes but degrade to
/// bare strings or non-JSON prose; fall back to the (truncated) raw text.
fn extract_error_message(raw: &str) -> String {
    let truncated = truncate_bytes(raw.trim(), MAX_ERROR_BODY_BYTES);
    let Ok(payload) = serde_json::from_str::<Value>(truncated) else {
        return truncated.to_string();
    };
    payload
        .pointer("/error/message")
        .and_then(Value::as_str)
        .or_else(|| payload.pointer("/message").and_then(Value::as_str))
        .or_else(|| payload.as_str())
        .map_or_else(|| truncated.to_string(), ToString::to_string)
}

fn truncate_bytes(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use reqwest::header::{HeaderMap, HeaderValue};

    use super::{extract_error_message, parse_retry_after, trim_trailing_slash, truncate_bytes};

    #[test]
    fn extracts_nested_error_message() {
        let raw = r#"{"error":{"message":"Rate limit reached","type":"requests"}}"#;
        assert_eq!(extract_error_message(raw), "Rate limit reached");
    }

    #[test]
    fn extracts_top_level_message() {
        assert_eq!(
            extract_error_message(r#"{"message":"server busy"}"#),
            "server busy"
        );
    }

    #[test]
    fn non_json_body_passes_through() {
        assert_eq!(
            extract_error_message("502 Bad Gateway\n"),
            "502 Bad Gateway"
        );
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let s = "héllo";
        let cut = truncate_bytes(s, 2);
        assert!(s.starts_with(cut));
        assert!(cut.len() <= 2);
    }

    #[test]
    fn retry_after_seconds_in_range() {
        let mut headers = HeaderMap::new();
        headers.insert("retry-after", HeaderValue::from_static("5"));
        assert_eq!(parse_retry_after(&headers), Some(Duration::from_secs(5)));
    }

    #[test]
    fn retry_after_out_of_range_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert("retry-after", HeaderValue::from_static("120"));
        assert_eq!(parse_retry_after(&headers), None);

        headers.clear();
        headers.insert("retry-after", HeaderValue::from_static("0"));
        assert_eq!(parse_retry_after(&headers), None);

        headers.clear();
        assert_eq!(parse_retry_after(&headers), None);
    }

    #[test]
    fn base_url_loses_trailing_slashes() {
        assert_eq!(
            trim_trailing_slash("http://x/v1//".to_string()),
            "http://x/v1"
        );
    }
}
