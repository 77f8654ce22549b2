//! Caller-facing content generation.
//!
//! Each generator runs the same state machine: throttle, sweep the model
//! fallback chain, recover the response text into JSON, validate the shape.
//! An invalid result either re-drives the whole pipeline (kinds with the
//! outer retry enabled) or falls through; once the budget is spent, kinds
//! with a fallback generator return deterministic template content instead
//! of an error. Only [`Generator::chat`] can surface an error to the
//! caller.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use thiserror::Error;

use primer_client::{
    AllModelsFailed, Backoff, Completion, CompletionApi, Orchestrator, RateGovernor,
    retry_with_backoff,
};
use primer_config::{Config, ConfigError, RetryConfig};
use primer_types::{
    Complexity, ContentKind, ContentType, FlashcardSet, ModelCatalog, ModuleContent, NudgeSet,
    QuizSet,
};

use crate::recovery::{JsonShape, Recovery, recover};
use crate::validate;

/// Where a generated object came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// Produced by a model and validated.
    Model,
    /// Synthesized offline after the retry budget was exhausted.
    Fallback,
}

/// A validated object plus its provenance.
#[derive(Debug, Clone)]
pub struct Generated<T> {
    pub content: T,
    pub source: Source,
    /// The model that produced the content; `None` for fallback content.
    pub model: Option<&'static str>,
}

impl<T> Generated<T> {
    fn from_model(content: T, model: &'static str) -> Self {
        Self {
            content,
            source: Source::Model,
            model: Some(model),
        }
    }

    fn from_fallback(content: T) -> Self {
        Self {
            content,
            source: Source::Fallback,
            model: None,
        }
    }

    #[must_use]
    pub fn is_fallback(&self) -> bool {
        self.source == Source::Fallback
    }
}

/// Failure of one full generation drive.
#[derive(Debug, Error)]
pub enum GenerateError {
    #[error(transparent)]
    Upstream(#[from] AllModelsFailed),
    #[error("{} response could not be recovered into JSON", kind.as_str())]
    Unrecoverable { kind: ContentKind },
    #[error("{} response failed validation: {reason}", kind.as_str())]
    Validation { kind: ContentKind, reason: String },
}

/// Content generation front door.
///
/// Owns the orchestrator and the per-kind retry policy. Cheap to share by
/// reference; one instance serves the whole process.
#[derive(Debug)]
pub struct Generator {
    orchestrator: Orchestrator,
    retry: RetryConfig,
    backoff: Backoff,
}

impl Generator {
    #[must_use]
    pub fn new(orchestrator: Orchestrator, config: &Config) -> Self {
        Self {
            orchestrator,
            retry: config.retry.clone(),
            backoff: Backoff::from_config(&config.backoff),
        }
    }

    /// Build the whole stack from configuration against the built-in
    /// catalog. Validates once so bad settings fail here, not mid-request.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let catalog = ModelCatalog::builtin();
        config.validate(&catalog)?;
        let key = config
            .api
            .key
            .clone()
            .ok_or_else(|| ConfigError::Invalid("api.key is not configured".to_string()))?;
        let api = CompletionApi::new(config.api.base_url.clone(), key, config.api.timeout());
        let governor = Arc::new(RateGovernor::new(
            config.rate_limit.limit,
            config.rate_limit.window(),
        ));
        Ok(Self::new(Orchestrator::new(api, catalog, governor), config))
    }

    #[must_use]
    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    /// Generate a learning module. Never fails: persistent upstream or
    /// validation failure yields template content.
    pub async fn generate_module(
        &self,
        topic: &str,
        content_type: ContentType,
        complexity: Complexity,
    ) -> Generated<ModuleContent> {
        let model = self.select_model(content_type, complexity, false);
        let prompt = module_prompt(topic, content_type, complexity);
        let result = self
            .drive_validated(ContentKind::Module, &prompt, model, JsonShape::Object, |m| {
                if validate::validate_module(m) {
                    Ok(())
                } else {
                    Err("missing title, sections, or substantial section content".to_string())
                }
            })
            .await;
        self.or_fallback(ContentKind::Module, result, || {
            validate::fallback_module(topic)
        })
    }

    /// Generate a flashcard deck of exactly `count` cards. Short model
    /// output is padded with placeholders, long output truncated. Never
    /// fails.
    pub async fn generate_flashcards(
        &self,
        topic: &str,
        count: usize,
        complexity: Complexity,
    ) -> Generated<FlashcardSet> {
        let count = count.max(1);
        let model = self.select_model(ContentType::General, complexity, false);
        let prompt = flashcards_prompt(topic, count);
        let kind = ContentKind::Flashcards;
        let result = self
            .drive_mapped(kind, &prompt, model, JsonShape::Array, |set: FlashcardSet| {
                if set.is_empty() {
                    return Err("empty card array".to_string());
                }
                let normalized = validate::normalize_flashcards(set, count, topic);
                if validate::validate_flashcards(&normalized) {
                    Ok(normalized)
                } else {
                    Err("cards with blank faces".to_string())
                }
            })
            .await;
        self.or_fallback(kind, result, || validate::fallback_flashcards(topic, count))
    }

    /// Generate a quiz. Interactive latency profile: by default there is no
    /// outer retry, a failed drive goes straight to fallback. Never fails.
    pub async fn generate_quiz(
        &self,
        topic: &str,
        count: usize,
        complexity: Complexity,
    ) -> Generated<QuizSet> {
        let count = count.max(1);
        let model = self.select_model(ContentType::General, complexity, true);
        let prompt = quiz_prompt(topic, count);
        let result = self
            .drive_validated(ContentKind::Quiz, &prompt, model, JsonShape::Object, |q| {
                if validate::validate_quiz(q) {
                    Ok(())
                } else {
                    Err("questions missing answers, correct set, or explanation".to_string())
                }
            })
            .await;
        self.or_fallback(ContentKind::Quiz, result, || {
            validate::fallback_quiz(topic, count)
        })
    }

    /// Generate study nudges for a goal. Never fails.
    pub async fn generate_nudges(&self, goal: &str) -> Generated<NudgeSet> {
        let model = self.select_model(ContentType::General, Complexity::Low, false);
        let prompt = nudges_prompt(goal);
        let result = self
            .drive_validated(ContentKind::Nudges, &prompt, model, JsonShape::Array, |n| {
                if validate::validate_nudges(n) {
                    Ok(())
                } else {
                    Err("empty or blank nudges".to_string())
                }
            })
            .await;
        self.or_fallback(ContentKind::Nudges, result, || {
            validate::fallback_nudges(goal)
        })
    }

    /// Free-form chat. No recovery pipeline and no fallback generator:
    /// upstream exhaustion surfaces to the caller.
    pub async fn chat(&self, context: &str, message: &str) -> Result<String, GenerateError> {
        let model = self.select_model(ContentType::Conversational, Complexity::Low, true);
        let prompt = chat_prompt(context, message);
        let completion = self.orchestrator.complete_with_fallback(&prompt, model).await?;
        Ok(completion.text)
    }

    fn select_model(
        &self,
        content_type: ContentType,
        complexity: Complexity,
        interactive: bool,
    ) -> &'static str {
        let picked = self
            .orchestrator
            .catalog()
            .select(content_type, complexity, interactive);
        tracing::debug!(
            model = picked.id,
            capability = picked.capability.as_str(),
            speed = picked.speed.as_str(),
            interactive,
            "selected model"
        );
        picked.id
    }

    /// Drive one kind through sweep, recovery, deserialization and a
    /// boolean validator, with the kind's outer-retry budget.
    async fn drive_validated<T: DeserializeOwned>(
        &self,
        kind: ContentKind,
        prompt: &str,
        model: &'static str,
        shape: JsonShape,
        check: impl Fn(&T) -> Result<(), String>,
    ) -> Result<Generated<T>, GenerateError> {
        self.drive_mapped(kind, prompt, model, shape, |value: T| {
            check(&value).map(|()| value)
        })
        .await
    }

    /// Like [`Self::drive_validated`] but the validator may transform the
    /// value (flashcard padding and truncation).
    async fn drive_mapped<T: DeserializeOwned, U>(
        &self,
        kind: ContentKind,
        prompt: &str,
        model: &'static str,
        shape: JsonShape,
        normalize: impl Fn(T) -> Result<U, String>,
    ) -> Result<Generated<U>, GenerateError> {
        let attempts = self.retry.attempts_for(kind);
        let normalize = &normalize;
        retry_with_backoff(
            || async move {
                let completion = self.orchestrator.complete_with_fallback(prompt, model).await?;
                self.parse_completion(kind, shape, &completion, normalize)
            },
            attempts,
            self.backoff,
        )
        .await
    }

    fn parse_completion<T: DeserializeOwned, U>(
        &self,
        kind: ContentKind,
        shape: JsonShape,
        completion: &Completion,
        normalize: impl Fn(T) -> Result<U, String>,
    ) -> Result<Generated<U>, GenerateError> {
        let value = match recover(&completion.text, shape) {
            Recovery::Parsed(value) => value,
            Recovery::PartialText(text) => {
                tracing::warn!(
                    kind = kind.as_str(),
                    model = completion.model,
                    text_len = text.len(),
                    "response text not recoverable into JSON"
                );
                return Err(GenerateError::Unrecoverable { kind });
            }
        };
        let parsed: T =
            serde_json::from_value(value).map_err(|e| GenerateError::Validation {
                kind,
                reason: format!("shape mismatch: {e}"),
            })?;
        let normalized = normalize(parsed).map_err(|reason| {
            tracing::warn!(
                kind = kind.as_str(),
                model = completion.model,
                reason = %reason,
                "validation rejected model output"
            );
            GenerateError::Validation { kind, reason }
        })?;
        Ok(Generated::from_model(normalized, completion.model))
    }

    /// Collapse a drive result into content, substituting the deterministic
    /// fallback on any error. Kinds with a fallback generator never
    /// propagate an error to the caller.
    fn or_fallback<T>(
        &self,
        kind: ContentKind,
        result: Result<Generated<T>, GenerateError>,
        fallback: impl FnOnce() -> T,
    ) -> Generated<T> {
        match result {
            Ok(generated) => generated,
            Err(err) => {
                tracing::warn!(
                    kind = kind.as_str(),
                    error = %err,
                    "generation exhausted retries; serving fallback content"
                );
                Generated::from_fallback(fallback())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Prompts
// ---------------------------------------------------------------------------

fn module_prompt(topic: &str, content_type: ContentType, complexity: Complexity) -> String {
    format!(
        "Create a learning module about \"{topic}\" ({} content, {:?} difficulty). \
         Respond with only a JSON object: {{\"title\": string, \"sections\": \
         [{{\"title\": string, \"content\": string}}]}}. Each section content \
         must be at least two full sentences. No markdown, no commentary.",
        content_type.as_str(),
        complexity
    )
}

fn flashcards_prompt(topic: &str, count: usize) -> String {
    format!(
        "Create exactly {count} flashcards about \"{topic}\". Respond with only \
         a JSON array: [{{\"id\": number, \"frontHTML\": string, \"backHTML\": \
         string}}]. No markdown, no commentary."
    )
}

fn quiz_prompt(topic: &str, count: usize) -> String {
    format!(
        "Create a quiz with {count} questions about \"{topic}\". Respond with \
         only a JSON object: {{\"questions\": [{{\"question\": string, \
         \"answers\": [4 strings], \"correctAnswers\": [indices], \
         \"explanation\": string, \"questionType\": \"multiple-choice\"}}]}}. \
         No markdown, no commentary."
    )
}

fn nudges_prompt(goal: &str) -> String {
    format!(
        "Write 3 short motivational study nudges for someone learning \
         \"{goal}\". Respond with only a JSON array: [{{\"message\": string, \
         \"category\": string}}]. No markdown, no commentary."
    )
}

fn chat_prompt(context: &str, message: &str) -> String {
    if context.trim().is_empty() {
        message.to_string()
    } else {
        format!("{context}\n\n{message}")
    }
}
