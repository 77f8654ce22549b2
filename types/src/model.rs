//! Model catalog and the deterministic model selector.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumKind {
    Complexity,
    ContentType,
}

impl EnumKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            EnumKind::Complexity => "complexity",
            EnumKind::ContentType => "content type",
        }
    }
}

impl fmt::Display for EnumKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {kind} value '{raw}'; expected one of: {expected:?}")]
pub struct EnumParseError {
    kind: EnumKind,
    raw: String,
    expected: &'static [&'static str],
}

impl EnumParseError {
    #[must_use]
    pub fn new(kind: EnumKind, raw: impl Into<String>, expected: &'static [&'static str]) -> Self {
        Self {
            kind,
            raw: raw.into(),
            expected,
        }
    }

    #[must_use]
    pub const fn kind(&self) -> EnumKind {
        self.kind
    }

    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }
}

/// How much reasoning depth a model brings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    Low,
    Medium,
    High,
}

impl Capability {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Capability::Low => "low",
            Capability::Medium => "medium",
            Capability::High => "high",
        }
    }
}

/// Typical response latency class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Speed {
    Slow,
    Medium,
    Fast,
    VeryFast,
}

impl Speed {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Speed::Slow => "slow",
            Speed::Medium => "medium",
            Speed::Fast => "fast",
            Speed::VeryFast => "very-fast",
        }
    }
}

/// Task complexity as judged by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Low,
    Medium,
    High,
}

const COMPLEXITY_PARSE_VALUES: &[&str] = &["low", "medium", "high"];

impl Complexity {
    pub fn parse(s: &str) -> Result<Self, EnumParseError> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Complexity::Low),
            "medium" => Ok(Complexity::Medium),
            "high" => Ok(Complexity::High),
            _ => Err(EnumParseError::new(
                EnumKind::Complexity,
                s.trim(),
                COMPLEXITY_PARSE_VALUES,
            )),
        }
    }
}

/// Broad category of the content being generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    General,
    Technical,
    Code,
    Conversational,
}

const CONTENT_TYPE_PARSE_VALUES: &[&str] = &["general", "technical", "code", "conversational"];

impl ContentType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            ContentType::General => "general",
            ContentType::Technical => "technical",
            ContentType::Code => "code",
            ContentType::Conversational => "conversational",
        }
    }

    pub fn parse(s: &str) -> Result<Self, EnumParseError> {
        match s.trim().to_ascii_lowercase().as_str() {
            "general" => Ok(ContentType::General),
            "technical" => Ok(ContentType::Technical),
            "code" => Ok(ContentType::Code),
            "conversational" | "chat" => Ok(ContentType::Conversational),
            _ => Err(EnumParseError::new(
                EnumKind::ContentType,
                s.trim(),
                CONTENT_TYPE_PARSE_VALUES,
            )),
        }
    }
}

/// One entry in the model catalog. Immutable after construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelDescriptor {
    pub id: &'static str,
    pub context_window: u32,
    pub capability: Capability,
    pub speed: Speed,
    pub use_cases: &'static [&'static str],
}

const BUILTIN_MODELS: &[ModelDescriptor] = &[
    ModelDescriptor {
        id: "llama-3.3-70b-versatile",
        context_window: 131_072,
        capability: Capability::High,
        speed: Speed::Medium,
        use_cases: &["reasoning", "technical", "code", "long-form"],
    },
    ModelDescriptor {
        id: "llama-3.1-8b-instant",
        context_window: 131_072,
        capability: Capability::Medium,
        speed: Speed::VeryFast,
        use_cases: &["chat", "interactive", "short-form"],
    },
    ModelDescriptor {
        id: "mixtral-8x7b-32768",
        context_window: 32_768,
        capability: Capability::Medium,
        speed: Speed::Fast,
        use_cases: &["general", "summaries", "flashcards"],
    },
    ModelDescriptor {
        id: "gemma2-9b-it",
        context_window: 8_192,
        capability: Capability::Low,
        speed: Speed::Fast,
        use_cases: &["general", "nudges"],
    },
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("model catalog is empty")]
    Empty,
    #[error("unknown model id '{0}'")]
    UnknownModel(String),
    #[error("duplicate model id '{0}'")]
    DuplicateModel(String),
}

/// Immutable, ordered table of available models.
///
/// Catalog order is the fallback order: when a completion attempt fails,
/// remaining models are tried in the order they appear here. Built once at
/// startup and shared read-only for the process lifetime.
#[derive(Debug, Clone)]
pub struct ModelCatalog {
    models: Vec<ModelDescriptor>,
}

impl ModelCatalog {
    /// The built-in catalog.
    #[must_use]
    pub fn builtin() -> Self {
        Self {
            models: BUILTIN_MODELS.to_vec(),
        }
    }

    /// Build a catalog from explicit descriptors, validating it once so
    /// configuration errors surface at startup rather than mid-request.
    pub fn new(models: Vec<ModelDescriptor>) -> Result<Self, CatalogError> {
        if models.is_empty() {
            return Err(CatalogError::Empty);
        }
        for (i, model) in models.iter().enumerate() {
            if models[..i].iter().any(|m| m.id == model.id) {
                return Err(CatalogError::DuplicateModel(model.id.to_string()));
            }
        }
        Ok(Self { models })
    }

    #[must_use]
    pub fn models(&self) -> &[ModelDescriptor] {
        &self.models
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&ModelDescriptor> {
        self.models.iter().find(|m| m.id == id)
    }

    /// Checks that a configured model reference exists.
    pub fn require(&self, id: &str) -> Result<&ModelDescriptor, CatalogError> {
        self.get(id)
            .ok_or_else(|| CatalogError::UnknownModel(id.to_string()))
    }

    /// Model ids in fallback order, starting with `preferred` and followed
    /// by every other catalog entry in catalog order.
    #[must_use]
    pub fn fallback_order(&self, preferred: &str) -> Vec<&'static str> {
        let mut order = Vec::with_capacity(self.models.len());
        if let Some(first) = self.get(preferred) {
            order.push(first.id);
        }
        for model in &self.models {
            if model.id != preferred {
                order.push(model.id);
            }
        }
        order
    }

    #[must_use]
    pub fn fastest(&self) -> &ModelDescriptor {
        self.max_by(|m| m.speed)
    }

    #[must_use]
    pub fn most_capable(&self) -> &ModelDescriptor {
        self.max_by(|m| m.capability)
    }

    /// A lighter general-purpose model: the first entry below the top
    /// capability tier tagged for general use, then the fastest sub-top
    /// entry, then the fastest overall when every entry is top-tier.
    #[must_use]
    pub fn lighter_general(&self) -> &ModelDescriptor {
        let top = self.most_capable().capability;
        let below_top = || self.models.iter().filter(|m| m.capability < top);
        below_top()
            .find(|m| m.use_cases.contains(&"general"))
            .or_else(|| below_top().max_by_key(|m| m.speed))
            .unwrap_or_else(|| self.fastest())
    }

    /// Pick the best-fit model for a task. First matching rule wins:
    ///
    /// 1. interactive use with non-high complexity takes the fastest model;
    /// 2. high-complexity technical or code work takes the most capable;
    /// 3. medium-complexity non-technical work takes a lighter generalist;
    /// 4. everything else defaults to the most capable model.
    ///
    /// The rule order trades latency against quality and is relied on by
    /// callers for consistent behavior; ties break on catalog order.
    #[must_use]
    pub fn select(
        &self,
        content_type: ContentType,
        complexity: Complexity,
        interactive: bool,
    ) -> &ModelDescriptor {
        if interactive && complexity != Complexity::High {
            return self.fastest();
        }
        if complexity == Complexity::High
            && matches!(content_type, ContentType::Technical | ContentType::Code)
        {
            return self.most_capable();
        }
        if complexity == Complexity::Medium && content_type != ContentType::Technical {
            return self.lighter_general();
        }
        self.most_capable()
    }

    fn max_by<K: Ord>(&self, key: impl Fn(&ModelDescriptor) -> K) -> &ModelDescriptor {
        // Catalog is never empty: new() rejects empty and builtin() is static.
        self.models
            .iter()
            .rev()
            .max_by_key(|m| key(m))
            .unwrap_or(&self.models[0])
    }
}

impl Default for ModelCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::{Capability, Complexity, ContentType, ModelCatalog, ModelDescriptor, Speed};

    fn catalog() -> ModelCatalog {
        ModelCatalog::builtin()
    }

    #[test]
    fn builtin_catalog_is_well_formed() {
        let catalog = catalog();
        assert!(!catalog.models().is_empty());
        for model in catalog.models() {
            assert!(!model.id.is_empty());
            assert!(model.context_window > 0);
        }
    }

    #[test]
    fn interactive_low_complexity_takes_fastest() {
        let c = catalog();
        let picked = c.select(ContentType::General, Complexity::Low, true);
        assert_eq!(picked.speed, Speed::VeryFast);
        assert_eq!(picked.id, "llama-3.1-8b-instant");
    }

    #[test]
    fn interactive_high_complexity_ignores_speed_rule() {
        let c = catalog();
        let picked = c.select(ContentType::Code, Complexity::High, true);
        assert_eq!(picked.capability, Capability::High);
    }

    #[test]
    fn high_complexity_technical_takes_most_capable() {
        let c = catalog();
        let picked = c.select(ContentType::Technical, Complexity::High, false);
        assert_eq!(picked.id, "llama-3.3-70b-versatile");
    }

    #[test]
    fn medium_non_technical_takes_lighter_model() {
        let c = catalog();
        let picked = c.select(ContentType::General, Complexity::Medium, false);
        assert_eq!(picked.id, "mixtral-8x7b-32768");
        assert!(picked.capability < Capability::High);
    }

    #[test]
    fn default_rule_is_most_capable() {
        let c = catalog();
        let picked = c.select(ContentType::Technical, Complexity::Medium, false);
        assert_eq!(picked.id, "llama-3.3-70b-versatile");
        let picked = c.select(ContentType::General, Complexity::High, false);
        assert_eq!(picked.id, "llama-3.3-70b-versatile");
    }

    #[test]
    fn fallback_order_starts_with_preferred() {
        let c = catalog();
        let order = c.fallback_order("mixtral-8x7b-32768");
        assert_eq!(order[0], "mixtral-8x7b-32768");
        assert_eq!(order.len(), c.models().len());
        // The rest follow catalog order.
        assert_eq!(order[1], "llama-3.3-70b-versatile");
    }

    #[test]
    fn fallback_order_with_unknown_preferred_covers_catalog() {
        let c = catalog();
        let order = c.fallback_order("no-such-model");
        assert_eq!(order.len(), c.models().len());
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let dup = vec![
            ModelDescriptor {
                id: "m",
                context_window: 1,
                capability: Capability::Low,
                speed: Speed::Slow,
                use_cases: &[],
            },
            ModelDescriptor {
                id: "m",
                context_window: 1,
                capability: Capability::Low,
                speed: Speed::Slow,
                use_cases: &[],
            },
        ];
        assert!(ModelCatalog::new(dup).is_err());
    }

    #[test]
    fn enum_parsing_round_trips() {
        assert_eq!(Complexity::parse(" low ").unwrap(), Complexity::Low);
        assert_eq!(Complexity::parse("Medium").unwrap(), Complexity::Medium);
        assert_eq!(ContentType::parse("chat").unwrap(), ContentType::Conversational);
        assert_eq!(ContentType::parse("CODE").unwrap(), ContentType::Code);
        assert!(Complexity::parse("extreme").is_err());
    }
}
