//! Configuration for Primer.
//!
//! Settings come from `~/.primer/config.toml` with environment-variable
//! overrides for the credentials (`PRIMER_API_KEY`, `PRIMER_BASE_URL`).
//! Everything carries a sensible default so a missing file is not an error;
//! an unreadable or malformed file is. [`Config::validate`] runs once at
//! composition time so bad model references fail fast instead of
//! mid-request.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use primer_types::{
    CatalogError, Complexity, ContentKind, ContentType, EnumParseError, ModelCatalog,
};

pub const API_KEY_ENV: &str = "PRIMER_API_KEY";
pub const BASE_URL_ENV: &str = "PRIMER_BASE_URL";

const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_RATE_LIMIT: u32 = 25;
const DEFAULT_RATE_WINDOW_SECS: u64 = 60;
const DEFAULT_BACKOFF_BASE_MS: u64 = 1_000;
const DEFAULT_BACKOFF_MAX_MS: u64 = 30_000;
const DEFAULT_MAX_RETRIES: u32 = 3;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Enum(#[from] EnumParseError),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Upstream API settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ApiConfig {
    pub key: Option<String>,
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl ApiConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Rolling-window throttle settings.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RateLimitConfig {
    pub limit: u32,
    pub window_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            limit: DEFAULT_RATE_LIMIT,
            window_secs: DEFAULT_RATE_WINDOW_SECS,
        }
    }
}

impl RateLimitConfig {
    #[must_use]
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

/// Exponential backoff settings for outer retries.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BackoffConfig {
    pub base_ms: u64,
    pub max_ms: u64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_ms: DEFAULT_BACKOFF_BASE_MS,
            max_ms: DEFAULT_BACKOFF_MAX_MS,
        }
    }
}

impl BackoffConfig {
    #[must_use]
    pub fn base(&self) -> Duration {
        Duration::from_millis(self.base_ms)
    }

    #[must_use]
    pub fn max(&self) -> Duration {
        Duration::from_millis(self.max_ms)
    }
}

/// Outer-retry budget plus the per-kind toggle.
///
/// Whole-module generation is re-driven end to end on failure; interactive
/// kinds skip the outer retry and fall back (or surface the error, for chat)
/// immediately, keeping their latency bounded.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub module: bool,
    pub flashcards: bool,
    pub quiz: bool,
    pub nudges: bool,
    pub chat: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_RETRIES,
            module: true,
            flashcards: true,
            quiz: false,
            nudges: false,
            chat: false,
        }
    }
}

impl RetryConfig {
    /// Whether this content kind gets the outer retry wrapper.
    #[must_use]
    pub fn outer_retry_enabled(&self, kind: ContentKind) -> bool {
        match kind {
            ContentKind::Module => self.module,
            ContentKind::Flashcards => self.flashcards,
            ContentKind::Quiz => self.quiz,
            ContentKind::Nudges => self.nudges,
            ContentKind::Chat => self.chat,
        }
    }

    /// Attempts for a kind: the full budget when enabled, a single drive
    /// otherwise.
    #[must_use]
    pub fn attempts_for(&self, kind: ContentKind) -> u32 {
        if self.outer_retry_enabled(kind) {
            self.max_attempts.max(1)
        } else {
            1
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ModelsConfig {
    /// Default model when the caller does not run the selector.
    pub preferred: Option<String>,
}

/// Default selector inputs for callers that do not pass their own.
///
/// Kept as raw strings so the file stays forgiving about case and
/// whitespace; [`GenerationConfig::complexity`] and
/// [`GenerationConfig::content_type`] resolve them to typed values.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GenerationConfig {
    pub complexity: Option<String>,
    pub content_type: Option<String>,
}

impl GenerationConfig {
    pub fn complexity(&self) -> Result<Complexity, EnumParseError> {
        self.complexity
            .as_deref()
            .map_or(Ok(Complexity::Medium), Complexity::parse)
    }

    pub fn content_type(&self) -> Result<ContentType, EnumParseError> {
        self.content_type
            .as_deref()
            .map_or(Ok(ContentType::General), ContentType::parse)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub api: ApiConfig,
    pub rate_limit: RateLimitConfig,
    pub backoff: BackoffConfig,
    pub retry: RetryConfig,
    pub models: ModelsConfig,
    pub generation: GenerationConfig,
}

/// Path of the user config file, if a home directory exists.
#[must_use]
pub fn config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".primer").join("config.toml"))
}

impl Config {
    /// Load from the default location, falling back to defaults when the
    /// file does not exist. Environment variables override file values.
    pub fn load() -> Result<Self, ConfigError> {
        match config_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default().with_env_overrides()),
        }
    }

    /// Load from an explicit path (missing file is fine), then apply
    /// environment overrides.
    pub fn load_from(path: &std::path::Path) -> Result<Self, ConfigError> {
        let config = if path.exists() {
            let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;
            toml::from_str(&raw).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?
        } else {
            Self::default()
        };
        Ok(config.with_env_overrides())
    }

    fn with_env_overrides(mut self) -> Self {
        if let Ok(key) = std::env::var(API_KEY_ENV)
            && !key.trim().is_empty()
        {
            self.api.key = Some(key);
        }
        if let Ok(url) = std::env::var(BASE_URL_ENV)
            && !url.trim().is_empty()
        {
            self.api.base_url = url;
        }
        self
    }

    /// Validate against the model catalog. Call once at startup.
    pub fn validate(&self, catalog: &ModelCatalog) -> Result<(), ConfigError> {
        if let Some(preferred) = &self.models.preferred {
            catalog.require(preferred)?;
        }
        self.generation.complexity()?;
        self.generation.content_type()?;
        if self.rate_limit.limit == 0 {
            return Err(ConfigError::Invalid("rate_limit.limit must be > 0".into()));
        }
        if self.rate_limit.window_secs == 0 {
            return Err(ConfigError::Invalid(
                "rate_limit.window_secs must be > 0".into(),
            ));
        }
        if self.backoff.base_ms == 0 || self.backoff.max_ms < self.backoff.base_ms {
            return Err(ConfigError::Invalid(
                "backoff.base_ms must be > 0 and <= backoff.max_ms".into(),
            ));
        }
        if self.api.timeout_secs == 0 {
            return Err(ConfigError::Invalid("api.timeout_secs must be > 0".into()));
        }
        Ok(())
    }
}
