use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{DelverError, Result};
use crate::types::ModelTier;

/// Top-level Delver configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub models: ModelsConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub graph: GraphConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

/// The two model tiers plus optional fallbacks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    pub fast: ModelConfig,
    pub quality: ModelConfig,
    #[serde(default)]
    pub fallbacks: Vec<FallbackModelConfig>,
}

impl ModelsConfig {
    pub fn for_tier(&self, tier: ModelTier) -> &ModelConfig {
        match tier {
            ModelTier::Fast => &self.fast,
            ModelTier::Quality => &self.quality,
        }
    }

    /// Fallback models registered for a tier, in declaration order.
    pub fn fallbacks_for(&self, tier: ModelTier) -> impl Iterator<Item = &ModelConfig> {
        self.fallbacks
            .iter()
            .filter(move |f| f.tier == tier)
            .map(|f| &f.model)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    pub model_id: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_model_timeout")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub retry: Option<RetryConfig>,
    /// Extra HTTP headers sent with every request (merged over preset headers).
    #[serde(default)]
    pub extra_headers: HashMap<String, String>,
}

impl ModelConfig {
    pub fn new(provider: impl Into<String>, model_id: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model_id: model_id.into(),
            api_key: None,
            base_url: None,
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            timeout_secs: default_model_timeout(),
            retry: None,
            extra_headers: HashMap::new(),
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }
}

fn default_provider() -> String { "openai".to_string() }
fn default_max_tokens() -> u32 { 4096 }
fn default_temperature() -> f32 { 0.0 }
fn default_model_timeout() -> u64 { 120 }

/// A fallback model tried after the tier's primary model is exhausted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackModelConfig {
    pub tier: ModelTier,
    #[serde(flatten)]
    pub model: ModelConfig,
}

/// Retry configuration for LLM requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
        }
    }
}

fn default_max_retries() -> u32 { 3 }
fn default_initial_backoff() -> u64 { 1000 }
fn default_max_backoff() -> u64 { 30000 }

/// Web search provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_search_provider")]
    pub provider: String,
    #[serde(default)]
    pub api_key: Option<String>,
    /// Results requested per query.
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    #[serde(default = "default_search_timeout")]
    pub timeout_secs: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            provider: default_search_provider(),
            api_key: None,
            max_results: default_max_results(),
            timeout_secs: default_search_timeout(),
        }
    }
}

fn default_search_provider() -> String { "serper".to_string() }
fn default_max_results() -> usize { 8 }
fn default_search_timeout() -> u64 { 15 }

/// Document fetcher configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    #[serde(default = "default_fetch_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Per-document character cap applied before synthesis.
    #[serde(default = "default_max_chars")]
    pub max_chars_per_document: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_fetch_timeout(),
            user_agent: default_user_agent(),
            max_chars_per_document: default_max_chars(),
        }
    }
}

fn default_fetch_timeout() -> u64 { 10 }
fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string()
}
fn default_max_chars() -> usize { 20_000 }

/// Graph executor limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphConfig {
    /// Node runs allowed per query before execution aborts.
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
        }
    }
}

fn default_max_steps() -> usize { 32 }

/// Conversation persistence configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_database")]
    pub database: String,
    /// Maximum prior messages loaded into a turn.
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
    /// Seed each turn's chat summary with the summary stored by the previous turn.
    #[serde(default)]
    pub carry_summary: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            database: default_database(),
            history_limit: default_history_limit(),
            carry_summary: false,
        }
    }
}

fn default_database() -> String { "~/.delver/sessions.db".to_string() }
fn default_history_limit() -> usize { 200 }

const GROQ_FAST_MODEL: &str = "llama-3.3-70b-versatile";
const GEMINI_QUALITY_MODEL: &str = "gemini-2.0-flash";

impl AppConfig {
    /// Load config from a TOML file, with env var expansion.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|_| DelverError::ConfigNotFound(path.display().to_string()))?;

        let config = Self::parse(&content)?;
        debug!(
            path = %path.display(),
            fast = %config.models.fast.model_id,
            quality = %config.models.quality.model_id,
            "Config loaded"
        );
        Ok(config)
    }

    /// Parse TOML text, expanding `${ENV_VAR}` references first.
    pub fn parse(content: &str) -> Result<Self> {
        let expanded = expand_env_vars(content);
        toml::from_str(&expanded).map_err(|e| DelverError::Config(e.to_string()))
    }

    /// Build a config from provider API keys in the environment.
    ///
    /// Groq backs the fast tier and Gemini the quality tier; when only one
    /// key is present both tiers use that provider.
    pub fn from_env() -> Result<Self> {
        let groq = env_non_empty("GROQ_API_KEY")
            .map(|k| ModelConfig::new("groq", GROQ_FAST_MODEL).with_api_key(k));
        let gemini = env_non_empty("GEMINI_API_KEY")
            .or_else(|| env_non_empty("GOOGLE_API_KEY"))
            .map(|k| ModelConfig::new("gemini", GEMINI_QUALITY_MODEL).with_api_key(k));

        let (fast, quality) = match (groq, gemini) {
            (Some(fast), Some(quality)) => (fast, quality),
            (Some(only), None) | (None, Some(only)) => (only.clone(), only),
            (None, None) => {
                return Err(DelverError::Config(
                    "no config file found and neither GROQ_API_KEY nor GEMINI_API_KEY is set"
                        .into(),
                ))
            }
        };

        let search = SearchConfig {
            api_key: env_non_empty("SERPER_API_KEY").or_else(|| env_non_empty("SERPAPI_API_KEY")),
            ..SearchConfig::default()
        };

        Ok(Self {
            models: ModelsConfig {
                fast,
                quality,
                fallbacks: vec![],
            },
            search,
            fetch: FetchConfig::default(),
            graph: GraphConfig::default(),
            session: SessionConfig::default(),
        })
    }

    /// Resolve the session database path (expand ~).
    pub fn database_path(&self) -> PathBuf {
        expand_home(&self.session.database)
    }

    /// A copy safe to print: every API key replaced by a marker.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        let redact = |key: &mut Option<String>| {
            if key.is_some() {
                *key = Some("<redacted>".to_string());
            }
        };
        redact(&mut copy.models.fast.api_key);
        redact(&mut copy.models.quality.api_key);
        for fb in &mut copy.models.fallbacks {
            redact(&mut fb.model.api_key);
        }
        redact(&mut copy.search.api_key);
        copy
    }
}

fn env_non_empty(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = std::env::var("HOME").ok().map(PathBuf::from) {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

/// Expand `${ENV_VAR}` patterns in a string.
fn expand_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '$' && chars.peek() == Some(&'{') {
            chars.next();
            let mut var_name = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                var_name.push(c);
            }
            match std::env::var(&var_name) {
                Ok(val) => result.push_str(&val),
                // Keep original if env var not set
                Err(_) => result.push_str(&format!("${{{}}}", var_name)),
            }
        } else {
            result.push(c);
        }
    }
    result
}
