//! Configuration loading, validation, and management for Zhifa.
//!
//! Loads configuration from `~/.zhifa/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.zhifa/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key (can be overridden per-provider)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Default LLM provider
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Default model
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Default temperature for answer generation
    #[serde(default = "default_temperature")]
    pub default_temperature: f32,

    /// Default max tokens per LLM response
    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: u32,

    /// Consultation pipeline settings
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Vector store and retrieval settings
    #[serde(default)]
    pub knowledge: KnowledgeConfig,

    /// Internet search tool settings
    #[serde(default)]
    pub web_search: WebSearchConfig,

    /// Provider-specific configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
}

fn default_provider() -> String {
    "vllm".into()
}
fn default_model() -> String {
    "gpt-3.5-turbo".into()
}
fn default_temperature() -> f32 {
    0.1
}
fn default_max_tokens() -> u32 {
    2048
}
fn default_true() -> bool {
    true
}

fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("default_provider", &self.default_provider)
            .field("default_model", &self.default_model)
            .field("default_temperature", &self.default_temperature)
            .field("default_max_tokens", &self.default_max_tokens)
            .field("pipeline", &self.pipeline)
            .field("knowledge", &self.knowledge)
            .field("web_search", &self.web_search)
            .field("providers", &self.providers)
            .finish()
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("default_model", &self.default_model)
            .finish()
    }
}

/// Timeouts and limits of the decision → dispatch → synthesis pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_decision_timeout")]
    pub decision_timeout_secs: u64,

    #[serde(default = "default_synthesis_timeout")]
    pub synthesis_timeout_secs: u64,

    /// Per tool invocation
    #[serde(default = "default_tool_timeout")]
    pub tool_timeout_secs: u64,

    /// Reasoning rounds allowed before the decision stage gives up (1..=3)
    #[serde(default = "default_max_decision_iterations")]
    pub max_decision_iterations: u32,

    #[serde(default)]
    pub decision_temperature: f32,
}

fn default_decision_timeout() -> u64 {
    60
}
fn default_synthesis_timeout() -> u64 {
    90
}
fn default_tool_timeout() -> u64 {
    30
}
fn default_max_decision_iterations() -> u32 {
    3
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            decision_timeout_secs: default_decision_timeout(),
            synthesis_timeout_secs: default_synthesis_timeout(),
            tool_timeout_secs: default_tool_timeout(),
            max_decision_iterations: default_max_decision_iterations(),
            decision_temperature: 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeConfig {
    /// Provider used for embeddings; falls back to `default_provider` when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding_provider: Option<String>,

    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    /// Statute store directory
    #[serde(default = "default_legal_db_dir")]
    pub legal_db_dir: PathBuf,

    /// Case store directory
    #[serde(default = "default_case_db_dir")]
    pub case_db_dir: PathBuf,

    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,

    #[serde(default = "default_embed_batch_size")]
    pub embed_batch_size: usize,

    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Candidate pool for maximal-marginal-relevance search
    #[serde(default = "default_fetch_k")]
    pub fetch_k: usize,

    /// 1.0 = pure relevance, 0.0 = pure diversity
    #[serde(default = "default_mmr_lambda")]
    pub mmr_lambda: f32,
}

fn default_embedding_model() -> String {
    "m3e-base".into()
}
fn default_legal_db_dir() -> PathBuf {
    AppConfig::config_dir().join("vector_db").join("legal")
}
fn default_case_db_dir() -> PathBuf {
    AppConfig::config_dir().join("vector_db").join("case")
}
fn default_chunk_size() -> usize {
    500
}
fn default_chunk_overlap() -> usize {
    50
}
fn default_embed_batch_size() -> usize {
    32
}
fn default_top_k() -> usize {
    3
}
fn default_fetch_k() -> usize {
    10
}
fn default_mmr_lambda() -> f32 {
    0.5
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            embedding_provider: None,
            embedding_model: default_embedding_model(),
            legal_db_dir: default_legal_db_dir(),
            case_db_dir: default_case_db_dir(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            embed_batch_size: default_embed_batch_size(),
            top_k: default_top_k(),
            fetch_k: default_fetch_k(),
            mmr_lambda: default_mmr_lambda(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebSearchConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_search_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_max_results")]
    pub max_results: usize,

    #[serde(default = "default_search_timeout")]
    pub timeout_secs: u64,
}

fn default_search_endpoint() -> String {
    "https://api.duckduckgo.com/".into()
}
fn default_max_results() -> usize {
    3
}
fn default_search_timeout() -> u64 {
    15
}

impl Default for WebSearchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: default_search_endpoint(),
            max_results: default_max_results(),
            timeout_secs: default_search_timeout(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.zhifa/config.toml).
    ///
    /// Environment variables override the file:
    /// - `ZHIFA_API_KEY`, then `LLM_API_KEY`, then `OPENAI_API_KEY`
    /// - `ZHIFA_PROVIDER`
    /// - `ZHIFA_MODEL`, then `LLM_MODEL`
    /// - `LLM_BASE_URL` (base URL of the default provider)
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides through `lookup` (usually `std::env::var`).
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = non_empty("ZHIFA_API_KEY")
            .or_else(|| non_empty("LLM_API_KEY"))
            .or_else(|| non_empty("OPENAI_API_KEY"))
        {
            self.api_key = Some(key);
        }

        if let Some(provider) = non_empty("ZHIFA_PROVIDER") {
            self.default_provider = provider;
        }

        if let Some(model) = non_empty("ZHIFA_MODEL").or_else(|| non_empty("LLM_MODEL")) {
            self.default_model = model;
        }

        if let Some(url) = non_empty("LLM_BASE_URL") {
            self.providers
                .entry(self.default_provider.clone())
                .or_default()
                .api_url = Some(url);
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".zhifa")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_temperature < 0.0 || self.default_temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "default_temperature must be between 0.0 and 2.0".into(),
            ));
        }

        let p = &self.pipeline;
        if p.decision_temperature < 0.0 || p.decision_temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "pipeline.decision_temperature must be between 0.0 and 2.0".into(),
            ));
        }
        if !(1..=3).contains(&p.max_decision_iterations) {
            return Err(ConfigError::ValidationError(
                "pipeline.max_decision_iterations must be between 1 and 3".into(),
            ));
        }
        if p.decision_timeout_secs == 0 || p.synthesis_timeout_secs == 0 || p.tool_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "pipeline timeouts must be greater than 0".into(),
            ));
        }

        let k = &self.knowledge;
        if k.chunk_size == 0 || k.chunk_overlap >= k.chunk_size {
            return Err(ConfigError::ValidationError(
                "knowledge.chunk_overlap must be smaller than a non-zero chunk_size".into(),
            ));
        }
        if k.top_k == 0 || k.top_k > k.fetch_k {
            return Err(ConfigError::ValidationError(
                "knowledge.top_k must be between 1 and fetch_k".into(),
            ));
        }
        if !(0.0..=1.0).contains(&k.mmr_lambda) {
            return Err(ConfigError::ValidationError(
                "knowledge.mmr_lambda must be between 0.0 and 1.0".into(),
            ));
        }
        if k.embed_batch_size == 0 {
            return Err(ConfigError::ValidationError(
                "knowledge.embed_batch_size must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
            || self
                .providers
                .get(&self.default_provider)
                .is_some_and(|p| p.api_key.is_some())
    }

    /// The provider used for embeddings.
    pub fn embedding_provider(&self) -> &str {
        self.knowledge
            .embedding_provider
            .as_deref()
            .unwrap_or(&self.default_provider)
    }

    /// Generate a default config TOML string (for `onboard` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_provider: default_provider(),
            default_model: default_model(),
            default_temperature: default_temperature(),
            default_max_tokens: default_max_tokens(),
            pipeline: PipelineConfig::default(),
            knowledge: KnowledgeConfig::default(),
            web_search: WebSearchConfig::default(),
            providers: HashMap::new(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
