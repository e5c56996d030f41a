//! Provider router: selects the LLM provider named in configuration.
//!
//! Every provider speaks the OpenAI-compatible protocol; the router only
//! decides base URL and API key per name.

use std::collections::HashMap;
use std::sync::Arc;
use zhifa_core::provider::Provider;
use crate::openai_compat::OpenAiCompatProvider;

/// Routes LLM requests to the correct provider.
pub struct ProviderRouter {
    providers: HashMap<String, Arc<dyn Provider>>,
    default_provider: String,
}

impl ProviderRouter {
    /// Create a new router with a default provider.
    pub fn new(default_provider: impl Into<String>) -> Self {
        Self {
            providers: HashMap::new(),
            default_provider: default_provider.into(),
        }
    }

    /// Register a provider.
    pub fn register(&mut self, name: impl Into<String>, provider: Arc<dyn Provider>) {
        self.providers.insert(name.into(), provider);
    }

    /// Get the default provider.
    pub fn default(&self) -> Option<Arc<dyn Provider>> {
        self.providers.get(&self.default_provider).cloned()
    }

    /// Get a specific provider by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Provider>> {
        self.providers.get(name).cloned()
    }

    /// List all registered provider names, sorted.
    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.providers.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }
}

/// Build providers from configuration.
///
/// Registers every `[providers.<name>]` entry, then makes sure both the
/// default provider and the embedding provider exist.
pub fn build_from_config(config: &zhifa_config::AppConfig) -> ProviderRouter {
    let mut router = ProviderRouter::new(&config.default_provider);

    for name in config.providers.keys() {
        router.register(name.clone(), build_one(config, name));
    }

    for name in [config.default_provider.as_str(), config.embedding_provider()] {
        if router.get(name).is_none() {
            router.register(name.to_string(), build_one(config, name));
        }
    }

    router
}

fn build_one(config: &zhifa_config::AppConfig, name: &str) -> Arc<dyn Provider> {
    let provider_config = config.providers.get(name);

    let api_key = provider_config
        .and_then(|p| p.api_key.clone())
        .or_else(|| config.api_key.clone())
        .unwrap_or_default();

    let base_url = provider_config
        .and_then(|p| p.api_url.clone())
        .unwrap_or_else(|| default_base_url(name));

    Arc::new(OpenAiCompatProvider::new(name, base_url, api_key))
}

/// Get the default base URL for well-known providers.
pub fn default_base_url(provider_name: &str) -> String {
    match provider_name {
        "deepseek" => "https://api.deepseek.com/v1".into(),
        "openai" => "https://api.openai.com/v1".into(),
        "dashscope" | "qwen" => "https://dashscope.aliyuncs.com/compatible-mode/v1".into(),
        "zhipu" => "https://open.bigmodel.cn/api/paas/v4".into(),
        "moonshot" => "https://api.moonshot.cn/v1".into(),
        "ollama" => "http://localhost:11434/v1".into(),
        "xinference" => "http://localhost:9997/v1".into(),
        "vllm" => "http://localhost:8000/v1".into(),
        _ => "http://localhost:8000/v1".into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zhifa_config::{AppConfig, ProviderConfig};

    #[test]
    fn router_register_and_lookup() {
        let mut router = ProviderRouter::new("deepseek");
        let provider = Arc::new(OpenAiCompatProvider::deepseek("sk-test"));
        router.register("deepseek", provider);

        assert!(router.get("deepseek").is_some());
        assert!(router.get("nonexistent").is_none());
        assert!(router.default().is_some());
    }

    #[test]
    fn default_base_urls() {
        assert!(default_base_url("deepseek").contains("api.deepseek.com"));
        assert!(default_base_url("openai").contains("api.openai.com"));
        assert!(default_base_url("ollama").contains("localhost:11434"));
        assert!(default_base_url("vllm").contains("localhost:8000"));
    }

    #[test]
    fn build_from_default_config() {
        let config = AppConfig::default();
        let router = build_from_config(&config);
        assert!(router.default().is_some());
        assert_eq!(router.list(), vec!["vllm"]);
    }

    #[test]
    fn embedding_provider_registered() {
        let mut config = AppConfig::default();
        config.knowledge.embedding_provider = Some("xinference".into());
        config.providers.insert(
            "deepseek".into(),
            ProviderConfig {
                api_key: Some("sk-x".into()),
                ..ProviderConfig::default()
            },
        );
        let router = build_from_config(&config);
        assert_eq!(router.list(), vec!["deepseek", "vllm", "xinference"]);
    }
}
