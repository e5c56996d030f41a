pub mod ask;
pub mod doctor;
pub mod index;
pub mod onboard;

use std::sync::Arc;
use zhifa_agent::{ConsultationPipeline, PipelineSettings};
use zhifa_config::AppConfig;
use zhifa_core::provider::Provider;
use zhifa_knowledge::{KnowledgeBase, ProviderEmbedder, RetrievalSettings};
use zhifa_providers::ProviderRouter;
use zhifa_tools::{default_registry, ChatModel, WebSearchTool};

pub(crate) type CliResult = Result<(), Box<dyn std::error::Error>>;

/// Load the configuration, turning failures into a readable message.
pub(crate) fn load_config() -> Result<AppConfig, Box<dyn std::error::Error>> {
    Ok(AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?)
}

pub(crate) fn embedding_provider(
    config: &AppConfig,
    router: &ProviderRouter,
) -> Result<Arc<dyn Provider>, Box<dyn std::error::Error>> {
    let name = config.embedding_provider();
    Ok(router
        .get(name)
        .ok_or_else(|| format!("Embedding provider '{name}' is not configured"))?)
}

/// Wire provider, knowledge base and tools into a consultation pipeline.
pub(crate) fn build_pipeline(config: &AppConfig) -> Result<ConsultationPipeline, Box<dyn std::error::Error>> {
    let router = zhifa_providers::build_from_config(config);
    let provider = router.default().ok_or("No default provider configured")?;

    let k = &config.knowledge;
    let embedder = Arc::new(ProviderEmbedder::new(
        embedding_provider(config, &router)?,
        &k.embedding_model,
    ));
    let knowledge = Arc::new(
        KnowledgeBase::new(embedder, &k.legal_db_dir, &k.case_db_dir).with_settings(RetrievalSettings {
            top_k: k.top_k,
            fetch_k: k.fetch_k,
            mmr_lambda: k.mmr_lambda,
        }),
    );

    let model = ChatModel::new(provider.clone(), &config.default_model).with_temperature(config.default_temperature);
    let web = &config.web_search;
    let web_search = web
        .enabled
        .then(|| WebSearchTool::new(&web.endpoint, web.max_results, web.timeout_secs));

    let tools = Arc::new(default_registry(knowledge, model, web_search));
    tracing::debug!(
        provider = %provider.name(),
        model = %config.default_model,
        tools = ?tools.names(),
        "Consultation pipeline ready"
    );
    Ok(ConsultationPipeline::new(
        provider,
        tools,
        PipelineSettings::from_config(config),
    ))
}
