//! Pipeline stages and the orchestrator that wires them together.

pub mod decision;
pub mod dispatch;
mod llm;
pub mod orchestrator;
pub mod sanitizer;
pub mod synthesis;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use decision::{is_closing_phrase, DecisionStage};
pub use dispatch::{tool_query, DispatchStage};
pub use orchestrator::{ConsultationPipeline, ConsultationResult, APOLOGY};
pub use sanitizer::Sanitizer;
pub use synthesis::{SynthesisStage, EMPTY_SYNTHESIS_FALLBACK};

use zhifa_config::AppConfig;

/// Model and budget settings for one pipeline instance.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub model: String,
    /// Sampling temperature for synthesis
    pub temperature: f32,
    pub max_tokens: u32,
    pub decision_temperature: f32,
    pub decision_timeout_secs: u64,
    pub synthesis_timeout_secs: u64,
    pub tool_timeout_secs: u64,
    /// Reasoning rounds before the decision stage gives up
    pub max_decision_iterations: u32,
}

impl PipelineSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        let p = &config.pipeline;
        Self {
            model: config.default_model.clone(),
            temperature: config.default_temperature,
            max_tokens: config.default_max_tokens,
            decision_temperature: p.decision_temperature,
            decision_timeout_secs: p.decision_timeout_secs,
            synthesis_timeout_secs: p.synthesis_timeout_secs,
            tool_timeout_secs: p.tool_timeout_secs,
            max_decision_iterations: p.max_decision_iterations.clamp(1, 3),
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}
