//! Time-boxed model calls shared by the decision and synthesis stages.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;
use zhifa_core::error::PipelineError;
use zhifa_core::message::Message;
use zhifa_core::provider::{Provider, ProviderRequest};

/// A provider bound to the sampling parameters of one stage.
#[derive(Clone)]
pub(crate) struct StageModel {
    pub stage: &'static str,
    pub provider: Arc<dyn Provider>,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

impl StageModel {
    /// Send `messages` and return the trimmed reply text.
    ///
    /// The whole call is bounded by `timeout_secs`; provider failures are
    /// attributed to this stage.
    pub async fn complete(&self, messages: Vec<Message>) -> Result<String, PipelineError> {
        let request = ProviderRequest::new(self.model.clone(), messages)
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens);

        let started = Instant::now();
        let response = tokio::time::timeout(
            Duration::from_secs(self.timeout_secs),
            self.provider.complete(request),
        )
        .await
        .map_err(|_| PipelineError::UpstreamTimeout {
            stage: self.stage,
            secs: self.timeout_secs,
        })?
        .map_err(|source| PipelineError::Provider {
            stage: self.stage,
            source,
        })?;

        debug!(
            stage = self.stage,
            provider = self.provider.name(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Model call finished"
        );
        Ok(response.message.content.trim().to_string())
    }
}
