//! Single-prompt model access shared by the analysis tools.

use std::sync::Arc;
use zhifa_core::error::ProviderError;
use zhifa_core::message::Message;
use zhifa_core::provider::{Provider, ProviderRequest};

/// A provider bound to one model and sampling temperature.
#[derive(Clone)]
pub struct ChatModel {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f32,
}

impl ChatModel {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: 0.1,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send one user prompt and return the trimmed reply.
    pub async fn ask(&self, prompt: String) -> Result<String, ProviderError> {
        let request = ProviderRequest::new(self.model.clone(), vec![Message::user(prompt)])
            .with_temperature(self.temperature);
        let response = self.provider.complete(request).await?;
        Ok(response.message.content.trim().to_string())
    }
}
