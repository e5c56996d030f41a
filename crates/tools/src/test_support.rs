//! Fixtures shared by the tool tests.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use zhifa_core::error::{KnowledgeError, ProviderError};
use zhifa_core::message::Message;
use zhifa_core::provider::{Provider, ProviderRequest, ProviderResponse};
use zhifa_knowledge::{Embedder, KnowledgeBase, Passage, VectorStore};

use crate::llm::ChatModel;

/// Embeds text by counting a few legal keywords.
pub struct KeywordEmbedder;

const KEYWORDS: [char; 3] = ['盗', '伤', '婚'];

#[async_trait]
impl Embedder for KeywordEmbedder {
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, KnowledgeError> {
        Ok(texts.iter().map(|t| keyword_vector(t)).collect())
    }
}

pub fn keyword_vector(text: &str) -> Vec<f32> {
    KEYWORDS
        .iter()
        .map(|k| text.matches(*k).count() as f32 + 0.01)
        .collect()
}

pub fn passage(id: &str, source: &str, content: &str) -> Passage {
    Passage {
        id: id.into(),
        source: source.into(),
        content: content.into(),
        embedding: keyword_vector(content),
    }
}

pub fn knowledge(legal: Vec<Passage>, cases: Vec<Passage>) -> Arc<KnowledgeBase> {
    Arc::new(KnowledgeBase::from_stores(
        Arc::new(KeywordEmbedder),
        VectorStore::in_memory(legal),
        VectorStore::in_memory(cases),
    ))
}

/// A knowledge base whose stores do not exist on disk.
pub fn unavailable_knowledge() -> Arc<KnowledgeBase> {
    Arc::new(KnowledgeBase::new(
        Arc::new(KeywordEmbedder),
        "/nonexistent/zhifa/legal",
        "/nonexistent/zhifa/case",
    ))
}

/// Replies with a fixed text (or error) and records every prompt.
pub struct FixedProvider {
    reply: Result<String, ProviderError>,
    pub prompts: Mutex<Vec<String>>,
}

impl FixedProvider {
    pub fn replying(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Ok(reply.to_string()),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            reply: Err(ProviderError::Network("connection refused".into())),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn last_prompt(&self) -> String {
        self.prompts.lock().unwrap().last().cloned().unwrap_or_default()
    }
}

#[async_trait]
impl Provider for FixedProvider {
    fn name(&self) -> &str {
        "fixed"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let prompt = request
            .messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        self.prompts.lock().unwrap().push(prompt);
        let text = self.reply.clone()?;
        Ok(ProviderResponse {
            message: Message::assistant(text),
            usage: None,
            model: request.model,
        })
    }
}

pub fn chat_model(provider: Arc<FixedProvider>) -> ChatModel {
    ChatModel::new(provider, "test-model")
}
