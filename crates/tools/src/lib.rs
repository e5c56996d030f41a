//! Legal tool implementations for Zhifa.
//!
//! Every tool takes a plain-text query and answers with the tagged format
//! `<ID status='success|not_found|error'>payload</ID>`:
//!
//! | Key | Tool |
//! |-----|------|
//! | SCM | similar case matching over the case store |
//! | LAS | statute search (MMR) over the statute store |
//! | LCP | charge prediction: statute retrieval + model reasoning |
//! | LER | legal element recognition |
//! | LED | legal event detection |
//! | LTS | legal text summary |
//! | WEB | internet search |

pub mod charge_prediction;
pub mod law_article;
pub mod llm;
pub mod prompt_tool;
pub mod similar_case;
pub mod web_search;

#[cfg(test)]
pub(crate) mod test_support;

use std::sync::Arc;
use zhifa_core::tool::ToolRegistry;
use zhifa_knowledge::KnowledgeBase;

pub use charge_prediction::ChargePredictionTool;
pub use law_article::LawArticleTool;
pub use llm::ChatModel;
pub use prompt_tool::PromptTool;
pub use similar_case::SimilarCaseTool;
pub use web_search::WebSearchTool;

/// Create the registry with every legal tool.
///
/// `web_search` is `None` when internet search is disabled; `WEB` is then
/// simply not offered to the decision model.
pub fn default_registry(
    knowledge: Arc<KnowledgeBase>,
    model: ChatModel,
    web_search: Option<WebSearchTool>,
) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(SimilarCaseTool::new(knowledge.clone())));
    registry.register(Box::new(LawArticleTool::new(knowledge.clone())));
    registry.register(Box::new(ChargePredictionTool::new(knowledge, model.clone())));
    registry.register(Box::new(PromptTool::element_recognition(model.clone())));
    registry.register(Box::new(PromptTool::event_detection(model.clone())));
    registry.register(Box::new(PromptTool::text_summary(model)));
    if let Some(web) = web_search {
        registry.register(Box::new(web));
    }
    registry
}

/// Collapse line breaks so a passage fits on one line.
pub(crate) fn one_line(text: &str) -> String {
    text.split(['\n', '\r'])
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// The first `max` characters of `text`.
pub(crate) fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
