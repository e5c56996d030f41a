//! Charge prediction (LCP): retrieve relevant statutes, then ask the model
//! for the most likely charge names.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};
use zhifa_core::error::ToolError;
use zhifa_core::tool::{Tool, ToolStatus, tagged};
use zhifa_knowledge::{Collection, KnowledgeBase};

use crate::llm::ChatModel;

pub const NAME: &str = "LCP";

/// Reply the model is told to give when the facts are insufficient.
pub const UNDETERMINED: &str = "根据现有信息无法准确判断罪名";

/// Statute passages retrieved as reference.
const REFERENCE_K: usize = 3;

pub struct ChargePredictionTool {
    knowledge: Arc<KnowledgeBase>,
    model: ChatModel,
}

impl ChargePredictionTool {
    pub fn new(knowledge: Arc<KnowledgeBase>, model: ChatModel) -> Self {
        Self { knowledge, model }
    }

    /// Best-effort statute lookup; failures only weaken the prompt.
    async fn reference_articles(&self, case_details: &str) -> String {
        match self.knowledge.search(Collection::Legal, case_details, REFERENCE_K).await {
            Ok(hits) => hits
                .iter()
                .enumerate()
                .map(|(i, hit)| format!("相关法条片段{}: {}", i + 1, hit.passage.content.trim()))
                .collect::<Vec<_>>()
                .join("\n\n"),
            Err(e) => {
                warn!(tool = NAME, error = %e, "Statute retrieval failed, predicting without references");
                String::new()
            }
        }
    }
}

fn prompt(case_details: &str, articles: &str) -> String {
    let articles = if articles.is_empty() { "无" } else { articles };
    format!(
        "作为一名资深的中国刑事法律专家，请严格根据以下信息进行分析。\n\
         [案情描述]: {case_details}\n\
         [从法条库检索到的最相关法律规定（仅供参考，以案情为准）]: {articles}\n\
         [你的任务]: 综合分析上述案情并参考相关法律规定，给出该案情最可能构成的一个或多个具体罪名。\
         只返回罪名名称本身，多个罪名用逗号分隔。如果信息不足以做出明确判断，请返回“{UNDETERMINED}”。"
    )
}

#[async_trait]
impl Tool for ChargePredictionTool {
    fn name(&self) -> &str {
        NAME
    }

    fn title(&self) -> &str {
        "罪名预测"
    }

    fn description(&self) -> &str {
        "用户想知道某个行为可能构成什么罪时使用。输入详细的案情描述，\
         工具先检索刑法相关条文，再据此推断最可能的罪名。"
    }

    async fn invoke(&self, query: &str) -> Result<String, ToolError> {
        let articles = self.reference_articles(query).await;
        debug!(tool = NAME, with_references = !articles.is_empty(), "Predicting charge");

        match self.model.ask(prompt(query, &articles)).await {
            Ok(charge) if charge.is_empty() => Ok(tagged(NAME, ToolStatus::Success, UNDETERMINED)),
            Ok(charge) => Ok(tagged(NAME, ToolStatus::Success, &charge)),
            Err(e) => Ok(tagged(
                NAME,
                ToolStatus::Error,
                &format!("进行罪名推理时发生内部错误: {e}"),
            )),
        }
    }
}
