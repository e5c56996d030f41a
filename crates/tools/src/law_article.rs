//! Statute search (LAS): diverse relevant provisions via MMR retrieval.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};
use zhifa_core::error::{KnowledgeError, ToolError};
use zhifa_core::tool::{Tool, ToolStatus, tagged};
use zhifa_knowledge::{Collection, KnowledgeBase};

use crate::one_line;

pub const NAME: &str = "LAS";

pub struct LawArticleTool {
    knowledge: Arc<KnowledgeBase>,
}

impl LawArticleTool {
    pub fn new(knowledge: Arc<KnowledgeBase>) -> Self {
        Self { knowledge }
    }
}

#[async_trait]
impl Tool for LawArticleTool {
    fn name(&self) -> &str {
        NAME
    }

    fn title(&self) -> &str {
        "法条检索"
    }

    fn description(&self) -> &str {
        "需要查找、引用或核实相关法律条款时使用。输入可以是案情描述或直接的法律问题，\
         返回多样且相关的法律条文片段及其来源。"
    }

    async fn invoke(&self, query: &str) -> Result<String, ToolError> {
        let settings = self.knowledge.settings();
        debug!(tool = NAME, k = settings.top_k, fetch_k = settings.fetch_k, "Searching statutes");

        let hits = match self.knowledge.search_mmr(Collection::Legal, query).await {
            Ok(hits) => hits,
            Err(KnowledgeError::StoreUnavailable { path, reason }) => {
                warn!(tool = NAME, %path, %reason, "Statute store unavailable");
                return Ok(tagged(NAME, ToolStatus::Error, "无法访问本地法律知识库。"));
            }
            Err(e) => {
                return Ok(tagged(
                    NAME,
                    ToolStatus::Error,
                    &format!("检索法条时发生内部错误: {e}"),
                ));
            }
        };

        if hits.is_empty() {
            return Ok(tagged(
                NAME,
                ToolStatus::NotFound,
                &format!("未在法条库中找到与“{query}”相关的法律条款。"),
            ));
        }

        let formatted: Vec<String> = hits
            .iter()
            .enumerate()
            .map(|(i, hit)| {
                format!(
                    "法条片段{}(来源:{}): {}",
                    i + 1,
                    hit.passage.source,
                    one_line(&hit.passage.content)
                )
            })
            .collect();

        Ok(tagged(NAME, ToolStatus::Success, &formatted.join(" | ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{knowledge, passage, unavailable_knowledge};
    use zhifa_core::tool::ToolObservation;

    #[tokio::test]
    async fn returns_statute_fragments() {
        let kb = knowledge(
            vec![
                passage("264", "刑法.txt", "第二百六十四条\n盗窃公私财物，数额较大的，处三年以下有期徒刑"),
                passage("234", "刑法.txt", "第二百三十四条 故意伤害他人身体的，处三年以下有期徒刑"),
                passage("1079", "民法典.txt", "第一千零七十九条 夫妻一方要求离婚的，可以由有关组织进行调解"),
            ],
            vec![],
        );
        let raw = LawArticleTool::new(kb).invoke("入室盗窃怎么判").await.unwrap();
        let obs = ToolObservation::parse(NAME, &raw).unwrap();

        assert_eq!(obs.status, ToolStatus::Success);
        assert!(obs.payload.starts_with("法条片段1(来源:刑法.txt): 第二百六十四条 盗窃"));
        assert_eq!(obs.payload.matches("法条片段").count(), 3);
    }

    #[tokio::test]
    async fn empty_store_is_not_found() {
        let raw = LawArticleTool::new(knowledge(vec![], vec![]))
            .invoke("盗窃")
            .await
            .unwrap();
        let obs = ToolObservation::parse(NAME, &raw).unwrap();
        assert_eq!(obs.status, ToolStatus::NotFound);
        assert!(obs.payload.contains("盗窃"));
    }

    #[tokio::test]
    async fn missing_store_is_error() {
        let raw = LawArticleTool::new(unavailable_knowledge())
            .invoke("盗窃")
            .await
            .unwrap();
        assert_eq!(ToolObservation::parse(NAME, &raw).unwrap().status, ToolStatus::Error);
    }
}
