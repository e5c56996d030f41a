//! Similar case matching (SCM): nearest judgments from the case store.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};
use zhifa_core::error::{KnowledgeError, ToolError};
use zhifa_core::tool::{Tool, ToolStatus, tagged};
use zhifa_knowledge::{Collection, KnowledgeBase};

use crate::{one_line, truncate_chars};

pub const NAME: &str = "SCM";

/// Characters of each case shown in the result.
const PREVIEW_CHARS: usize = 150;

pub struct SimilarCaseTool {
    knowledge: Arc<KnowledgeBase>,
    k: usize,
}

impl SimilarCaseTool {
    pub fn new(knowledge: Arc<KnowledgeBase>) -> Self {
        let k = knowledge.settings().top_k;
        Self { knowledge, k }
    }
}

#[async_trait]
impl Tool for SimilarCaseTool {
    fn name(&self) -> &str {
        NAME
    }

    fn title(&self) -> &str {
        "相似案例查找"
    }

    fn description(&self) -> &str {
        "需要寻找与当前案情相似的判例时使用。输入应是包含关键事实和争议焦点的案情描述，\
         返回语义最接近的案例来源、内容预览和相关性得分。"
    }

    async fn invoke(&self, query: &str) -> Result<String, ToolError> {
        debug!(tool = NAME, k = self.k, "Searching similar cases");

        let hits = match self.knowledge.search(Collection::Case, query, self.k).await {
            Ok(hits) => hits,
            Err(KnowledgeError::StoreUnavailable { path, reason }) => {
                warn!(tool = NAME, %path, %reason, "Case store unavailable");
                return Ok(tagged(
                    NAME,
                    ToolStatus::Error,
                    "无法访问本地案例知识库，请确认已建立案例索引。",
                ));
            }
            Err(e) => {
                return Ok(tagged(
                    NAME,
                    ToolStatus::Error,
                    &format!("检索相似案例时发生内部错误: {e}"),
                ));
            }
        };

        if hits.is_empty() {
            return Ok(tagged(
                NAME,
                ToolStatus::NotFound,
                "未在案例库中找到与您描述相似的案例。",
            ));
        }

        let formatted: Vec<String> = hits
            .iter()
            .enumerate()
            .map(|(i, hit)| {
                format!(
                    "相似案例{}(来源:{}, 相关性得分:{:.4}): {}...",
                    i + 1,
                    hit.passage.source,
                    hit.score,
                    truncate_chars(&one_line(&hit.passage.content), PREVIEW_CHARS)
                )
            })
            .collect();

        Ok(tagged(
            NAME,
            ToolStatus::Success,
            &format!(
                "检索到以下案例（相关性得分越高表示越相似）: {}",
                formatted.join(" | ")
            ),
        ))
    }
}
