//! Analysis tools that are a single model prompt over the query:
//! element recognition (LER), event detection (LED) and text summary (LTS).

use async_trait::async_trait;
use tracing::debug;
use zhifa_core::error::ToolError;
use zhifa_core::tool::{Tool, ToolStatus, tagged};

use crate::llm::ChatModel;

/// Placeholder replaced by the query in a prompt template.
const QUERY_SLOT: &str = "{query}";

pub struct PromptTool {
    name: &'static str,
    title: &'static str,
    description: &'static str,
    template: &'static str,
    /// What the tool reports when the model answers with nothing
    empty_reply: &'static str,
    model: ChatModel,
}

impl PromptTool {
    /// Legal element recognition: subject, object, objective and subjective aspects.
    pub fn element_recognition(model: ChatModel) -> Self {
        Self {
            name: "LER",
            title: "法律要素识别",
            description: "需要对案情做结构化分析时使用。输入案情描述，\
                          返回主体、客体、客观方面、主观方面等犯罪构成要件。",
            template: "作为一名精通中国法律的分析师，请从以下[案情描述]中抽取犯罪构成的四个核心要件。\n\
                       [案情描述]: {query}\n\
                       [输出格式]: 严格按下列格式输出，每项简洁描述；文本中不明确的要素填写“不明确”。\n\
                       主体: \n客体: \n客观方面: \n主观方面: ",
            empty_reply: "主体: 不明确\n客体: 不明确\n客观方面: 不明确\n主观方面: 不明确",
            model,
        }
    }

    /// Legal event detection: comma-separated event names.
    pub fn event_detection(model: ChatModel) -> Self {
        Self {
            name: "LED",
            title: "法律事件检测",
            description: "需要从案情或对话中识别涉及的法律事件或程序时使用。\
                          返回以逗号分隔的事件列表。",
            template: "作为法律事件检测器，请从下面的[文本]中识别并列出所有具体的法律事件或法律程序。\n\
                       [文本]: {query}\n\
                       [说明]: 事件类型包括但不限于：提起诉讼、申请仲裁、签订合同、提出上诉、离婚登记、\
                       财产分割、工伤认定、申请强制执行、继承遗产、报案。用逗号分隔，只输出事件名称本身。\
                       如果未检测到明确的法律事件，请返回“未检测到特定法律事件”。",
            empty_reply: "未检测到特定法律事件",
            model,
        }
    }

    /// Legal text summary: at most 200 characters, neutral.
    pub fn text_summary(model: ChatModel) -> Self {
        Self {
            name: "LTS",
            title: "法律文本摘要",
            description: "需要把较长的法律文书或案情描述概括为简短摘要时使用。\
                          返回不超过200字的中立摘要。",
            template: "作为专业的法律文书摘要师，请将以下[原始法律文本]提炼成一段不超过200字的简洁、准确、中立的摘要，\
                       突出核心事实、主要人物关系和关键争议焦点或结论。\n\
                       [原始法律文本]: {query}\n\
                       [输出要求]: 直接输出摘要内容，不要添加“摘要如下：”等引言。",
            empty_reply: "",
            model,
        }
    }

    fn render(&self, query: &str) -> String {
        self.template.replace(QUERY_SLOT, query)
    }
}

#[async_trait]
impl Tool for PromptTool {
    fn name(&self) -> &str {
        self.name
    }

    fn title(&self) -> &str {
        self.title
    }

    fn description(&self) -> &str {
        self.description
    }

    async fn invoke(&self, query: &str) -> Result<String, ToolError> {
        debug!(tool = self.name, model = self.model.model(), "Running prompt tool");

        match self.model.ask(self.render(query)).await {
            Ok(reply) if reply.is_empty() && self.empty_reply.is_empty() => Ok(tagged(
                self.name,
                ToolStatus::NotFound,
                "模型未生成有效内容。",
            )),
            Ok(reply) if reply.is_empty() => Ok(tagged(self.name, ToolStatus::Success, self.empty_reply)),
            Ok(reply) => Ok(tagged(self.name, ToolStatus::Success, &reply)),
            Err(e) => Ok(tagged(
                self.name,
                ToolStatus::Error,
                &format!("{}时发生内部错误: {e}", self.title),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FixedProvider, chat_model};
    use zhifa_core::tool::ToolObservation;

    #[tokio::test]
    async fn element_recognition_wraps_reply() {
        let provider = FixedProvider::replying("主体: 张某\n客体: 他人财产所有权\n客观方面: 秘密窃取\n主观方面: 直接故意");
        let tool = PromptTool::element_recognition(chat_model(provider.clone()));

        let raw = tool.invoke("张某秘密窃取邻居财物").await.unwrap();
        let obs = ToolObservation::parse("LER", &raw).unwrap();
        assert_eq!(obs.status, ToolStatus::Success);
        assert!(obs.payload.starts_with("主体: 张某"));
        assert!(provider.last_prompt().contains("[案情描述]: 张某秘密窃取邻居财物"));
    }

    #[tokio::test]
    async fn event_detection_empty_reply_uses_default() {
        let tool = PromptTool::event_detection(chat_model(FixedProvider::replying("  ")));
        let raw = tool.invoke("今天天气很好").await.unwrap();
        let obs = ToolObservation::parse("LED", &raw).unwrap();
        assert_eq!(obs.status, ToolStatus::Success);
        assert_eq!(obs.payload, "未检测到特定法律事件");
    }

    #[tokio::test]
    async fn summary_empty_reply_is_not_found() {
        let tool = PromptTool::text_summary(chat_model(FixedProvider::replying("")));
        let raw = tool.invoke("很长的判决书").await.unwrap();
        assert_eq!(ToolObservation::parse("LTS", &raw).unwrap().status, ToolStatus::NotFound);
    }

    #[tokio::test]
    async fn model_failure_is_tagged_error_with_own_name() {
        let tool = PromptTool::event_detection(chat_model(FixedProvider::failing()));
        let raw = tool.invoke("x").await.unwrap();
        assert!(raw.starts_with("<LED status='error'>"));
        assert!(raw.ends_with("</LED>"));
    }

    #[test]
    fn descriptors_are_distinct() {
        let model = chat_model(FixedProvider::replying("ok"));
        let names: Vec<String> = [
            PromptTool::element_recognition(model.clone()),
            PromptTool::event_detection(model.clone()),
            PromptTool::text_summary(model),
        ]
        .iter()
        .map(|t| t.descriptor().name)
        .collect();
        assert_eq!(names, vec!["LER", "LED", "LTS"]);
    }
}
