//! Decision stage: classify a consultation into one of four actions.
//!
//! Precedence, highest first:
//!
//! 1. the user is closing the conversation → `Closing`
//! 2. minimum facts are missing → `Clarify`
//! 3. the answer needs statutes, cases or other lookups → `AnswerWithTools`
//! 4. otherwise → `AnswerDirect`
//!
//! Rule 1 is checked locally before the model is asked, so a closing
//! remark never reaches a tool.

use std::sync::Arc;
use tracing::{debug, info, warn};
use zhifa_core::consultation::ConsultationRequest;
use zhifa_core::decision::{parse_decision, Decision, DecisionReply};
use zhifa_core::error::PipelineError;
use zhifa_core::message::Message;
use zhifa_core::provider::Provider;
use zhifa_core::tool::ToolDescriptor;

use super::llm::StageModel;
use super::PipelineSettings;

const STAGE: &str = "decision";

/// Phrases that say the user has nothing more to ask.
const CLOSING_PHRASES: &[&str] = &[
    "没什么其他问题",
    "没有其他问题",
    "没有别的问题",
    "没有其他疑问",
    "没有问题了",
    "就问这些",
];

/// Thanks, farewells and acknowledgements; a closing remark needs at least one.
const FAREWELL_TOKENS: &[&str] = &["谢谢", "感谢", "多谢", "再见", "拜拜", "好的", "ok"];

/// Filler that may surround a closing remark but never closes on its own.
const FILLER_TOKENS: &[&str] = &["非常", "律师", "好", "嗯", "了", "吧", "啦", "您", "你"];

const CONTINUE_PROMPT: &str = "请直接输出最终指令，只能是四种标准指令之一，不要包含其他文字。";

/// Whether `question` is a closing remark ("谢谢，没有其他问题了", "好的，谢谢律师").
///
/// The whole text must be made of closing phrases, farewell tokens and
/// filler, with at least one phrase or farewell token. Anything containing
/// a question mark is treated as a real question.
pub fn is_closing_phrase(question: &str) -> bool {
    if question.contains(['？', '?']) {
        return false;
    }

    let compact: String = question
        .chars()
        .filter(|c| !c.is_whitespace() && !is_punctuation(*c))
        .collect::<String>()
        .to_lowercase();

    let mut rest = compact.as_str();
    let mut signalled = false;
    while !rest.is_empty() {
        let closing = longest_prefix(rest, CLOSING_PHRASES.iter().chain(FAREWELL_TOKENS));
        let filler = longest_prefix(rest, FILLER_TOKENS.iter());
        match (closing, filler) {
            (Some(c), Some(f)) if f.len() > c.len() => rest = &rest[f.len()..],
            (Some(c), _) => {
                signalled = true;
                rest = &rest[c.len()..];
            }
            (None, Some(f)) => rest = &rest[f.len()..],
            (None, None) => return false,
        }
    }
    signalled
}

fn longest_prefix<'a>(text: &str, tokens: impl Iterator<Item = &'a &'static str>) -> Option<&'static str> {
    tokens
        .copied()
        .filter(|t| text.starts_with(t))
        .max_by_key(|t| t.len())
}

fn is_punctuation(c: char) -> bool {
    c.is_ascii_punctuation() || "，。！、；：…～·“”‘’（）".contains(c)
}

/// Asks the model which action to take.
pub struct DecisionStage {
    model: StageModel,
    max_iterations: u32,
}

impl DecisionStage {
    pub fn new(provider: Arc<dyn Provider>, settings: &PipelineSettings) -> Self {
        Self {
            model: StageModel {
                stage: STAGE,
                provider,
                model: settings.model.clone(),
                temperature: settings.decision_temperature,
                max_tokens: settings.max_tokens,
                timeout_secs: settings.decision_timeout_secs,
            },
            max_iterations: settings.max_decision_iterations.clamp(1, 3),
        }
    }

    /// Decide how to handle `request`, choosing tools only from `catalog`.
    ///
    /// The model may answer with an unfinished reasoning step; it is then
    /// asked again, at most `max_decision_iterations` times in total.
    /// Running out of rounds is reported as [`PipelineError::UpstreamTimeout`].
    pub async fn decide(
        &self,
        request: &ConsultationRequest,
        catalog: &[ToolDescriptor],
    ) -> Result<Decision, PipelineError> {
        if is_closing_phrase(request.current_question()) {
            info!(stage = STAGE, "Closing remark detected locally");
            return Ok(Decision::Closing);
        }

        let known: Vec<&str> = catalog.iter().map(|d| d.name.as_str()).collect();
        let mut messages = vec![
            Message::system(system_prompt(catalog)),
            Message::user(user_prompt(request)),
        ];

        for iteration in 1..=self.max_iterations {
            let reply = self.model.complete(messages.clone()).await?;
            debug!(stage = STAGE, iteration, reply = %reply, "Decision model replied");

            match parse_decision(&reply, &known) {
                Ok(DecisionReply::Final(decision)) => {
                    info!(stage = STAGE, iteration, decision = %decision, "Decision made");
                    return Ok(decision);
                }
                Ok(DecisionReply::Unfinished) => {
                    messages.push(Message::assistant(reply));
                    messages.push(Message::user(CONTINUE_PROMPT));
                }
                Err(err) => {
                    warn!(stage = STAGE, kind = err.kind(), raw = %reply, "Rejected decision output");
                    return Err(err);
                }
            }
        }

        warn!(
            stage = STAGE,
            iterations = self.max_iterations,
            "Decision model never reached a directive"
        );
        Err(PipelineError::UpstreamTimeout {
            stage: STAGE,
            secs: self.model.timeout_secs,
        })
    }
}

fn system_prompt(catalog: &[ToolDescriptor]) -> String {
    let tools = if catalog.is_empty() {
        "（当前没有可用工具）".to_string()
    } else {
        catalog
            .iter()
            .map(|d| format!("- {}（{}）：{}", d.name, d.title, d.description))
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        "你是一位经验丰富的法律咨询分诊助理，负责判断如何处理用户的法律问题。\n\
         请按以下优先级判断：\n\
         1. 用户表示结束咨询（例如“没有其他问题了”“谢谢”），输出：生成结束语\n\
         2. 问题缺少作出判断所需的基本事实（例如当事人、事情经过、诉求），输出：需要澄清\n\
         3. 回答需要查证具体法条、判例或其他外部信息时，选择1至2个最相关的工具，输出：使用工具回答: 工具名, 工具名\n\
         4. 其他情况，输出：无需工具直接回答\n\n\
         可用工具：\n{tools}\n\n\
         你的整个回复只能是以下四种标准指令之一，不要包含任何解释或思考过程：\n\
         需要澄清\n\
         无需工具直接回答\n\
         使用工具回答: 工具名\n\
         生成结束语"
    )
}

fn user_prompt(request: &ConsultationRequest) -> String {
    format!(
        "用户当前提问：\"{}\"\n对话历史：\n{}",
        request.current_question(),
        request.transcript()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::test_helpers::{standard_registry, SequentialMockProvider};
    use zhifa_core::consultation::Turn;

    fn catalog() -> Vec<ToolDescriptor> {
        standard_registry().0.descriptors()
    }

    fn stage(provider: Arc<SequentialMockProvider>) -> DecisionStage {
        DecisionStage::new(provider, &PipelineSettings::default())
    }

    fn request(question: &str) -> ConsultationRequest {
        ConsultationRequest::new(question, vec![]).unwrap()
    }

    #[test]
    fn closing_phrases() {
        assert!(is_closing_phrase("谢谢，没有其他问题了"));
        assert!(is_closing_phrase("好的，谢谢律师！"));
        assert!(is_closing_phrase("嗯嗯 好的"));
        assert!(is_closing_phrase("OK 谢谢"));
        assert!(is_closing_phrase("就问这些吧"));
        assert!(is_closing_phrase("没有问题了，再见"));
    }

    #[test]
    fn questions_are_not_closing() {
        assert!(!is_closing_phrase("谢谢，那离婚后孩子归谁？"));
        assert!(!is_closing_phrase("没有其他问题了吗?"));
        assert!(!is_closing_phrase("好的，那我明天去法院起诉"));
        assert!(!is_closing_phrase("我想离婚"));
        assert!(!is_closing_phrase("。。。"));
        assert!(!is_closing_phrase("你好"));
        assert!(!is_closing_phrase("您好，律师"));
        assert!(!is_closing_phrase("嗯"));
    }

    #[test]
    fn quoted_closing_phrase_inside_a_question_is_not_closing() {
        assert!(!is_closing_phrase("对方当时说没有问题了结果又反悔不付钱我该怎么起诉"));
        assert!(!is_closing_phrase("谢谢，他说没有其他问题，但后来又追加了违约金"));
    }

    #[tokio::test]
    async fn greeting_reaches_the_model() {
        let provider = Arc::new(SequentialMockProvider::single_text("需要澄清"));
        let decision = stage(provider.clone())
            .decide(&request("你好"), &catalog())
            .await
            .unwrap();
        assert_eq!(decision, Decision::Clarify);
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn closing_skips_the_model() {
        let provider = Arc::new(SequentialMockProvider::new(vec![]));
        let decision = stage(provider.clone())
            .decide(&request("谢谢，没有其他问题了"), &catalog())
            .await
            .unwrap();
        assert_eq!(decision, Decision::Closing);
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn clarify_for_vague_question() {
        let provider = Arc::new(SequentialMockProvider::single_text("需要澄清"));
        let decision = stage(provider.clone())
            .decide(&request("我想离婚"), &catalog())
            .await
            .unwrap();
        assert_eq!(decision, Decision::Clarify);

        let prompt = provider.prompt(0);
        assert!(prompt.contains("我想离婚"));
        assert!(prompt.contains("无历史对话"));
        assert!(prompt.contains("LAS（"));
        assert!(prompt.contains("SCM（"));
    }

    #[tokio::test]
    async fn tools_decision_is_parsed() {
        let provider = Arc::new(SequentialMockProvider::single_text("'使用工具回答: LAS, SCM'"));
        let decision = stage(provider)
            .decide(&request("盗窃罪的量刑标准是什么？与相关判例对比"), &catalog())
            .await
            .unwrap();
        assert_eq!(
            decision,
            Decision::AnswerWithTools {
                tool_names: vec!["LAS".into(), "SCM".into()]
            }
        );
    }

    #[tokio::test]
    async fn uses_decision_temperature_and_history() {
        let provider = Arc::new(SequentialMockProvider::single_text("无需工具直接回答"));
        let req = ConsultationRequest::new(
            "那彩礼要退吗？",
            vec![Turn::user("我们订婚后分手了"), Turn::assistant("请问是否已办理结婚登记？")],
        )
        .unwrap();
        stage(provider.clone()).decide(&req, &catalog()).await.unwrap();

        let sent = &provider.requests()[0];
        assert_eq!(sent.temperature, 0.0);
        assert!(provider.prompt(0).contains("用户：我们订婚后分手了"));
    }

    #[tokio::test]
    async fn unfinished_reasoning_asks_again() {
        let provider = Arc::new(SequentialMockProvider::texts(&[
            "Thought: 用户的问题涉及具体罪名，需要进一步考虑",
            "无需工具直接回答",
        ]));
        let decision = stage(provider.clone())
            .decide(&request("正当防卫的条件是什么"), &catalog())
            .await
            .unwrap();
        assert_eq!(decision, Decision::AnswerDirect);
        assert_eq!(provider.call_count(), 2);
        assert_eq!(provider.requests()[1].messages.len(), 4);
    }

    #[tokio::test]
    async fn exhausting_iterations_is_a_timeout() {
        let provider = Arc::new(SequentialMockProvider::texts(&["Thought: 一", "Thought: 二", "思考：三"]));
        let err = stage(provider.clone())
            .decide(&request("合同违约怎么办"), &catalog())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::UpstreamTimeout { stage: "decision", .. }));
        assert_eq!(provider.call_count(), 3);
    }

    #[tokio::test]
    async fn iteration_cap_holds_for_hand_built_settings() {
        let provider = Arc::new(SequentialMockProvider::texts(&["Thought: 一", "Thought: 二", "Thought: 三"]));
        let settings = PipelineSettings {
            max_decision_iterations: 10,
            ..PipelineSettings::default()
        };
        let err = DecisionStage::new(provider.clone(), &settings)
            .decide(&request("合同违约怎么办"), &catalog())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::UpstreamTimeout { stage: "decision", .. }));
        assert_eq!(provider.call_count(), 3);
    }

    #[tokio::test]
    async fn free_text_is_malformed() {
        let provider = Arc::new(SequentialMockProvider::single_text("我认为应该先查法条再回答"));
        let err = stage(provider)
            .decide(&request("盗窃罪怎么判"), &catalog())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::MalformedDecision { .. }));
    }

    #[tokio::test]
    async fn unknown_tool_is_rejected() {
        let provider = Arc::new(SequentialMockProvider::single_text("使用工具回答: XYZ"));
        let err = stage(provider)
            .decide(&request("盗窃罪怎么判"), &catalog())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidToolReference { ref name } if name == "XYZ"));
    }
}
