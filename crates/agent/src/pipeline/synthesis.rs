//! Synthesis stage: turn a passthrough decision or a set of tool
//! observations into the text the user will read.
//!
//! Evidence is presented to the model by topic ("相关法条", "相似案例"),
//! never by tool id, and failed tools are left out entirely.

use std::sync::Arc;
use tracing::{debug, warn};
use zhifa_core::consultation::{ConsultationRequest, StageOutput};
use zhifa_core::decision::Decision;
use zhifa_core::error::PipelineError;
use zhifa_core::message::Message;
use zhifa_core::provider::Provider;
use zhifa_core::tool::{ToolObservation, ToolStatus};

use super::llm::StageModel;
use super::PipelineSettings;

const STAGE: &str = "synthesis";

/// Returned when the model produces no text at all.
pub const EMPTY_SYNTHESIS_FALLBACK: &str = "请提供更多细节，以便我更好地为您解答。";

const SYSTEM_PROMPT: &str = "你是一位专业、严谨、耐心的中国法律咨询助手。\
你的回复会直接展示给用户：使用通俗易懂的中文，不要提及任何内部处理流程、工具名称或检索过程，也不要输出任何标签或标记。";

/// The topic a tool's evidence is presented under.
pub fn topic_label(tool_name: &str) -> &'static str {
    match tool_name {
        "LAS" => "相关法条",
        "SCM" => "相似案例",
        "LCP" => "可能涉及的罪名",
        "LER" => "法律要素分析",
        "LED" => "涉及的法律事件",
        "LTS" => "案情摘要",
        "WEB" => "网络公开资料",
        _ => "参考资料",
    }
}

pub struct SynthesisStage {
    model: StageModel,
}

impl SynthesisStage {
    pub fn new(provider: Arc<dyn Provider>, settings: &PipelineSettings) -> Self {
        Self {
            model: StageModel {
                stage: STAGE,
                provider,
                model: settings.model.clone(),
                temperature: settings.temperature,
                max_tokens: settings.max_tokens,
                timeout_secs: settings.synthesis_timeout_secs,
            },
        }
    }

    /// Generate the raw (unsanitized) reply.
    pub async fn synthesize(
        &self,
        output: &StageOutput,
        request: &ConsultationRequest,
    ) -> Result<String, PipelineError> {
        let prompt = build_prompt(output, request);
        let text = self
            .model
            .complete(vec![Message::system(SYSTEM_PROMPT), Message::user(prompt)])
            .await?;

        if text.is_empty() {
            warn!(stage = STAGE, "Model returned an empty reply, using fallback");
            return Ok(EMPTY_SYNTHESIS_FALLBACK.to_string());
        }
        debug!(stage = STAGE, chars = text.chars().count(), "Reply synthesized");
        Ok(text)
    }
}

pub(crate) fn build_prompt(output: &StageOutput, request: &ConsultationRequest) -> String {
    let task = match output {
        StageOutput::Passthrough(Decision::Clarify) => {
            "用户的问题缺少作出法律分析所需的关键事实。请只提出一个简洁、友好的问题，\
             引导用户补充最关键的缺失信息（例如当事人之间的关系、事情经过、时间或希望达到的目标）。\
             不要给出法律结论。"
                .to_string()
        }
        StageOutput::Passthrough(Decision::Closing) => {
            "用户表示本次咨询已经结束。请用一两句话礼貌地结束对话，并告诉用户以后如有需要可以随时再来咨询。"
                .to_string()
        }
        StageOutput::Passthrough(_) => {
            "请基于你的法律知识和对话上下文，直接给出清晰、完整、易懂的初步法律分析和建议。".to_string()
        }
        StageOutput::Observations(observations) => evidence_task(observations),
    };

    format!(
        "用户当前提问：\"{}\"\n对话历史：\n{}\n\n{}",
        request.current_question(),
        request.transcript(),
        task
    )
}

fn evidence_task(observations: &[ToolObservation]) -> String {
    let mut evidence = Vec::new();
    let mut missing = Vec::new();

    for observation in observations {
        let label = topic_label(&observation.tool_name);
        match observation.status {
            ToolStatus::Success => evidence.push(format!("【{label}】\n{}", observation.payload)),
            ToolStatus::NotFound => missing.push(label),
            ToolStatus::Error => {
                warn!(
                    stage = STAGE,
                    tool = %observation.tool_name,
                    reason = %observation.payload,
                    "Leaving failed tool result out of the reply"
                );
            }
        }
    }

    let mut task = if evidence.is_empty() {
        "没有获得可用的参考资料。请基于一般法律知识回答用户的问题，给出清晰的法律分析和建议。".to_string()
    } else {
        format!(
            "请结合以下参考资料和你的法律知识，给出流畅、完整的回答。可以引用具体的法条或案例，\
             但不要提及资料是如何获得的。\n\n参考资料：\n{}",
            evidence.join("\n\n")
        )
    };

    if !missing.is_empty() {
        task.push_str(&format!(
            "\n\n以下方面没有找到可靠依据，请结合一般法律知识作答：{}。",
            missing.join("、")
        ));
    }
    task
}
