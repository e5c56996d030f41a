//! Tool dispatch stage: run the tools a decision names, nothing more.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use zhifa_core::consultation::{ConsultationRequest, StageOutput};
use zhifa_core::decision::Decision;
use zhifa_core::error::{PipelineError, ToolError};
use zhifa_core::tool::{ToolObservation, ToolRegistry, ToolStatus};

use super::PipelineSettings;

/// Questions shorter than this (in characters) are treated as follow-ups
/// and get the previous user turn attached as context.
pub const SHORT_FOLLOW_UP_CHARS: usize = 30;

/// The query handed to every tool for this request.
///
/// Normally the current question. A short follow-up ("那要判几年？") is
/// narrowed with the immediately preceding user turn.
pub fn tool_query(request: &ConsultationRequest) -> String {
    let question = request.current_question();
    match request.last_user_turn() {
        Some(previous) if question.chars().count() < SHORT_FOLLOW_UP_CHARS => {
            format!("{question}（背景：{previous}）")
        }
        _ => question.to_string(),
    }
}

pub struct DispatchStage {
    tools: Arc<ToolRegistry>,
    tool_timeout_secs: u64,
}

impl DispatchStage {
    pub fn new(tools: Arc<ToolRegistry>, settings: &PipelineSettings) -> Self {
        Self {
            tools,
            tool_timeout_secs: settings.tool_timeout_secs,
        }
    }

    /// Pass non-tool decisions through; otherwise invoke each named tool in
    /// order and collect one observation per tool.
    ///
    /// Every name is checked against the registry before the first call.
    /// A failing tool becomes an `error` observation and never stops the
    /// others.
    pub async fn dispatch(
        &self,
        decision: &Decision,
        request: &ConsultationRequest,
    ) -> Result<StageOutput, PipelineError> {
        let Decision::AnswerWithTools { tool_names } = decision else {
            return Ok(StageOutput::Passthrough(decision.clone()));
        };

        decision.validate(&self.tools.names())?;

        let query = tool_query(request);
        let mut observations = Vec::with_capacity(tool_names.len());
        for name in tool_names {
            observations.push(self.invoke(name, &query).await);
        }
        Ok(StageOutput::Observations(observations))
    }

    async fn invoke(&self, name: &str, query: &str) -> ToolObservation {
        let started = Instant::now();
        let outcome = tokio::time::timeout(
            Duration::from_secs(self.tool_timeout_secs),
            self.tools.invoke(name, query),
        )
        .await;

        let observation = match outcome {
            Err(_) => ToolObservation::error(
                name,
                ToolError::Timeout {
                    tool_name: name.to_string(),
                    timeout_secs: self.tool_timeout_secs,
                }
                .to_string(),
            ),
            Ok(Err(e)) => ToolObservation::error(name, e.to_string()),
            Ok(Ok(raw)) => {
                ToolObservation::parse(name, &raw).unwrap_or_else(|e| ToolObservation::error(name, e.to_string()))
            }
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        if observation.status == ToolStatus::Error {
            warn!(tool = %name, elapsed_ms, reason = %observation.payload, "Tool invocation failed");
        } else {
            info!(tool = %name, status = %observation.status, elapsed_ms, "Tool invoked");
        }
        observation
    }
}
