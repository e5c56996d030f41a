//! The orchestrator: one deterministic pass per consultation.
//!
//! ```text
//! ConsultationRequest
//!       │
//!       ▼
//! ┌──────────┐   ┌──────────┐   ┌───────────┐   ┌───────────┐
//! │ Decision │ → │ Dispatch │ → │ Synthesis │ → │ Sanitizer │ → FinalReply
//! └──────────┘   └────┬─────┘   └───────────┘   └───────────┘
//!                     │ 0-2 tools
//!                     ▼
//!               ToolRegistry
//! ```
//!
//! Stage errors stop the pass and are turned into one apology at this
//! boundary; the cause only goes to the log.

use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn, Instrument};
use uuid::Uuid;
use zhifa_core::consultation::{ConsultationRequest, FinalReply, StageOutput};
use zhifa_core::decision::Decision;
use zhifa_core::error::PipelineError;
use zhifa_core::provider::Provider;
use zhifa_core::tool::{ToolObservation, ToolRegistry};

use super::decision::DecisionStage;
use super::dispatch::DispatchStage;
use super::sanitizer::Sanitizer;
use super::synthesis::SynthesisStage;
use super::PipelineSettings;

/// What the user sees when any stage fails.
pub const APOLOGY: &str = "抱歉，处理您的请求时遇到了问题，请稍后再试。";

/// Detailed outcome of one consultation.
#[derive(Debug, Clone, Serialize)]
pub struct ConsultationResult {
    pub reply: FinalReply,
    /// The action taken; `None` when the decision stage itself failed.
    pub decision: Option<Decision>,
    /// Observations in invocation order (empty unless tools ran).
    pub observations: Vec<ToolObservation>,
    /// Whether `reply` is the generic apology.
    pub failed: bool,
}

pub struct ConsultationPipeline {
    tools: Arc<ToolRegistry>,
    decision: DecisionStage,
    dispatch: DispatchStage,
    synthesis: SynthesisStage,
    sanitizer: Sanitizer,
}

impl ConsultationPipeline {
    pub fn new(provider: Arc<dyn Provider>, tools: Arc<ToolRegistry>, settings: PipelineSettings) -> Self {
        Self {
            decision: DecisionStage::new(provider.clone(), &settings),
            dispatch: DispatchStage::new(tools.clone(), &settings),
            synthesis: SynthesisStage::new(provider, &settings),
            sanitizer: Sanitizer::new(tools.names()),
            tools,
        }
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Run the pipeline, surfacing stage errors.
    pub async fn try_run(&self, request: &ConsultationRequest) -> Result<ConsultationResult, PipelineError> {
        let mut partial = Partial::default();
        self.run_stages(request, &mut partial).await
    }

    /// Run the pipeline; a failing stage yields the apology instead of an error.
    pub async fn process(&self, request: &ConsultationRequest) -> ConsultationResult {
        let request_id = Uuid::new_v4();
        let span = tracing::info_span!("consultation", %request_id);

        async {
            let started = Instant::now();
            let mut partial = Partial::default();
            match self.run_stages(request, &mut partial).await {
                Ok(result) => {
                    info!(
                        decision = ?result.decision.as_ref().map(|d| d.directive()),
                        tools = result.observations.len(),
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Consultation answered"
                    );
                    result
                }
                Err(err) => {
                    warn!(
                        kind = err.kind(),
                        error = %err,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Consultation failed"
                    );
                    ConsultationResult {
                        reply: FinalReply::new(APOLOGY),
                        decision: partial.decision,
                        observations: partial.observations,
                        failed: true,
                    }
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Answer `question` given plain history strings.
    ///
    /// Only a blank question is an error; everything else ends in a reply.
    pub async fn handle(&self, question: &str, history: &[String]) -> Result<String, PipelineError> {
        let request = ConsultationRequest::from_strings(question, history)?;
        Ok(self.process(&request).await.reply.text)
    }

    async fn run_stages(
        &self,
        request: &ConsultationRequest,
        partial: &mut Partial,
    ) -> Result<ConsultationResult, PipelineError> {
        let decision = self.decision.decide(request, &self.tools.descriptors()).await?;
        partial.decision = Some(decision.clone());

        let output = self.dispatch.dispatch(&decision, request).await?;
        if let StageOutput::Observations(observations) = &output {
            partial.observations = observations.clone();
        }

        let raw = self.synthesis.synthesize(&output, request).await?;
        let reply = self.sanitizer.sanitize(&raw);

        Ok(ConsultationResult {
            reply,
            decision: Some(decision),
            observations: std::mem::take(&mut partial.observations),
            failed: false,
        })
    }
}

/// What earlier stages produced, kept for the failure report.
#[derive(Default)]
struct Partial {
    decision: Option<Decision>,
    observations: Vec<ToolObservation>,
}
