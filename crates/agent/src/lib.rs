//! The consultation pipeline: the heart of Zhifa.
//!
//! Every request runs the same four stages, strictly in order:
//!
//! 1. **Decide** what to do with the question (clarify, answer directly,
//!    answer with tools, or close the conversation)
//! 2. **Dispatch** the chosen tools, if any
//! 3. **Synthesize** the user-facing answer from the decision or the tool
//!    observations
//! 4. **Sanitize** the answer so no internal phrasing reaches the user
//!
//! There are no back-edges and no retries; a failing stage ends the request
//! with a single polite apology.

pub mod pipeline;

pub use pipeline::{
    is_closing_phrase, tool_query, ConsultationPipeline, ConsultationResult, DecisionStage,
    DispatchStage, PipelineSettings, Sanitizer, SynthesisStage, APOLOGY, EMPTY_SYNTHESIS_FALLBACK,
};
