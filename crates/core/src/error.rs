//! Error types for the Zhifa domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum.

use thiserror::Error;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError {
        status_code: u16,
        message: String,
    },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Clone, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Tool timed out: {tool_name} after {timeout_secs}s")]
    Timeout { tool_name: String, timeout_secs: u64 },

    #[error("Malformed tool output from {tool_name}: {reason}")]
    MalformedOutput { tool_name: String, reason: String },
}

#[derive(Debug, Clone, Error)]
pub enum KnowledgeError {
    #[error("Vector store unavailable at {path}: {reason}")]
    StoreUnavailable { path: String, reason: String },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Embedding generation failed: {0}")]
    EmbeddingFailed(String),

    #[error("Failed to load document {path}: {reason}")]
    LoadFailed { path: String, reason: String },
}

/// Failures of one consultation pipeline run.
///
/// Everything except `EmptyQuestion` is caught at the orchestrator boundary
/// and turned into a single polite message for the user.
#[derive(Debug, Clone, Error)]
pub enum PipelineError {
    #[error("Consultation question is empty")]
    EmptyQuestion,

    #[error("Decision output outside the fixed vocabulary: {raw:?}")]
    MalformedDecision { raw: String },

    #[error("Decision referenced unknown tool: {name}")]
    InvalidToolReference { name: String },

    #[error("{stage} stage timed out after {secs}s")]
    UpstreamTimeout { stage: &'static str, secs: u64 },

    #[error("{stage} stage model call failed: {source}")]
    Provider {
        stage: &'static str,
        #[source]
        source: ProviderError,
    },
}

impl PipelineError {
    /// Short machine-friendly label used in structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::EmptyQuestion => "empty_question",
            PipelineError::MalformedDecision { .. } => "malformed_decision",
            PipelineError::InvalidToolReference { .. } => "invalid_tool_reference",
            PipelineError::UpstreamTimeout { .. } => "upstream_timeout",
            PipelineError::Provider { .. } => "provider",
        }
    }
}
