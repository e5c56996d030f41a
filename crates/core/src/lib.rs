//! # Zhifa Core
//!
//! Domain types, traits, and error definitions for the Zhifa legal
//! consultation assistant. No framework dependencies live here: this crate
//! defines the model that every other crate implements against.
//!
//! ## Layout
//!
//! - [`consultation`]: requests, stage outputs and the final reply
//! - [`decision`]: the closed decision vocabulary and its parser
//! - [`tool`]: the `Tool` trait, tagged observations, the registry
//! - [`provider`]: the `Provider` trait over chat and embedding backends
//! - [`error`]: one error enum per bounded context

pub mod consultation;
pub mod decision;
pub mod error;
pub mod message;
pub mod provider;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use consultation::{ConsultationRequest, FinalReply, Speaker, StageOutput, Turn};
pub use decision::{parse_decision, Decision, DecisionReply};
pub use error::{KnowledgeError, PipelineError, ProviderError, ToolError};
pub use message::{Message, Role};
pub use provider::{EmbeddingRequest, EmbeddingResponse, Provider, ProviderRequest, ProviderResponse, Usage};
pub use tool::{tagged, Tool, ToolDescriptor, ToolObservation, ToolRegistry, ToolStatus};
