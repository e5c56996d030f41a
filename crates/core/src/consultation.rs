//! Consultation value objects that flow through the pipeline:
//! caller → [`ConsultationRequest`] → stages → [`FinalReply`].

use serde::{Deserialize, Serialize};
use crate::decision::Decision;
use crate::error::PipelineError;
use crate::tool::ToolObservation;

/// Who said a turn of the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    User,
    Assistant,
}

impl Speaker {
    pub fn label(&self) -> &'static str {
        match self {
            Speaker::User => "用户",
            Speaker::Assistant => "助手",
        }
    }
}

/// One prior turn of the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub speaker: Speaker,
    pub text: String,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self { speaker: Speaker::User, text: text.into() }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self { speaker: Speaker::Assistant, text: text.into() }
    }
}

const USER_LEAD_INS: &[&str] = &["用户：", "用户:", "User:", "user:"];
const ASSISTANT_LEAD_INS: &[&str] = &["助手：", "助手:", "Assistant:", "assistant:"];

/// A single consultation: the current question plus the conversation so far.
///
/// Immutable once built; the question is guaranteed non-blank.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsultationRequest {
    current_question: String,
    history: Vec<Turn>,
}

impl ConsultationRequest {
    pub fn new(current_question: impl Into<String>, history: Vec<Turn>) -> Result<Self, PipelineError> {
        let current_question = current_question.into().trim().to_string();
        if current_question.is_empty() {
            return Err(PipelineError::EmptyQuestion);
        }
        Ok(Self { current_question, history })
    }

    /// Build a request from plain history strings.
    ///
    /// A string may start with a speaker lead-in (`用户：`, `助手：`,
    /// `User:`, `Assistant:`); strings without one alternate speakers,
    /// starting with the user. Blank strings are skipped.
    pub fn from_strings(current_question: &str, history: &[String]) -> Result<Self, PipelineError> {
        let mut turns = Vec::with_capacity(history.len());
        let mut next = Speaker::User;

        for entry in history {
            let entry = entry.trim();
            if entry.is_empty() {
                continue;
            }
            let (speaker, text) = split_lead_in(entry).unwrap_or((next, entry));
            let text = text.trim();
            if text.is_empty() {
                continue;
            }
            turns.push(Turn { speaker, text: text.to_string() });
            next = match speaker {
                Speaker::User => Speaker::Assistant,
                Speaker::Assistant => Speaker::User,
            };
        }

        Self::new(current_question, turns)
    }

    pub fn current_question(&self) -> &str {
        &self.current_question
    }

    pub fn history(&self) -> &[Turn] {
        &self.history
    }

    /// The most recent earlier user turn, if any.
    pub fn last_user_turn(&self) -> Option<&str> {
        self.history
            .iter()
            .rev()
            .find(|t| t.speaker == Speaker::User)
            .map(|t| t.text.as_str())
    }

    /// History rendered one turn per line, or `无历史对话` when empty.
    pub fn transcript(&self) -> String {
        if self.history.is_empty() {
            return "无历史对话".to_string();
        }
        self.history
            .iter()
            .map(|t| format!("{}：{}", t.speaker.label(), t.text))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn split_lead_in(entry: &str) -> Option<(Speaker, &str)> {
    for lead in USER_LEAD_INS {
        if let Some(rest) = entry.strip_prefix(lead) {
            return Some((Speaker::User, rest));
        }
    }
    for lead in ASSISTANT_LEAD_INS {
        if let Some(rest) = entry.strip_prefix(lead) {
            return Some((Speaker::Assistant, rest));
        }
    }
    None
}

/// What the dispatch stage hands to synthesis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutput {
    /// Clarify, AnswerDirect or Closing, unchanged.
    Passthrough(Decision),
    /// One observation per invoked tool, in invocation order.
    Observations(Vec<ToolObservation>),
}

/// The sanitized text returned to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalReply {
    pub text: String,
}

impl FinalReply {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}
