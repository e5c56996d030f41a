//! Tool trait: the abstraction over retrieval and analysis capabilities.
//!
//! A tool takes a plain-text query and answers with a status-tagged
//! payload:
//!
//! ```text
//! <LAS status='success'>法条片段1(来源:刑法.txt): ...</LAS>
//! ```
//!
//! The pipeline only reads the `status` attribute and the payload between
//! the tags; everything else about a tool is its own business.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use crate::error::ToolError;

/// Outcome reported by a tool inside its tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolStatus {
    Success,
    NotFound,
    Error,
}

impl ToolStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolStatus::Success => "success",
            ToolStatus::NotFound => "not_found",
            ToolStatus::Error => "error",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "success" => Some(ToolStatus::Success),
            "not_found" => Some(ToolStatus::NotFound),
            "error" => Some(ToolStatus::Error),
            _ => None,
        }
    }
}

impl fmt::Display for ToolStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The result of one tool invocation. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolObservation {
    pub tool_name: String,
    pub status: ToolStatus,
    pub payload: String,
}

impl ToolObservation {
    pub fn new(tool_name: impl Into<String>, status: ToolStatus, payload: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
            status,
            payload: payload.into(),
        }
    }

    /// An `error` observation carrying a diagnostic reason.
    pub fn error(tool_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::new(tool_name, ToolStatus::Error, reason)
    }

    /// Parse the tagged text returned by a tool.
    ///
    /// Accepts single or double quotes around the status value and ignores
    /// any attribute other than `status`. A missing closing tag is tolerated;
    /// a missing opening tag or an unknown status is not.
    pub fn parse(tool_name: &str, raw: &str) -> Result<Self, ToolError> {
        let malformed = |reason: &str| ToolError::MalformedOutput {
            tool_name: tool_name.to_string(),
            reason: reason.to_string(),
        };

        let text = raw.trim();
        let rest = text.strip_prefix('<').ok_or_else(|| malformed("missing opening tag"))?;
        let head_end = rest.find('>').ok_or_else(|| malformed("unterminated opening tag"))?;
        let head = &rest[..head_end];
        let body = &rest[head_end + 1..];

        let tag = head
            .split_whitespace()
            .next()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| malformed("empty tag name"))?;

        let status = head
            .find("status")
            .map(|i| &head[i + "status".len()..])
            .and_then(|after| after.trim_start().strip_prefix('='))
            .map(|v| v.trim().trim_matches(|c| c == '\'' || c == '"'))
            .and_then(ToolStatus::parse)
            .ok_or_else(|| malformed("missing or unknown status attribute"))?;

        let closing = format!("</{tag}>");
        let payload = match body.rfind(&closing) {
            Some(end) => &body[..end],
            None => body,
        };

        Ok(Self::new(tool_name, status, payload.trim()))
    }
}

/// Wrap a payload in the tool tag format understood by [`ToolObservation::parse`].
pub fn tagged(tool_name: &str, status: ToolStatus, payload: &str) -> String {
    format!("<{tool_name} status='{status}'>{payload}</{tool_name}>")
}

/// Catalog entry describing a tool to the decision model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Registry key (e.g., "LAS")
    pub name: String,
    /// Human-readable title (e.g., "法条检索")
    pub title: String,
    /// When the tool should be chosen
    pub description: String,
}

/// The core Tool trait.
///
/// Each tool (case search, statute search, charge prediction, web search,
/// ...) implements this trait and is registered in the [`ToolRegistry`].
#[async_trait]
pub trait Tool: Send + Sync {
    /// The registry key of this tool (e.g., "SCM", "LAS").
    fn name(&self) -> &str;

    /// A short human-readable title.
    fn title(&self) -> &str;

    /// When to use this tool (shown to the decision model).
    fn description(&self) -> &str;

    /// Run the tool and return its tagged output.
    ///
    /// Tools report expected failures through the `error` status in their
    /// tag. An `Err` means the tool could not produce tagged output at all.
    async fn invoke(&self, query: &str) -> std::result::Result<String, ToolError>;

    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: self.name().to_string(),
            title: self.title().to_string(),
            description: self.description().to_string(),
        }
    }
}

/// A registry of available tools, keyed by name in sorted order.
pub struct ToolRegistry {
    tools: BTreeMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: BTreeMap::new(),
        }
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        let name = tool.name().to_string();
        self.tools.insert(name, tool);
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Descriptors of every tool, in name order.
    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.tools.values().map(|t| t.descriptor()).collect()
    }

    /// Invoke a tool by name.
    pub async fn invoke(&self, name: &str, query: &str) -> std::result::Result<String, ToolError> {
        let tool = self.tools.get(name).ok_or_else(|| ToolError::NotFound(name.to_string()))?;
        tool.invoke(query).await
    }

    /// List all registered tool names, in order.
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
