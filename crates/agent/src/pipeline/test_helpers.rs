//! Shared test helpers for pipeline tests.

use std::sync::{Arc, Mutex};
use std::time::Duration;
use zhifa_core::error::{ProviderError, ToolError};
use zhifa_core::message::Message;
use zhifa_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use zhifa_core::tool::{tagged, Tool, ToolRegistry, ToolStatus};

/// A mock provider that returns a sequence of scripted responses.
///
/// Each call to `complete` returns the next response in the queue and
/// records the request. Panics if more calls are made than responses provided.
pub struct SequentialMockProvider {
    responses: Mutex<Vec<ProviderResponse>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl SequentialMockProvider {
    pub fn new(responses: Vec<ProviderResponse>) -> Self {
        Self {
            responses: Mutex::new(responses),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn single_text(text: &str) -> Self {
        Self::new(vec![make_text_response(text)])
    }

    pub fn texts(texts: &[&str]) -> Self {
        Self::new(texts.iter().map(|t| make_text_response(t)).collect())
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// All message contents of the `n`-th request, joined.
    pub fn prompt(&self, n: usize) -> String {
        self.requests.lock().unwrap()[n]
            .messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[async_trait::async_trait]
impl Provider for SequentialMockProvider {
    fn name(&self) -> &str {
        "sequential_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let mut requests = self.requests.lock().unwrap();
        let responses = self.responses.lock().unwrap();
        let count = requests.len();

        if count >= responses.len() {
            panic!(
                "SequentialMockProvider: no more responses (call #{}, have {})",
                count,
                responses.len()
            );
        }

        requests.push(request);
        Ok(responses[count].clone())
    }
}

/// Create a simple text response.
pub fn make_text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant(text),
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "mock-model".into(),
    }
}

/// A provider that always fails with the given error.
pub struct FailingProvider {
    error: ProviderError,
}

impl FailingProvider {
    pub fn new(error: ProviderError) -> Self {
        Self { error }
    }
}

#[async_trait::async_trait]
impl Provider for FailingProvider {
    fn name(&self) -> &str {
        "failing_mock"
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        Err(self.error.clone())
    }
}

/// Answers the first call with a fixed text and fails every later one.
pub struct FailingAfterFirst {
    first: String,
    calls: Mutex<usize>,
}

impl FailingAfterFirst {
    pub fn new(first: &str) -> Self {
        Self {
            first: first.to_string(),
            calls: Mutex::new(0),
        }
    }
}

#[async_trait::async_trait]
impl Provider for FailingAfterFirst {
    fn name(&self) -> &str {
        "failing_after_first"
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let mut calls = self.calls.lock().unwrap();
        *calls += 1;
        if *calls == 1 {
            Ok(make_text_response(&self.first))
        } else {
            Err(ProviderError::ApiError {
                status_code: 500,
                message: "internal error".into(),
            })
        }
    }
}

/// A provider that answers only after a delay.
pub struct SlowProvider {
    delay: Duration,
}

impl SlowProvider {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait::async_trait]
impl Provider for SlowProvider {
    fn name(&self) -> &str {
        "slow_mock"
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        tokio::time::sleep(self.delay).await;
        Ok(make_text_response("太慢了"))
    }
}

/// What a [`RecordingTool`] does when invoked.
#[derive(Clone)]
pub enum ToolBehavior {
    /// Return the payload tagged with the status.
    Reply(ToolStatus, String),
    /// Return this text verbatim (possibly untagged).
    Raw(String),
    /// Fail without producing output.
    Fail(String),
    /// Never answer within any reasonable timeout.
    Hang,
}

/// A mock tool that records every query it receives.
pub struct RecordingTool {
    name: String,
    behavior: ToolBehavior,
    queries: Arc<Mutex<Vec<String>>>,
}

impl RecordingTool {
    pub fn new(name: &str, behavior: ToolBehavior) -> Self {
        Self {
            name: name.to_string(),
            behavior,
            queries: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn success(name: &str, payload: &str) -> Self {
        Self::new(name, ToolBehavior::Reply(ToolStatus::Success, payload.to_string()))
    }

    /// Shared handle to the recorded queries, usable after the tool is boxed.
    pub fn queries(&self) -> Arc<Mutex<Vec<String>>> {
        self.queries.clone()
    }
}

#[async_trait::async_trait]
impl Tool for RecordingTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn title(&self) -> &str {
        "测试工具"
    }

    fn description(&self) -> &str {
        "用于测试的工具"
    }

    async fn invoke(&self, query: &str) -> Result<String, ToolError> {
        self.queries.lock().unwrap().push(query.to_string());
        match &self.behavior {
            ToolBehavior::Reply(status, payload) => Ok(tagged(&self.name, *status, payload)),
            ToolBehavior::Raw(text) => Ok(text.clone()),
            ToolBehavior::Fail(reason) => Err(ToolError::ExecutionFailed {
                tool_name: self.name.clone(),
                reason: reason.clone(),
            }),
            ToolBehavior::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(tagged(&self.name, ToolStatus::Success, "迟到的结果"))
            }
        }
    }
}

/// Recorded queries per tool name.
pub type QueryLog = Vec<(String, Arc<Mutex<Vec<String>>>)>;

/// Build a registry from recording tools, keeping handles to their query logs.
pub fn registry(tools: Vec<RecordingTool>) -> (Arc<ToolRegistry>, QueryLog) {
    let mut registry = ToolRegistry::new();
    let mut log = Vec::new();
    for tool in tools {
        log.push((tool.name.clone(), tool.queries()));
        registry.register(Box::new(tool));
    }
    (Arc::new(registry), log)
}

/// Queries received by `name`.
pub fn queries_of(log: &QueryLog, name: &str) -> Vec<String> {
    log.iter()
        .find(|(n, _)| n == name)
        .map(|(_, q)| q.lock().unwrap().clone())
        .unwrap_or_default()
}

/// Registry with a success tool for every standard id.
pub fn standard_registry() -> (Arc<ToolRegistry>, QueryLog) {
    registry(
        ["LAS", "LCP", "LED", "LER", "LTS", "SCM", "WEB"]
            .into_iter()
            .map(|name| RecordingTool::success(name, &format!("{name}的检索结果")))
            .collect(),
    )
}
