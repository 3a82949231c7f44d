//! Shared test helpers: a scripted provider and a handful of stub tools.

use async_trait::async_trait;
use deckr_core::error::{ProviderError, ToolError};
use deckr_core::message::{ContentBlock, ContinuationToken, Message, Role};
use deckr_core::provider::{ModelRequest, ModelResponse, Provider, Usage};
use deckr_core::thinking::StepCategory;
use deckr_core::tool::{ProgressReporter, Tool, ToolRegistry, ToolResult};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::stream_event::AgentStreamEvent;

/// A mock provider that returns a sequence of scripted responses.
///
/// Each call to `complete` pops the next entry. Once the script is empty the
/// `fallback` response (if any) is returned forever. Every request is kept
/// so tests can inspect what the model was sent.
pub struct ScriptedProvider {
    script: Mutex<VecDeque<Result<ModelResponse, ProviderError>>>,
    fallback: Option<ModelResponse>,
    requests: Mutex<Vec<ModelRequest>>,
    delay: Option<Duration>,
}

impl ScriptedProvider {
    pub fn new(script: Vec<Result<ModelResponse, ProviderError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback: None,
            requests: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    pub fn turns(turns: Vec<Message>) -> Self {
        Self::new(turns.into_iter().map(|m| Ok(response(m))).collect())
    }

    /// Always answer with the same turn.
    pub fn repeating(turn: Message) -> Self {
        let mut provider = Self::new(Vec::new());
        provider.fallback = Some(response(turn));
        provider
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted_mock"
    }

    async fn complete(&self, request: ModelRequest) -> Result<ModelResponse, ProviderError> {
        self.requests.lock().unwrap().push(request);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let next = self.script.lock().unwrap().pop_front();
        match (next, &self.fallback) {
            (Some(entry), _) => entry,
            (None, Some(fallback)) => Ok(fallback.clone()),
            (None, None) => Err(ProviderError::InvalidRequest("script exhausted".into())),
        }
    }
}

pub fn response(message: Message) -> ModelResponse {
    ModelResponse {
        message,
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "mock-model".into(),
    }
}

/// A model turn invoking the given tools, with ids `call_0`, `call_1`, ...
pub fn invoke(calls: &[(&str, serde_json::Value)]) -> Message {
    Message {
        role: Role::Model,
        blocks: calls
            .iter()
            .enumerate()
            .map(|(i, (name, args))| ContentBlock::ToolInvocation {
                id: format!("call_{i}"),
                name: name.to_string(),
                arguments: args.clone(),
                continuation: None,
            })
            .collect(),
    }
}

/// Like [`invoke`] for one tool, carrying a continuation token.
pub fn invoke_with_token(name: &str, args: serde_json::Value, token: &str) -> Message {
    Message {
        role: Role::Model,
        blocks: vec![ContentBlock::ToolInvocation {
            id: "call_0".into(),
            name: name.into(),
            arguments: args,
            continuation: Some(ContinuationToken::new(token)),
        }],
    }
}

pub fn registry_with(tools: Vec<Arc<dyn Tool>>) -> Arc<ToolRegistry> {
    let mut registry = ToolRegistry::new();
    for tool in tools {
        registry.register(tool).unwrap();
    }
    Arc::new(registry)
}

/// Collects every event the loop emits.
pub fn collector() -> (
    Arc<Mutex<Vec<AgentStreamEvent>>>,
    impl Fn(&AgentStreamEvent) + Send + Sync + 'static,
) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    (events, move |e: &AgentStreamEvent| {
        sink.lock().unwrap().push(e.clone())
    })
}

fn object_schema() -> serde_json::Value {
    serde_json::json!({"type": "object", "properties": {}})
}

// ── Stub tools ──

/// Sleeps, reports one progress line, then echoes its name.
pub struct SleepyTool {
    pub name: &'static str,
    pub delay: Duration,
}

#[async_trait]
impl Tool for SleepyTool {
    fn name(&self) -> &str {
        self.name
    }
    fn description(&self) -> &str {
        "Sleeps, then succeeds"
    }
    fn input_schema(&self) -> serde_json::Value {
        object_schema()
    }
    fn category(&self) -> StepCategory {
        StepCategory::Research
    }
    async fn execute(
        &self,
        _arguments: serde_json::Value,
        progress: ProgressReporter,
    ) -> Result<ToolResult, ToolError> {
        progress.report(format!("{} working", self.name));
        tokio::time::sleep(self.delay).await;
        Ok(ToolResult::ok(serde_json::json!({ "tool": self.name })))
    }
}

/// Always fails.
pub struct FailingTool;

#[async_trait]
impl Tool for FailingTool {
    fn name(&self) -> &str {
        "failing_tool"
    }
    fn description(&self) -> &str {
        "Always fails"
    }
    fn input_schema(&self) -> serde_json::Value {
        object_schema()
    }
    async fn execute(
        &self,
        _arguments: serde_json::Value,
        _progress: ProgressReporter,
    ) -> Result<ToolResult, ToolError> {
        Err(ToolError::ExecutionFailed {
            tool_name: "failing_tool".into(),
            reason: "upstream brand service unavailable".into(),
        })
    }
}

/// Panics when executed.
pub struct PanickingTool;

#[async_trait]
impl Tool for PanickingTool {
    fn name(&self) -> &str {
        "panicking_tool"
    }
    fn description(&self) -> &str {
        "Panics"
    }
    fn input_schema(&self) -> serde_json::Value {
        object_schema()
    }
    async fn execute(
        &self,
        _arguments: serde_json::Value,
        _progress: ProgressReporter,
    ) -> Result<ToolResult, ToolError> {
        panic!("renderer crashed");
    }
}

/// Returns an image both as an artifact and under a declared blob field.
pub struct BlobTool;

#[async_trait]
impl Tool for BlobTool {
    fn name(&self) -> &str {
        "blob_tool"
    }
    fn description(&self) -> &str {
        "Produces an image"
    }
    fn input_schema(&self) -> serde_json::Value {
        object_schema()
    }
    fn blob_fields(&self) -> &'static [&'static str] {
        &["image_data"]
    }
    async fn execute(
        &self,
        _arguments: serde_json::Value,
        _progress: ProgressReporter,
    ) -> Result<ToolResult, ToolError> {
        Ok(
            ToolResult::ok(serde_json::json!({"image_data": "QUJDRA=="})).with_artifact(
                deckr_core::tool::Artifact::inline("img", "image/png", vec![7u8; 64]),
            ),
        )
    }
}
