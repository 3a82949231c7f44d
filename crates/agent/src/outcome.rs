//! What one orchestration call hands back to its caller.

use deckr_core::message::Message;
use deckr_core::provider::Usage;
use deckr_core::thinking::ThinkingStep;
use deckr_core::tool::{ToolInvocation, ToolResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How a successful run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// The model produced a final answer.
    Completed,
    /// The iteration cap was hit; `final_text` is best-effort.
    IterationLimit,
}

/// Why a run was aborted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The model call failed (fatal error, or retries exhausted).
    Upstream,
    /// The model's output could not be understood.
    MalformedOutput,
    /// The whole-request deadline expired.
    DeadlineExceeded,
}

impl FailureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Upstream => "upstream",
            Self::MalformedOutput => "malformed_output",
            Self::DeadlineExceeded => "deadline_exceeded",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One tool call as the caller sees it: the raw, unsanitized result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRecord {
    pub invocation: ToolInvocation,
    pub result: ToolResult,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    /// Iterations entered (one model turn each).
    pub iterations: u32,
    /// Provider attempts, retries included.
    pub model_calls: u32,
    pub total_execution_ms: u64,
    pub usage: Usage,
}

/// The result of a run that reached `Done`, or the iteration cap.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOutcome {
    /// True only for [`RunStatus::Completed`].
    pub success: bool,
    pub status: RunStatus,
    pub final_text: String,
    /// Parsed final answer when JSON output was requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structured: Option<serde_json::Value>,
    pub thinking_steps: Vec<ThinkingStep>,
    pub tool_call_log: Vec<ToolCallRecord>,
    /// The conversation including this run's turns (sanitized tool outputs).
    pub history: Vec<Message>,
    pub metadata: RunMetadata,
}

/// A run that was aborted, with everything collected up to that point.
#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
#[error("{kind} failure at iteration {iteration}: {message}")]
pub struct RunFailure {
    pub kind: FailureKind,
    pub iteration: u32,
    pub message: String,
    /// Whether the same request may succeed if sent again.
    pub retryable: bool,
    pub thinking_steps: Vec<ThinkingStep>,
    pub tool_call_log: Vec<ToolCallRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_displays_kind_and_iteration() {
        let failure = RunFailure {
            kind: FailureKind::DeadlineExceeded,
            iteration: 3,
            message: "request exceeded 30s".into(),
            retryable: true,
            thinking_steps: vec![],
            tool_call_log: vec![],
        };
        assert_eq!(
            failure.to_string(),
            "deadline_exceeded failure at iteration 3: request exceeded 30s"
        );
    }

    #[test]
    fn status_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&RunStatus::IterationLimit).unwrap(),
            r#""iteration_limit""#
        );
    }
}
