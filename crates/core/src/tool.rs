//! Tool trait: the abstraction over agent capabilities.
//!
//! Tools are what let the model act: research a company, fetch a logo,
//! render a slide. Each one declares a name, a description, and an input
//! schema; the execution loop only ever sees this contract.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use crate::error::{Error, ToolError};
use crate::message::ContentBlock;
use crate::provider::ToolDefinition;
use crate::thinking::StepCategory;

/// A request from the model to execute a tool, valid for one iteration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    /// Invocation ID, unique within the iteration that issued it
    pub id: String,

    /// Name of the tool to execute
    pub name: String,

    /// Arguments as a JSON value
    pub arguments: serde_json::Value,
}

impl ToolInvocation {
    /// Extract an invocation from a model-authored content block.
    pub fn from_block(block: &ContentBlock) -> Option<Self> {
        match block {
            ContentBlock::ToolInvocation {
                id,
                name,
                arguments,
                ..
            } => Some(Self {
                id: id.clone(),
                name: name.clone(),
                arguments: arguments.clone(),
            }),
            _ => None,
        }
    }
}

/// Classification of a failed tool result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolErrorKind {
    NotFound,
    InvalidArguments,
    ExecutionFailed,
    Timeout,
    Panicked,
}

/// Structured failure attached to a tool result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolFailure {
    pub kind: ToolErrorKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Execution bookkeeping for a tool result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolMetadata {
    pub execution_time_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_used: Option<String>,
}

/// Binary output of a tool (an image, a rendered slide, a logo).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub label: String,
    pub mime_type: String,
    pub payload: ArtifactPayload,
}

/// Artifact bytes, or the placeholder left behind once they were stripped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ArtifactPayload {
    Inline {
        #[serde(with = "base64_bytes")]
        data: Arc<[u8]>,
    },
    Omitted {
        placeholder: String,
        size_bytes: usize,
    },
}

impl Artifact {
    pub fn inline(label: impl Into<String>, mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            label: label.into(),
            mime_type: mime_type.into(),
            payload: ArtifactPayload::Inline {
                data: Arc::from(data),
            },
        }
    }

    pub fn size_bytes(&self) -> usize {
        match &self.payload {
            ArtifactPayload::Inline { data } => data.len(),
            ArtifactPayload::Omitted { size_bytes, .. } => *size_bytes,
        }
    }
}

mod base64_bytes {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};
    use std::sync::Arc;

    pub fn serialize<S: Serializer>(data: &Arc<[u8]>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(data))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Arc<[u8]>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded)
            .map(Arc::from)
            .map_err(serde::de::Error::custom)
    }
}

/// The result of a tool execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// Whether the tool executed successfully
    pub success: bool,

    /// Structured output
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,

    /// Failure details when `success` is false
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ToolFailure>,

    /// Binary outputs
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub artifacts: Vec<Artifact>,

    #[serde(default)]
    pub metadata: ToolMetadata,
}

impl ToolResult {
    /// A successful result carrying structured data.
    pub fn ok(data: serde_json::Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            artifacts: Vec::new(),
            metadata: ToolMetadata::default(),
        }
    }

    /// A failed result.
    pub fn failure(kind: ToolErrorKind, message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ToolFailure {
                kind,
                message: message.into(),
                details: None,
            }),
            artifacts: Vec::new(),
            metadata: ToolMetadata::default(),
        }
    }

    /// Fold a tool error into a failed result the model can read.
    pub fn from_error(err: &ToolError) -> Self {
        let kind = match err {
            ToolError::NotFound(_) => ToolErrorKind::NotFound,
            ToolError::InvalidArguments(_) => ToolErrorKind::InvalidArguments,
            ToolError::ExecutionFailed { .. } => ToolErrorKind::ExecutionFailed,
            ToolError::Timeout { .. } => ToolErrorKind::Timeout,
        };
        Self::failure(kind, err.to_string())
    }

    pub fn with_artifact(mut self, artifact: Artifact) -> Self {
        self.artifacts.push(artifact);
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.metadata.model_used = Some(model.into());
        self
    }

    /// The JSON form of this result, as fed back to the model.
    pub fn to_payload(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_else(|e| {
            serde_json::json!({
                "success": self.success,
                "error": format!("result could not be serialized: {e}"),
            })
        })
    }
}

/// Callback through which a running tool reports short status lines.
#[derive(Clone)]
pub struct ProgressReporter {
    sink: Option<Arc<dyn Fn(&str) + Send + Sync>>,
}

impl ProgressReporter {
    pub fn new(sink: impl Fn(&str) + Send + Sync + 'static) -> Self {
        Self {
            sink: Some(Arc::new(sink)),
        }
    }

    /// A reporter that discards everything.
    pub fn noop() -> Self {
        Self { sink: None }
    }

    pub fn report(&self, status: impl AsRef<str>) {
        if let Some(sink) = &self.sink {
            sink(status.as_ref());
        }
    }
}

impl fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("attached", &self.sink.is_some())
            .finish()
    }
}

/// The core Tool trait.
///
/// Each tool implements this trait and is registered in the [`ToolRegistry`],
/// which advertises it to the model and resolves invocations by name.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "research_company").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the model).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's arguments.
    fn input_schema(&self) -> serde_json::Value;

    /// Category of the thinking step opened for each invocation.
    fn category(&self) -> StepCategory {
        StepCategory::General
    }

    /// Title of the thinking step opened for an invocation.
    fn step_title(&self, _arguments: &serde_json::Value) -> String {
        format!("Running {}", self.name())
    }

    /// Keys in `data` whose string values are large opaque payloads.
    fn blob_fields(&self) -> &'static [&'static str] {
        &[]
    }

    /// Execute the tool with the given arguments.
    async fn execute(
        &self,
        arguments: serde_json::Value,
        progress: ProgressReporter,
    ) -> Result<ToolResult, ToolError>;

    /// Convert this tool into a ToolDefinition for sending to the model.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.input_schema(),
        }
    }
}

/// The catalog of available tools.
///
/// Built once at startup, then shared read-only as `Arc<ToolRegistry>`.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. A duplicate name is a configuration error.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<(), Error> {
        let name = tool.name().to_string();
        if self.index.contains_key(&name) {
            return Err(Error::Config {
                message: format!("duplicate tool name '{name}'"),
            });
        }
        self.index.insert(name, self.tools.len());
        self.tools.push(tool);
        Ok(())
    }

    /// Resolve a tool by name.
    pub fn lookup(&self, name: &str) -> Result<Arc<dyn Tool>, ToolError> {
        self.index
            .get(name)
            .map(|&i| self.tools[i].clone())
            .ok_or_else(|| ToolError::NotFound(name.to_string()))
    }

    /// All tool definitions in registration order (for advertising to the model).
    pub fn list(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.to_definition()).collect()
    }

    /// List all registered tool names.
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}
