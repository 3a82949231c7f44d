//! # Deckr Core
//!
//! Domain types, traits, and error definitions for the Deckr agent runtime.
//! This crate does no I/O; it defines the model that the provider, tool, and
//! agent crates implement against.
//!
//! ## Design Philosophy
//!
//! The two collaborators of the orchestration loop are traits here:
//! - [`Provider`] is the model boundary (request/response, typed content blocks)
//! - [`Tool`] is one externally implemented capability with a declared schema
//!
//! Everything else (messages, tool results, thinking steps) is plain data.

pub mod error;
pub mod message;
pub mod provider;
pub mod structured;
pub mod thinking;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{Error, ProviderError, Result, ToolError};
pub use message::{ContentBlock, ContinuationToken, Message, Role};
pub use provider::{ModelRequest, ModelResponse, Provider, ToolDefinition, Usage};
pub use structured::{MalformedOutput, parse_structured};
pub use thinking::{StepCategory, StepStatus, ThinkingStep};
pub use tool::{
    Artifact, ArtifactPayload, ProgressReporter, Tool, ToolErrorKind, ToolFailure,
    ToolInvocation, ToolMetadata, ToolRegistry, ToolResult,
};
