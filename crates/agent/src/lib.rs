//! The Deckr execution loop.
//!
//! One request runs through a fixed cycle:
//!
//! 1. **Assemble** prior turns, the user input and any side-channel context
//! 2. **Call the model** with the tool catalog, retrying transient failures
//! 3. **If the turn invokes tools**: run them concurrently, sanitize their
//!    results, append the turn and its outputs, and loop back to step 2
//! 4. **If the turn is plain text**: return it as the final answer
//!
//! The loop stops at the iteration cap, on a fatal upstream error, on
//! malformed model output, or when the request deadline expires.

pub mod context;
pub mod executor;
pub mod loop_runner;
pub mod outcome;
pub mod sanitizer;
pub mod stream_event;
pub mod tracker;

#[cfg(test)]
mod test_helpers;

pub use context::{ContextBreakdown, HistoryAssembler, SideChannelContext};
pub use executor::{ExecutedCall, ToolExecutor};
pub use loop_runner::{ExecutionLoop, LoopPhase, ResponseFormat, RunRequest};
pub use outcome::{FailureKind, RunFailure, RunMetadata, RunOutcome, RunStatus, ToolCallRecord};
pub use sanitizer::ResultSanitizer;
pub use stream_event::{AgentStreamEvent, ChannelObserver, StreamEmitter, StreamObserver};
pub use tracker::ThinkingTracker;
