//! Agent-level streaming events.
//!
//! `AgentStreamEvent` is the single progress channel of the execution loop.
//! The caller's observer and the log see the same events: a
//! [`StreamEmitter`] always fans out to a [`TracingObserver`] next to the
//! caller's own observer.

use crate::context::token::ContextBreakdown;
use crate::outcome::{FailureKind, RunStatus};
use deckr_core::thinking::ThinkingStep;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Events emitted by the execution loop.
///
/// - `step_started` / `step_updated` / `step_completed`: thinking step transitions
/// - `iteration_started`: a model call is about to be made
/// - `context_estimate`: estimated size of the outgoing request
/// - `done`: terminal: the run produced an answer
/// - `error`: terminal: the run was aborted
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentStreamEvent {
    StepStarted { step: ThinkingStep },

    StepUpdated { step: ThinkingStep },

    StepCompleted { step: ThinkingStep },

    IterationStarted { iteration: u32 },

    ContextEstimate {
        iteration: u32,
        breakdown: ContextBreakdown,
    },

    Done {
        status: RunStatus,
        final_text: String,
        iterations: u32,
        tool_calls_made: usize,
    },

    Error {
        kind: FailureKind,
        iteration: u32,
        message: String,
    },
}

impl AgentStreamEvent {
    /// SSE event name for this event type.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::StepStarted { .. } => "step_started",
            Self::StepUpdated { .. } => "step_updated",
            Self::StepCompleted { .. } => "step_completed",
            Self::IterationStarted { .. } => "iteration_started",
            Self::ContextEstimate { .. } => "context_estimate",
            Self::Done { .. } => "done",
            Self::Error { .. } => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done { .. } | Self::Error { .. })
    }
}

// ── Observers ────────────────────────────────────────────────────────────

/// Receives every event of a run, in order.
pub trait StreamObserver: Send + Sync {
    fn on_event(&self, event: &AgentStreamEvent);
}

impl<F> StreamObserver for F
where
    F: Fn(&AgentStreamEvent) + Send + Sync,
{
    fn on_event(&self, event: &AgentStreamEvent) {
        self(event)
    }
}

/// Forwards events into a channel; a closed receiver is ignored.
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<AgentStreamEvent>,
}

impl ChannelObserver {
    pub fn new(tx: mpsc::UnboundedSender<AgentStreamEvent>) -> Self {
        Self { tx }
    }
}

impl StreamObserver for ChannelObserver {
    fn on_event(&self, event: &AgentStreamEvent) {
        let _ = self.tx.send(event.clone());
    }
}

/// Turns events into log records.
pub struct TracingObserver;

impl StreamObserver for TracingObserver {
    fn on_event(&self, event: &AgentStreamEvent) {
        match event {
            AgentStreamEvent::StepStarted { step } => {
                info!(step_id = %step.id, title = %step.title, "Step started");
            }
            AgentStreamEvent::StepUpdated { step } => {
                debug!(step_id = %step.id, "Step progress");
            }
            AgentStreamEvent::StepCompleted { step } => {
                info!(step_id = %step.id, "Step completed");
            }
            AgentStreamEvent::IterationStarted { iteration } => {
                debug!(iteration, "Iteration started");
            }
            AgentStreamEvent::ContextEstimate {
                iteration,
                breakdown,
            } => {
                if breakdown.is_flagged() {
                    let components: Vec<String> = breakdown
                        .components
                        .iter()
                        .map(|c| format!("{}={} ({:?})", c.name, c.tokens, c.flag))
                        .collect();
                    warn!(
                        iteration,
                        total_tokens = breakdown.total_tokens,
                        ceiling = breakdown.ceiling,
                        components = %components.join(", "),
                        "Context size near or over ceiling"
                    );
                } else {
                    debug!(
                        iteration,
                        total_tokens = breakdown.total_tokens,
                        ceiling = breakdown.ceiling,
                        "Context estimate"
                    );
                }
            }
            AgentStreamEvent::Done {
                status,
                iterations,
                tool_calls_made,
                ..
            } => {
                info!(?status, iterations, tool_calls_made, "Run finished");
            }
            AgentStreamEvent::Error {
                kind,
                iteration,
                message,
            } => {
                warn!(%kind, iteration, error = %message, "Run aborted");
            }
        }
    }
}

/// Fans events out to the tracing observer and the caller's observer.
#[derive(Clone)]
pub struct StreamEmitter {
    observers: Vec<Arc<dyn StreamObserver>>,
}

impl StreamEmitter {
    pub fn new(caller: Arc<dyn StreamObserver>) -> Self {
        Self {
            observers: vec![Arc::new(TracingObserver), caller],
        }
    }

    /// An emitter that only logs.
    pub fn tracing_only() -> Self {
        Self {
            observers: vec![Arc::new(TracingObserver)],
        }
    }

    pub fn emit(&self, event: AgentStreamEvent) {
        for observer in &self.observers {
            observer.on_event(&event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deckr_core::thinking::StepCategory;
    use std::sync::Mutex;

    #[test]
    fn event_serialization_step() {
        let event = AgentStreamEvent::StepStarted {
            step: ThinkingStep::new("step-1-0-fetch_logo", "Fetching logo", StepCategory::Design),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"step_started""#));
        assert!(json.contains(r#""id":"step-1-0-fetch_logo""#));
    }

    #[test]
    fn event_serialization_done() {
        let event = AgentStreamEvent::Done {
            status: RunStatus::Completed,
            final_text: "ok".into(),
            iterations: 2,
            tool_calls_made: 1,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"done""#));
        assert!(json.contains(r#""status":"completed""#));
        assert!(json.contains(r#""iterations":2"#));
    }

    #[test]
    fn event_type_names() {
        assert_eq!(AgentStreamEvent::IterationStarted { iteration: 1 }.event_type(), "iteration_started");
        let error = AgentStreamEvent::Error {
            kind: FailureKind::Upstream,
            iteration: 1,
            message: "x".into(),
        };
        assert_eq!(error.event_type(), "error");
        assert!(error.is_terminal());
    }

    #[test]
    fn event_deserialization() {
        let json = r#"{"type":"error","kind":"malformed_output","iteration":3,"message":"bad"}"#;
        let event: AgentStreamEvent = serde_json::from_str(json).unwrap();
        match event {
            AgentStreamEvent::Error { kind, iteration, .. } => {
                assert_eq!(kind, FailureKind::MalformedOutput);
                assert_eq!(iteration, 3);
            }
            _ => panic!("Wrong variant"),
        }
    }

    #[test]
    fn emitter_reaches_closure_observer() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let emitter = StreamEmitter::new(Arc::new(move |e: &AgentStreamEvent| {
            sink.lock().unwrap().push(e.event_type());
        }));
        emitter.emit(AgentStreamEvent::IterationStarted { iteration: 1 });
        emitter.clone().emit(AgentStreamEvent::IterationStarted { iteration: 2 });
        assert_eq!(*seen.lock().unwrap(), vec!["iteration_started", "iteration_started"]);
    }

    #[tokio::test]
    async fn channel_observer_forwards() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let observer = ChannelObserver::new(tx);
        observer.on_event(&AgentStreamEvent::IterationStarted { iteration: 7 });
        match rx.recv().await.unwrap() {
            AgentStreamEvent::IterationStarted { iteration } => assert_eq!(iteration, 7),
            other => panic!("unexpected {other:?}"),
        }
    }
}
