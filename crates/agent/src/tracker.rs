//! Thinking step bookkeeping for one run.
//!
//! Every transition is emitted as it happens, so callers see a step start
//! before its tool is dispatched and complete right after it settles.

use crate::stream_event::{AgentStreamEvent, StreamEmitter};
use deckr_core::thinking::{StepCategory, ThinkingStep};
use tracing::debug;

pub struct ThinkingTracker {
    steps: Vec<ThinkingStep>,
    emitter: StreamEmitter,
}

impl ThinkingTracker {
    pub fn new(emitter: StreamEmitter) -> Self {
        Self {
            steps: Vec::new(),
            emitter,
        }
    }

    pub fn emitter(&self) -> &StreamEmitter {
        &self.emitter
    }

    /// Open a step and mark it active.
    pub fn start(&mut self, id: &str, title: impl Into<String>, category: StepCategory) {
        let mut step = ThinkingStep::new(id, title, category);
        step.activate();
        self.emitter
            .emit(AgentStreamEvent::StepStarted { step: step.clone() });
        self.steps.push(step);
    }

    /// Append a progress line to the step with this id.
    pub fn update(&mut self, id: &str, line: &str) {
        let Some(step) = self.find(id) else {
            debug!(step_id = id, "Progress for unknown step dropped");
            return;
        };
        step.append(line);
        let step = step.clone();
        self.emitter.emit(AgentStreamEvent::StepUpdated { step });
    }

    pub fn complete(&mut self, id: &str) {
        let Some(step) = self.find(id) else {
            debug!(step_id = id, "Completion for unknown step dropped");
            return;
        };
        step.complete();
        let step = step.clone();
        self.emitter.emit(AgentStreamEvent::StepCompleted { step });
    }

    pub fn steps(&self) -> &[ThinkingStep] {
        &self.steps
    }

    fn find(&mut self, id: &str) -> Option<&mut ThinkingStep> {
        self.steps.iter_mut().find(|s| s.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deckr_core::thinking::StepStatus;
    use std::sync::{Arc, Mutex};

    #[test]
    fn transitions_are_emitted_in_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let emitter = StreamEmitter::new(Arc::new(move |e: &AgentStreamEvent| {
            sink.lock().unwrap().push(e.event_type());
        }));

        let mut tracker = ThinkingTracker::new(emitter);
        tracker.start("step-1-0-research", "Researching", StepCategory::Research);
        tracker.update("step-1-0-research", "searching");
        tracker.update("step-9-9-ghost", "ignored");
        tracker.complete("step-1-0-research");

        assert_eq!(
            *seen.lock().unwrap(),
            vec!["step_started", "step_updated", "step_completed"]
        );
        let step = &tracker.steps()[0];
        assert_eq!(step.status, StepStatus::Completed);
        assert_eq!(step.content.as_deref(), Some("searching"));
    }
}
