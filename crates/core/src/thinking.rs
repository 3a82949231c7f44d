//! Thinking steps: the audit trail of one orchestration call.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of a thinking step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Pending,
    Active,
    Completed,
}

/// Coarse grouping used by callers to render steps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepCategory {
    Research,
    Design,
    Generation,
    Analysis,
    #[default]
    General,
}

/// One unit of orchestrator work, typically one tool invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThinkingStep {
    pub id: String,
    pub title: String,
    pub status: StepStatus,
    pub category: StepCategory,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl ThinkingStep {
    pub fn new(id: impl Into<String>, title: impl Into<String>, category: StepCategory) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            status: StepStatus::Pending,
            category,
            content: None,
            timestamp: Utc::now(),
        }
    }

    pub fn activate(&mut self) {
        self.status = StepStatus::Active;
        self.timestamp = Utc::now();
    }

    /// Append a line of streamed progress.
    pub fn append(&mut self, line: &str) {
        match &mut self.content {
            Some(existing) => {
                existing.push('\n');
                existing.push_str(line);
            }
            None => self.content = Some(line.to_string()),
        }
        self.timestamp = Utc::now();
    }

    pub fn complete(&mut self) {
        self.status = StepStatus::Completed;
        self.timestamp = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_lifecycle() {
        let mut step = ThinkingStep::new("step-1-0-fetch_logo", "Fetching logo", StepCategory::Design);
        assert_eq!(step.status, StepStatus::Pending);
        step.activate();
        assert_eq!(step.status, StepStatus::Active);
        step.append("Looking up brand assets");
        step.append("Found 2 candidates");
        assert_eq!(
            step.content.as_deref(),
            Some("Looking up brand assets\nFound 2 candidates")
        );
        step.complete();
        assert_eq!(step.status, StepStatus::Completed);
    }

    #[test]
    fn status_serializes_lowercase() {
        let json = serde_json::to_string(&StepStatus::Completed).unwrap();
        assert_eq!(json, r#""completed""#);
    }
}
