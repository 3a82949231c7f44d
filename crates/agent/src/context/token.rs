//! Token estimation utilities.
//!
//! Uses a character-based heuristic: ~4 characters per token. The estimate
//! is only used to report how big the context is getting; it never changes
//! what is sent.

use deckr_core::message::{ContentBlock, Message};
use deckr_core::provider::ToolDefinition;
use serde::{Deserialize, Serialize};

/// Per-message overhead for role and delimiters in the wire format.
const MESSAGE_OVERHEAD: usize = 4;

/// Estimate the token count for a string.
///
/// Heuristic: 1 token ≈ 4 characters. Rounds up.
pub fn estimate_tokens(text: &str) -> usize {
    text.len().div_ceil(4)
}

/// Estimate tokens for a JSON value by its compact serialization.
pub fn estimate_value(value: &serde_json::Value) -> usize {
    estimate_tokens(&value.to_string())
}

/// Estimate tokens for a single message including per-message overhead.
pub fn estimate_message(message: &Message) -> usize {
    let content: usize = message
        .blocks
        .iter()
        .map(|block| match block {
            ContentBlock::Text { text } => estimate_tokens(text),
            ContentBlock::ToolInvocation {
                name,
                arguments,
                continuation,
                ..
            } => {
                estimate_tokens(name)
                    + estimate_value(arguments)
                    + continuation.as_ref().map_or(0, |c| estimate_tokens(c.as_str()))
            }
            ContentBlock::ToolOutput { name, payload, .. } => {
                estimate_tokens(name) + estimate_value(payload)
            }
        })
        .sum();
    MESSAGE_OVERHEAD + content
}

/// Estimate tokens for a slice of tool definitions (serialized as JSON).
pub fn estimate_tools(tools: &[ToolDefinition]) -> usize {
    tools
        .iter()
        .map(|t| estimate_tokens(&serde_json::to_string(t).unwrap_or_default()))
        .sum()
}

/// How close an estimate is to the ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizeFlag {
    Ok,
    /// At or above 80% of the ceiling.
    Near,
    /// Above the ceiling.
    Over,
}

impl SizeFlag {
    pub fn classify(tokens: usize, ceiling: usize) -> Self {
        if tokens > ceiling {
            Self::Over
        } else if tokens.saturating_mul(5) >= ceiling.saturating_mul(4) {
            Self::Near
        } else {
            Self::Ok
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentEstimate {
    pub name: String,
    pub tokens: usize,
    pub running_total: usize,
    pub flag: SizeFlag,
}

/// Estimated size of one outgoing model request, by component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextBreakdown {
    pub label: String,
    pub components: Vec<ComponentEstimate>,
    pub total_tokens: usize,
    pub ceiling: usize,
    pub flag: SizeFlag,
}

impl ContextBreakdown {
    /// Whether the total or any single component is near or over the ceiling.
    pub fn is_flagged(&self) -> bool {
        self.flag != SizeFlag::Ok || self.components.iter().any(|c| c.flag != SizeFlag::Ok)
    }
}

/// Build a per-component breakdown with running totals.
pub fn log_breakdown(label: &str, components: &[(&str, usize)], ceiling: usize) -> ContextBreakdown {
    let mut running_total = 0;
    let components: Vec<ComponentEstimate> = components
        .iter()
        .map(|&(name, tokens)| {
            running_total += tokens;
            ComponentEstimate {
                name: name.to_string(),
                tokens,
                running_total,
                flag: SizeFlag::classify(tokens, ceiling),
            }
        })
        .collect();

    ContextBreakdown {
        label: label.to_string(),
        components,
        total_tokens: running_total,
        ceiling,
        flag: SizeFlag::classify(running_total, ceiling),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deckr_core::message::{ContinuationToken, Role};

    #[test]
    fn empty_string_is_zero() {
        assert_eq!(estimate_tokens(""), 0);
    }

    #[test]
    fn five_chars_rounds_up() {
        assert_eq!(estimate_tokens("hello"), 2);
    }

    #[test]
    fn hundred_chars() {
        assert_eq!(estimate_tokens(&"a".repeat(100)), 25);
    }

    #[test]
    fn message_includes_overhead() {
        let msg = Message::user_text("test"); // 1 token + 4 overhead
        assert_eq!(estimate_message(&msg), 5);
    }

    #[test]
    fn invocation_counts_name_args_and_token() {
        let msg = Message {
            role: Role::Model,
            blocks: vec![ContentBlock::ToolInvocation {
                id: "call_0".into(),
                name: "fetch_logo".into(),            // 10 chars -> 3
                arguments: serde_json::json!({}),     // "{}" -> 1
                continuation: Some(ContinuationToken::new("abcdefgh")), // 2
            }],
        };
        assert_eq!(estimate_message(&msg), 4 + 3 + 1 + 2);
    }

    #[test]
    fn flags_by_ceiling() {
        assert_eq!(SizeFlag::classify(79, 100), SizeFlag::Ok);
        assert_eq!(SizeFlag::classify(80, 100), SizeFlag::Near);
        assert_eq!(SizeFlag::classify(100, 100), SizeFlag::Near);
        assert_eq!(SizeFlag::classify(101, 100), SizeFlag::Over);
    }

    #[test]
    fn breakdown_keeps_running_totals() {
        let b = log_breakdown("iteration 1", &[("system", 10), ("conversation", 60), ("tool_outputs", 20)], 100);
        assert_eq!(b.total_tokens, 90);
        assert_eq!(
            b.components.iter().map(|c| c.running_total).collect::<Vec<_>>(),
            vec![10, 70, 90]
        );
        assert_eq!(b.flag, SizeFlag::Near);
        assert!(b.components.iter().all(|c| c.flag == SizeFlag::Ok));
        assert!(b.is_flagged());
    }

    #[test]
    fn single_component_can_be_flagged() {
        let b = log_breakdown("x", &[("tool_outputs", 500)], 400);
        assert_eq!(b.components[0].flag, SizeFlag::Over);
        assert_eq!(b.flag, SizeFlag::Over);
    }

    #[test]
    fn empty_tools_is_zero() {
        assert_eq!(estimate_tools(&[]), 0);
    }
}
