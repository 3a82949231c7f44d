//! Message domain types.
//!
//! A conversation is an ordered `Vec<Message>`. Each message carries a role and
//! an ordered list of typed content blocks: plain text, a model-authored tool
//! invocation, or the output of a tool fed back to the model.

use serde::{Deserialize, Serialize};

/// The role of a message author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user (tool outputs are also delivered in user turns)
    User,
    /// The generative model
    Model,
}

/// Opaque model-internal state attached to a tool invocation.
///
/// Must be replayed byte for byte on the next model call.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContinuationToken(pub String);

impl ContinuationToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// One block of message content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Plain text.
    Text { text: String },

    /// A request from the model to run a tool.
    ToolInvocation {
        id: String,
        name: String,
        arguments: serde_json::Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        continuation: Option<ContinuationToken>,
    },

    /// The (sanitized) outcome of a tool, referencing its invocation.
    ToolOutput {
        invocation_id: String,
        name: String,
        payload: serde_json::Value,
    },
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }
}

/// A single turn in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Who authored this turn
    pub role: Role,

    /// Ordered content blocks
    pub blocks: Vec<ContentBlock>,
}

impl Message {
    /// Create a user message with a single text block.
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            blocks: vec![ContentBlock::text(text)],
        }
    }

    /// Create a model message with a single text block.
    pub fn model_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            blocks: vec![ContentBlock::text(text)],
        }
    }

    /// Create a user turn carrying tool outputs.
    pub fn tool_outputs(blocks: Vec<ContentBlock>) -> Self {
        Self {
            role: Role::User,
            blocks,
        }
    }

    /// Concatenated text of all text blocks, joined by newlines.
    pub fn text(&self) -> String {
        self.blocks
            .iter()
            .filter_map(|b| match b {
                ContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// All tool invocation blocks, in the order the model issued them.
    pub fn invocations(&self) -> impl Iterator<Item = &ContentBlock> {
        self.blocks
            .iter()
            .filter(|b| matches!(b, ContentBlock::ToolInvocation { .. }))
    }

    pub fn has_invocations(&self) -> bool {
        self.invocations().next().is_some()
    }

    /// Whether this is a user turn that only carries tool outputs.
    pub fn is_tool_output(&self) -> bool {
        self.role == Role::User
            && !self.blocks.is_empty()
            && self
                .blocks
                .iter()
                .all(|b| matches!(b, ContentBlock::ToolOutput { .. }))
    }

    /// Whether this is a plain user turn (typed by a person, not tool output).
    pub fn is_user_turn(&self) -> bool {
        self.role == Role::User
            && self
                .blocks
                .iter()
                .any(|b| matches!(b, ContentBlock::Text { .. }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invocation(id: &str, token: Option<&str>) -> ContentBlock {
        ContentBlock::ToolInvocation {
            id: id.into(),
            name: "research_company".into(),
            arguments: serde_json::json!({"company": "Acme"}),
            continuation: token.map(ContinuationToken::new),
        }
    }

    #[test]
    fn create_user_message() {
        let msg = Message::user_text("Build me a deck");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.text(), "Build me a deck");
        assert!(!msg.has_invocations());
        assert!(msg.is_user_turn());
    }

    #[test]
    fn text_skips_non_text_blocks() {
        let msg = Message {
            role: Role::Model,
            blocks: vec![
                ContentBlock::text("Looking this up."),
                invocation("call_1", None),
                ContentBlock::text("One moment."),
            ],
        };
        assert_eq!(msg.text(), "Looking this up.\nOne moment.");
        assert_eq!(msg.invocations().count(), 1);
    }

    #[test]
    fn tool_output_turns_are_not_user_turns() {
        let msg = Message::tool_outputs(vec![ContentBlock::ToolOutput {
            invocation_id: "call_1".into(),
            name: "fetch_logo".into(),
            payload: serde_json::json!({"success": true}),
        }]);
        assert!(msg.is_tool_output());
        assert!(!msg.is_user_turn());
    }

    #[test]
    fn continuation_token_survives_serialization() {
        let msg = Message {
            role: Role::Model,
            blocks: vec![invocation("call_1", Some("c2lnbmF0dXJl=="))],
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains(r#""continuation":"c2lnbmF0dXJl==""#));
        let back: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(back, msg);
    }
}
