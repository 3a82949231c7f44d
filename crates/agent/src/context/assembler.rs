//! Conversation history assembly.
//!
//! Builds the ordered message list for the first model call of a request:
//!
//! 1. **Prior turns**, cloned verbatim (model turns keep their invocation
//!    blocks and continuation tokens), optionally trimmed by retention
//! 2. **Current user turn**: the user's text block, followed by a separate
//!    `[context]` block when side-channel notes are present
//!
//! The system framing is carried out of band in [`AssembledHistory::system`].
//!
//! # Determinism
//!
//! Identical inputs always produce identical outputs. Inputs are borrowed
//! and never mutated.

use deckr_core::message::{ContentBlock, Message, Role};
use serde::{Deserialize, Serialize};

// ── Types ─────────────────────────────────────────────────────────────────

/// Out-of-band context attached to the current request only
/// (e.g. which deck or slide the user has open).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SideChannelContext {
    #[serde(default)]
    pub notes: Vec<String>,
}

impl SideChannelContext {
    pub fn new(notes: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            notes: notes.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.notes.iter().all(|n| n.trim().is_empty())
    }

    /// The labelled block text, or `None` when there is nothing to say.
    pub fn render(&self) -> Option<String> {
        if self.is_empty() {
            return None;
        }
        let mut out = String::from("[context]");
        for note in self.notes.iter().filter(|n| !n.trim().is_empty()) {
            out.push('\n');
            out.push_str(note.trim());
        }
        Some(out)
    }
}

/// The output of [`HistoryAssembler::assemble`].
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledHistory {
    pub system: String,
    pub messages: Vec<Message>,
}

// ── Assembler ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct HistoryAssembler {
    /// Keep at most this many prior messages.
    retention: Option<usize>,
}

impl HistoryAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_retention(mut self, max_messages: Option<usize>) -> Self {
        self.retention = max_messages;
        self
    }

    pub fn assemble(
        &self,
        system_framing: &str,
        prior_turns: &[Message],
        side_channel: &SideChannelContext,
        user_input: &str,
    ) -> AssembledHistory {
        let kept = self.retained(prior_turns);

        let mut blocks = vec![ContentBlock::text(user_input)];
        if let Some(context) = side_channel.render() {
            blocks.push(ContentBlock::text(context));
        }

        let mut messages = Vec::with_capacity(kept.len() + 1);
        messages.extend_from_slice(kept);
        messages.push(Message {
            role: Role::User,
            blocks,
        });

        AssembledHistory {
            system: system_framing.to_string(),
            messages,
        }
    }

    /// Apply the retention window.
    ///
    /// After cutting to the newest `max` messages, leading messages are
    /// dropped until a plain user turn, so the kept window never opens with
    /// a model invocation or an orphaned tool output.
    fn retained<'a>(&self, prior: &'a [Message]) -> &'a [Message] {
        let Some(max) = self.retention else {
            return prior;
        };
        let window = &prior[prior.len().saturating_sub(max)..];
        let start = window
            .iter()
            .position(Message::is_user_turn)
            .unwrap_or(window.len());
        &window[start..]
    }
}
