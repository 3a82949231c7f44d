//! Structured output parsing.
//!
//! When a caller expects JSON from the model's final answer, this is the one
//! place that turns text into data. The accepted shapes are bare JSON, or a
//! single fenced code block containing JSON. Anything else fails with
//! [`MalformedOutput`]; there is no brace-hunting fallback.

use serde::de::DeserializeOwned;
use thiserror::Error;

/// Maximum characters of the offending text kept in the error.
const EXCERPT_CHARS: usize = 200;

/// The model's output could not be deserialized into the expected shape.
#[derive(Debug, Clone, Error)]
#[error("{reason} (output began: {excerpt:?})")]
pub struct MalformedOutput {
    pub reason: String,
    pub excerpt: String,
}

impl MalformedOutput {
    fn new(reason: impl Into<String>, text: &str) -> Self {
        Self {
            reason: reason.into(),
            excerpt: text.chars().take(EXCERPT_CHARS).collect(),
        }
    }
}

/// Deserialize model text into `T`, or fail.
pub fn parse_structured<T: DeserializeOwned>(text: &str) -> Result<T, MalformedOutput> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(MalformedOutput::new("empty output", text));
    }

    let body = match unfence(trimmed) {
        Some(inner) => inner,
        None if trimmed.starts_with("```") => {
            return Err(MalformedOutput::new("unterminated code fence", text));
        }
        None => trimmed,
    };

    serde_json::from_str(body).map_err(|e| MalformedOutput::new(format!("invalid JSON: {e}"), text))
}

/// Strip a single surrounding ```json ... ``` (or bare ```) fence.
fn unfence(text: &str) -> Option<&str> {
    let rest = text.strip_prefix("```")?;
    let rest = rest.strip_suffix("```")?;
    // Drop the info string (e.g. "json") on the opening line.
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    Some(body.trim())
}
