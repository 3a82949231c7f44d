//! Strips binary payloads from tool results before they reach the model.
//!
//! The model only needs to know that an artifact exists. Inline artifacts
//! and any string stored under one of the tool's declared blob fields are
//! replaced by a short placeholder. The caller keeps the original result.

use deckr_core::tool::{Artifact, ArtifactPayload, ToolRegistry, ToolResult};
use std::sync::Arc;

pub struct ResultSanitizer {
    registry: Arc<ToolRegistry>,
}

fn placeholder(ordinal: usize) -> String {
    format!("artifact {ordinal} generated successfully, payload omitted")
}

impl ResultSanitizer {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    /// Return a model-safe copy of `result`.
    ///
    /// Ordinals count artifacts first, then blob fields in traversal order,
    /// so sanitizing an already sanitized result changes nothing.
    pub fn sanitize(&self, tool_name: &str, result: &ToolResult) -> ToolResult {
        let blob_fields = self
            .registry
            .lookup(tool_name)
            .map(|tool| tool.blob_fields())
            .unwrap_or(&[]);

        let mut ordinal = 0;
        let mut clean = result.clone();

        clean.artifacts = result
            .artifacts
            .iter()
            .map(|artifact| {
                ordinal += 1;
                match &artifact.payload {
                    ArtifactPayload::Inline { data } => Artifact {
                        payload: ArtifactPayload::Omitted {
                            placeholder: placeholder(ordinal),
                            size_bytes: data.len(),
                        },
                        ..artifact.clone()
                    },
                    ArtifactPayload::Omitted { .. } => artifact.clone(),
                }
            })
            .collect();

        if !blob_fields.is_empty() {
            if let Some(data) = clean.data.as_mut() {
                strip_blobs(data, blob_fields, &mut ordinal);
            }
        }

        clean
    }
}

fn strip_blobs(value: &mut serde_json::Value, fields: &[&str], ordinal: &mut usize) {
    match value {
        serde_json::Value::Object(map) => {
            for (key, child) in map.iter_mut() {
                if fields.contains(&key.as_str()) {
                    replace_strings(child, ordinal);
                } else {
                    strip_blobs(child, fields, ordinal);
                }
            }
        }
        serde_json::Value::Array(items) => {
            for item in items {
                strip_blobs(item, fields, ordinal);
            }
        }
        _ => {}
    }
}

/// Everything under a blob field is payload: each string gets its own placeholder.
fn replace_strings(value: &mut serde_json::Value, ordinal: &mut usize) {
    match value {
        serde_json::Value::String(s) => {
            *ordinal += 1;
            *s = placeholder(*ordinal);
        }
        serde_json::Value::Array(items) => {
            for item in items {
                replace_strings(item, ordinal);
            }
        }
        serde_json::Value::Object(map) => {
            for child in map.values_mut() {
                replace_strings(child, ordinal);
            }
        }
        _ => {}
    }
}
