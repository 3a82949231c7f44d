//! Slide generation tool: renders one slide to an image.
//!
//! The rendered image is returned twice, the way image-model backends do it:
//! as a binary artifact, and base64-encoded under `image_data` in the
//! structured output. Both are large; `image_data` is declared as a blob
//! field so it never reaches the model verbatim.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use deckr_core::error::ToolError;
use deckr_core::thinking::StepCategory;
use deckr_core::tool::{Artifact, ProgressReporter, Tool, ToolResult};

use crate::{placeholder_png, required_str};

const RENDER_MODEL: &str = "deckr-slide-renderer";
const MAX_BULLETS: usize = 8;

pub struct GenerateSlideTool;

#[async_trait]
impl Tool for GenerateSlideTool {
    fn name(&self) -> &str {
        "generate_slide"
    }

    fn description(&self) -> &str {
        "Generate a single slide image from a title and bullet points, optionally using a template."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "title": { "type": "string", "description": "Slide title" },
                "bullets": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Bullet points (at most 8)"
                },
                "template_id": {
                    "type": "string",
                    "description": "Template from match_templates (optional)"
                }
            },
            "required": ["title"]
        })
    }

    fn category(&self) -> StepCategory {
        StepCategory::Generation
    }

    fn step_title(&self, arguments: &serde_json::Value) -> String {
        match arguments["title"].as_str() {
            Some(title) => format!("Generating slide \"{title}\""),
            None => "Generating slide".into(),
        }
    }

    fn blob_fields(&self) -> &'static [&'static str] {
        &["image_data"]
    }

    async fn execute(
        &self,
        arguments: serde_json::Value,
        progress: ProgressReporter,
    ) -> Result<ToolResult, ToolError> {
        let title = required_str(&arguments, "title")?;
        let bullets: Vec<&str> = match &arguments["bullets"] {
            serde_json::Value::Null => Vec::new(),
            serde_json::Value::Array(items) => items.iter().filter_map(|b| b.as_str()).collect(),
            _ => {
                return Err(ToolError::InvalidArguments(
                    "'bullets' must be an array of strings".into(),
                ));
            }
        };
        if bullets.len() > MAX_BULLETS {
            return Err(ToolError::InvalidArguments(format!(
                "too many bullets ({}, max {MAX_BULLETS})",
                bullets.len()
            )));
        }
        let template = arguments["template_id"].as_str().unwrap_or("default");

        progress.report(format!("Laying out {} bullets on '{template}'", bullets.len()));
        let image = placeholder_png(&format!("{template}:{title}"), 2048 + bullets.len() * 256);
        progress.report("Rendered slide");

        let encoded = STANDARD.encode(&image);
        Ok(ToolResult::ok(serde_json::json!({
            "title": title,
            "bullet_count": bullets.len(),
            "template_id": template,
            "image_data": encoded,
        }))
        .with_artifact(Artifact::inline(
            format!("slide: {title}"),
            "image/png",
            image,
        ))
        .with_model(RENDER_MODEL))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn generates_image_twice() {
        let result = GenerateSlideTool
            .execute(
                serde_json::json!({"title": "Why Acme", "bullets": ["Fast", "Cheap"]}),
                ProgressReporter::noop(),
            )
            .await
            .unwrap();

        let data = result.data.as_ref().unwrap();
        assert_eq!(data["bullet_count"], 2);
        assert_eq!(data["template_id"], "default");
        let decoded = STANDARD
            .decode(data["image_data"].as_str().unwrap())
            .unwrap();
        assert_eq!(decoded.len(), result.artifacts[0].size_bytes());
        assert_eq!(result.metadata.model_used.as_deref(), Some(RENDER_MODEL));
    }

    #[tokio::test]
    async fn too_many_bullets_is_invalid() {
        let bullets: Vec<String> = (0..9).map(|i| format!("point {i}")).collect();
        let err = GenerateSlideTool
            .execute(
                serde_json::json!({"title": "Busy", "bullets": bullets}),
                ProgressReporter::noop(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[test]
    fn declares_image_blob() {
        assert_eq!(GenerateSlideTool.blob_fields(), &["image_data"]);
    }
}
