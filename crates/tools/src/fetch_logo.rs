//! Logo fetch tool: offline stand-in that "downloads" a brand logo.
//!
//! Returns the logo as a binary artifact plus a little metadata. The bytes
//! are a generated PNG-shaped payload keyed on the company name.

use async_trait::async_trait;
use deckr_core::error::ToolError;
use deckr_core::thinking::StepCategory;
use deckr_core::tool::{Artifact, ProgressReporter, Tool, ToolResult};

use crate::{placeholder_png, required_str, seed};

pub struct FetchLogoTool;

#[async_trait]
impl Tool for FetchLogoTool {
    fn name(&self) -> &str {
        "fetch_logo"
    }

    fn description(&self) -> &str {
        "Fetch the logo for a company. Returns the logo image and its dimensions."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "company": {
                    "type": "string",
                    "description": "Company name"
                },
                "domain": {
                    "type": "string",
                    "description": "Company website domain, if known (e.g. 'acme.com')"
                }
            },
            "required": ["company"]
        })
    }

    fn category(&self) -> StepCategory {
        StepCategory::Design
    }

    fn step_title(&self, arguments: &serde_json::Value) -> String {
        match arguments["company"].as_str() {
            Some(company) => format!("Fetching {company} logo"),
            None => "Fetching logo".into(),
        }
    }

    async fn execute(
        &self,
        arguments: serde_json::Value,
        progress: ProgressReporter,
    ) -> Result<ToolResult, ToolError> {
        let company = required_str(&arguments, "company")?;
        let domain = match arguments["domain"].as_str() {
            Some(d) => d.to_string(),
            None => guess_domain(company).ok_or_else(|| ToolError::ExecutionFailed {
                tool_name: self.name().into(),
                reason: format!("cannot derive a domain from '{company}'"),
            })?,
        };

        progress.report(format!("Looking up brand assets on {domain}"));
        let size = 64 + (seed(&domain) % 4) * 64;
        let bytes = placeholder_png(&domain, size as usize);
        progress.report(format!("Downloaded {size}x{size} logo"));

        Ok(ToolResult::ok(serde_json::json!({
            "company": company,
            "domain": domain,
            "width": size,
            "height": size,
        }))
        .with_artifact(Artifact::inline(
            format!("{company} logo"),
            "image/png",
            bytes,
        )))
    }
}

/// "Acme Corp" -> "acmecorp.com"
fn guess_domain(company: &str) -> Option<String> {
    let stem: String = company
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect();
    (!stem.is_empty()).then(|| format!("{stem}.com"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use deckr_core::tool::ArtifactPayload;

    #[tokio::test]
    async fn fetch_returns_inline_artifact() {
        let result = FetchLogoTool
            .execute(
                serde_json::json!({"company": "Acme Corp"}),
                ProgressReporter::noop(),
            )
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.data.as_ref().unwrap()["domain"], "acmecorp.com");
        assert_eq!(result.artifacts.len(), 1);
        assert_eq!(result.artifacts[0].mime_type, "image/png");
        assert!(matches!(
            result.artifacts[0].payload,
            ArtifactPayload::Inline { .. }
        ));
        assert!(result.artifacts[0].size_bytes() > 0);
    }

    #[tokio::test]
    async fn explicit_domain_wins() {
        let result = FetchLogoTool
            .execute(
                serde_json::json!({"company": "Acme", "domain": "acme.io"}),
                ProgressReporter::noop(),
            )
            .await
            .unwrap();
        assert_eq!(result.data.unwrap()["domain"], "acme.io");
    }

    #[tokio::test]
    async fn unusable_name_fails() {
        let err = FetchLogoTool
            .execute(serde_json::json!({"company": "???"}), ProgressReporter::noop())
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::ExecutionFailed { .. }));
    }

    #[tokio::test]
    async fn reports_progress() {
        let lines = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = lines.clone();
        FetchLogoTool
            .execute(
                serde_json::json!({"company": "Acme"}),
                ProgressReporter::new(move |l| sink.lock().unwrap().push(l.to_string())),
            )
            .await
            .unwrap();
        let lines = lines.lock().unwrap();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("acme.com"));
    }
}
