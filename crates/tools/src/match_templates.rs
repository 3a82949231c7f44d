//! Template matching tool: ranks the built-in slide templates for a brief.

use async_trait::async_trait;
use deckr_core::error::ToolError;
use deckr_core::thinking::StepCategory;
use deckr_core::tool::{ProgressReporter, Tool, ToolResult};

use crate::required_str;

pub struct MatchTemplatesTool;

struct Template {
    id: &'static str,
    name: &'static str,
    keywords: &'static [&'static str],
}

const TEMPLATES: &[Template] = &[
    Template {
        id: "pitch-bold",
        name: "Bold Pitch",
        keywords: &["pitch", "investor", "startup", "funding", "growth"],
    },
    Template {
        id: "corporate-clean",
        name: "Corporate Clean",
        keywords: &["enterprise", "quarterly", "report", "board", "finance"],
    },
    Template {
        id: "product-launch",
        name: "Product Launch",
        keywords: &["launch", "product", "feature", "release", "demo"],
    },
    Template {
        id: "training",
        name: "Workshop",
        keywords: &["training", "onboarding", "workshop", "internal", "team"],
    },
];

#[async_trait]
impl Tool for MatchTemplatesTool {
    fn name(&self) -> &str {
        "match_templates"
    }

    fn description(&self) -> &str {
        "Find the slide templates that best fit a presentation brief. Returns templates ranked by relevance."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "brief": {
                    "type": "string",
                    "description": "Short description of the deck's purpose and audience"
                },
                "limit": {
                    "type": "integer",
                    "description": "Maximum templates to return (default: 3)",
                    "default": 3
                }
            },
            "required": ["brief"]
        })
    }

    fn category(&self) -> StepCategory {
        StepCategory::Analysis
    }

    fn step_title(&self, _arguments: &serde_json::Value) -> String {
        "Matching templates".into()
    }

    async fn execute(
        &self,
        arguments: serde_json::Value,
        progress: ProgressReporter,
    ) -> Result<ToolResult, ToolError> {
        let brief = required_str(&arguments, "brief")?.to_lowercase();
        let limit = arguments["limit"].as_u64().unwrap_or(3).max(1) as usize;

        progress.report(format!("Scoring {} templates", TEMPLATES.len()));

        let mut ranked: Vec<(usize, &Template)> = TEMPLATES
            .iter()
            .map(|t| (t.keywords.iter().filter(|k| brief.contains(*k)).count(), t))
            .collect();
        // Stable sort keeps catalog order among ties.
        ranked.sort_by(|a, b| b.0.cmp(&a.0));

        let matches: Vec<serde_json::Value> = ranked
            .into_iter()
            .take(limit)
            .map(|(score, t)| {
                serde_json::json!({
                    "template_id": t.id,
                    "name": t.name,
                    "score": score,
                })
            })
            .collect();

        Ok(ToolResult::ok(serde_json::json!({ "matches": matches })))
    }
}
