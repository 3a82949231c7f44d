//! Company research tool: offline stand-in that returns a company profile.
//!
//! The profile is derived from a hash of the company name, so the same
//! request always yields the same brief. Enough structure for the model to
//! plan a deck (industry, audience, talking points, brand colors).

use async_trait::async_trait;
use deckr_core::error::ToolError;
use deckr_core::thinking::StepCategory;
use deckr_core::tool::{ProgressReporter, Tool, ToolResult};
use serde::Serialize;

use crate::{required_str, seed};

pub struct ResearchCompanyTool;

#[async_trait]
impl Tool for ResearchCompanyTool {
    fn name(&self) -> &str {
        "research_company"
    }

    fn description(&self) -> &str {
        "Research a company for a presentation. Returns industry, audience, key talking points, and brand colors."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "company": {
                    "type": "string",
                    "description": "Company name, e.g. 'Acme Corp'"
                },
                "focus": {
                    "type": "string",
                    "description": "Optional angle for the research (e.g. 'investor pitch')"
                }
            },
            "required": ["company"]
        })
    }

    fn category(&self) -> StepCategory {
        StepCategory::Research
    }

    fn step_title(&self, arguments: &serde_json::Value) -> String {
        match arguments["company"].as_str() {
            Some(company) => format!("Researching {company}"),
            None => "Researching company".into(),
        }
    }

    async fn execute(
        &self,
        arguments: serde_json::Value,
        progress: ProgressReporter,
    ) -> Result<ToolResult, ToolError> {
        let company = required_str(&arguments, "company")?;
        let focus = arguments["focus"].as_str();

        progress.report(format!("Searching public sources for {company}"));
        let profile = build_profile(company, focus);
        progress.report(format!(
            "Found {} talking points in {}",
            profile.talking_points.len(),
            profile.industry
        ));

        let data = serde_json::to_value(&profile).map_err(|e| ToolError::ExecutionFailed {
            tool_name: self.name().into(),
            reason: e.to_string(),
        })?;
        Ok(ToolResult::ok(data))
    }
}

#[derive(Debug, Serialize)]
struct CompanyProfile {
    company: String,
    industry: String,
    audience: String,
    talking_points: Vec<String>,
    brand_colors: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    focus: Option<String>,
}

const INDUSTRIES: [&str; 6] = [
    "Software",
    "Logistics",
    "Healthcare",
    "Retail",
    "Energy",
    "Financial services",
];

const AUDIENCES: [&str; 4] = ["Investors", "Enterprise buyers", "Partners", "Internal teams"];

const PALETTE: [&str; 8] = [
    "#1A73E8", "#E8453C", "#F9AB00", "#34A853", "#7B1FA2", "#00897B", "#3949AB", "#F4511E",
];

fn build_profile(company: &str, focus: Option<&str>) -> CompanyProfile {
    let h = seed(company) as usize;
    let industry = INDUSTRIES[h % INDUSTRIES.len()];

    CompanyProfile {
        company: company.to_string(),
        industry: industry.to_string(),
        audience: AUDIENCES[(h / 7) % AUDIENCES.len()].to_string(),
        talking_points: vec![
            format!("{company} at a glance"),
            format!("Where {company} wins in {}", industry.to_lowercase()),
            format!("{} years of growth", 3 + h % 12),
            "Roadmap and next steps".to_string(),
        ],
        brand_colors: vec![
            PALETTE[h % PALETTE.len()].to_string(),
            PALETTE[(h / 3 + 1) % PALETTE.len()].to_string(),
        ],
        focus: focus.map(str::to_string),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn research_returns_profile() {
        let result = ResearchCompanyTool
            .execute(
                serde_json::json!({"company": "Acme Corp"}),
                ProgressReporter::noop(),
            )
            .await
            .unwrap();

        assert!(result.success);
        let data = result.data.unwrap();
        assert_eq!(data["company"], "Acme Corp");
        assert_eq!(data["talking_points"].as_array().unwrap().len(), 4);
        assert!(data["brand_colors"][0].as_str().unwrap().starts_with('#'));
        assert!(data.get("focus").is_none());
    }

    #[tokio::test]
    async fn deterministic_results() {
        let args = serde_json::json!({"company": "Globex"});
        let r1 = ResearchCompanyTool
            .execute(args.clone(), ProgressReporter::noop())
            .await
            .unwrap();
        let r2 = ResearchCompanyTool
            .execute(args, ProgressReporter::noop())
            .await
            .unwrap();
        assert_eq!(r1.data, r2.data);
    }

    #[tokio::test]
    async fn missing_company_is_invalid() {
        let err = ResearchCompanyTool
            .execute(serde_json::json!({}), ProgressReporter::noop())
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[test]
    fn step_title_names_company() {
        let title = ResearchCompanyTool.step_title(&serde_json::json!({"company": "Initech"}));
        assert_eq!(title, "Researching Initech");
    }
}
