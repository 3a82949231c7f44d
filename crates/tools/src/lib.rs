//! Built-in tool implementations for Deckr.
//!
//! Tools give the agent the ability to build a deck: research the company,
//! fetch its logo, pick templates, and render slides.
//!
//! Every built-in tool has a [`ToolId`]. [`handler`] maps each id to its
//! implementation with an exhaustive `match`, so a new id without a handler
//! does not compile.

pub mod fetch_logo;
pub mod generate_slide;
pub mod match_templates;
pub mod research_company;

use deckr_core::error::{Error, ToolError};
use deckr_core::tool::{Tool, ToolRegistry};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

pub use fetch_logo::FetchLogoTool;
pub use generate_slide::GenerateSlideTool;
pub use match_templates::MatchTemplatesTool;
pub use research_company::ResearchCompanyTool;

/// Identifier of a built-in tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolId {
    ResearchCompany,
    FetchLogo,
    GenerateSlide,
    MatchTemplates,
}

impl ToolId {
    pub const ALL: [ToolId; 4] = [
        ToolId::ResearchCompany,
        ToolId::FetchLogo,
        ToolId::GenerateSlide,
        ToolId::MatchTemplates,
    ];

    /// The wire name the model uses to invoke this tool.
    pub fn name(self) -> &'static str {
        match self {
            ToolId::ResearchCompany => "research_company",
            ToolId::FetchLogo => "fetch_logo",
            ToolId::GenerateSlide => "generate_slide",
            ToolId::MatchTemplates => "match_templates",
        }
    }
}

impl fmt::Display for ToolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ToolId {
    type Err = ToolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ToolId::ALL
            .into_iter()
            .find(|id| id.name() == s)
            .ok_or_else(|| ToolError::NotFound(s.to_string()))
    }
}

/// The implementation behind a tool id.
pub fn handler(id: ToolId) -> Arc<dyn Tool> {
    match id {
        ToolId::ResearchCompany => Arc::new(ResearchCompanyTool),
        ToolId::FetchLogo => Arc::new(FetchLogoTool),
        ToolId::GenerateSlide => Arc::new(GenerateSlideTool),
        ToolId::MatchTemplates => Arc::new(MatchTemplatesTool),
    }
}

/// Create a registry with every built-in tool, in `ToolId::ALL` order.
///
/// Fails if a handler's name disagrees with its id.
pub fn default_registry() -> Result<ToolRegistry, Error> {
    let mut registry = ToolRegistry::new();
    for id in ToolId::ALL {
        let tool = handler(id);
        if tool.name() != id.name() {
            return Err(Error::Config {
                message: format!(
                    "tool id '{}' is handled by a tool named '{}'",
                    id.name(),
                    tool.name()
                ),
            });
        }
        registry.register(tool)?;
    }
    Ok(registry)
}

// ── Shared helpers ──

/// Deterministic hash used by the offline tool implementations.
pub(crate) fn seed(s: &str) -> u32 {
    s.bytes()
        .fold(0u32, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u32))
}

pub(crate) fn required_str<'a>(
    arguments: &'a serde_json::Value,
    key: &str,
) -> Result<&'a str, ToolError> {
    arguments[key]
        .as_str()
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| ToolError::InvalidArguments(format!("Missing '{key}' argument")))
}

/// Bytes with a PNG signature followed by `len` seeded filler bytes.
pub(crate) fn placeholder_png(key: &str, len: usize) -> Vec<u8> {
    const SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
    let mut state = seed(key) | 1;
    let mut bytes = Vec::with_capacity(SIGNATURE.len() + len);
    bytes.extend_from_slice(&SIGNATURE);
    bytes.extend((0..len).map(|_| {
        // xorshift32
        state ^= state << 13;
        state ^= state >> 17;
        state ^= state << 5;
        state as u8
    }));
    bytes
}
