//! Gemini native provider implementation.
//!
//! Uses the `generateContent` REST endpoint directly.
//!
//! Mapping:
//! - `x-goog-api-key` header authentication
//! - System framing as the top-level `systemInstruction`
//! - Tool invocations as `functionCall` parts, with the continuation token
//!   carried in the sibling `thoughtSignature` field
//! - Tool outputs as `functionResponse` parts in a user turn
//! - Tools advertised through `functionDeclarations`

use async_trait::async_trait;
use deckr_core::error::ProviderError;
use deckr_core::message::{ContentBlock, ContinuationToken, Message, Role};
use deckr_core::provider::{ModelRequest, ModelResponse, Provider, ToolDefinition, Usage};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_TIMEOUT_SECS: u64 = 120;
/// Wait used for a 429 that carries no usable `Retry-After` header.
const DEFAULT_RETRY_AFTER_SECS: u64 = 5;

/// Gemini `generateContent` provider.
pub struct GeminiProvider {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl GeminiProvider {
    /// Create a new Gemini provider.
    pub fn new(api_key: impl Into<String>) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(|e| ProviderError::NotConfigured(format!("HTTP client: {e}")))?;

        Ok(Self {
            base_url: DEFAULT_BASE_URL.into(),
            api_key: api_key.into(),
            client,
        })
    }

    /// Create with a custom base URL (e.g., for testing or proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/v1beta/models/{model}:generateContent", self.base_url)
    }

    /// Build the wire request body.
    fn to_api_request(request: &ModelRequest) -> GenerateContentRequest {
        let system_instruction = (!request.system.is_empty()).then(|| GeminiContent {
            role: None,
            parts: vec![Part::text(&request.system)],
        });

        let contents = request.messages.iter().map(Self::to_api_content).collect();

        let tools = if request.tools.is_empty() {
            Vec::new()
        } else {
            vec![GeminiTool {
                function_declarations: request.tools.iter().map(Self::to_declaration).collect(),
            }]
        };

        GenerateContentRequest {
            system_instruction,
            contents,
            tools,
            generation_config: GenerationConfig {
                temperature: request.temperature,
                max_output_tokens: request.max_tokens,
            },
        }
    }

    fn to_api_content(message: &Message) -> GeminiContent {
        let role = match message.role {
            Role::User => "user",
            Role::Model => "model",
        };

        let parts = message
            .blocks
            .iter()
            .map(|block| match block {
                ContentBlock::Text { text } => Part::text(text),
                ContentBlock::ToolInvocation {
                    name,
                    arguments,
                    continuation,
                    ..
                } => Part {
                    function_call: Some(FunctionCall {
                        name: name.clone(),
                        args: arguments.clone(),
                    }),
                    thought_signature: continuation.as_ref().map(|c| c.0.clone()),
                    ..Part::default()
                },
                ContentBlock::ToolOutput { name, payload, .. } => Part {
                    function_response: Some(FunctionResponse {
                        name: name.clone(),
                        response: payload.clone(),
                    }),
                    ..Part::default()
                },
            })
            .collect();

        GeminiContent {
            role: Some(role.into()),
            parts,
        }
    }

    fn to_declaration(tool: &ToolDefinition) -> FunctionDeclaration {
        FunctionDeclaration {
            name: tool.name.clone(),
            description: tool.description.clone(),
            parameters: tool.parameters.clone(),
        }
    }

    /// Convert a wire response into one model turn.
    ///
    /// Function calls get ids `call_0`, `call_1`, ... in the order they appear.
    /// Parts flagged as `thought` are internal reasoning and are dropped.
    /// A candidate left with no usable parts (blocked by a safety filter,
    /// stopped for recitation, ...) is malformed output, never an empty answer.
    fn from_api_response(
        resp: GenerateContentResponse,
        requested_model: &str,
    ) -> Result<ModelResponse, ProviderError> {
        let candidate = resp.candidates.into_iter().next().ok_or_else(|| {
            ProviderError::MalformedOutput(match &resp.prompt_feedback {
                Some(feedback) => format!("no candidates returned (prompt feedback: {feedback})"),
                None => "no candidates returned".into(),
            })
        })?;

        let finish_reason = candidate.finish_reason;
        let mut blocks = Vec::new();
        let mut next_call = 0usize;
        for part in candidate.content.map(|c| c.parts).unwrap_or_default() {
            if part.thought == Some(true) {
                continue;
            }
            if let Some(call) = part.function_call {
                blocks.push(ContentBlock::ToolInvocation {
                    id: format!("call_{next_call}"),
                    name: call.name,
                    arguments: call.args,
                    continuation: part.thought_signature.map(ContinuationToken),
                });
                next_call += 1;
            } else if let Some(text) = part.text {
                blocks.push(ContentBlock::Text { text });
            }
        }

        if blocks.is_empty() {
            return Err(ProviderError::MalformedOutput(format!(
                "candidate has no content (finish reason: {})",
                finish_reason.as_deref().unwrap_or("unspecified")
            )));
        }

        let usage = resp.usage_metadata.map(|u| Usage {
            prompt_tokens: u.prompt_token_count,
            completion_tokens: u.candidates_token_count,
            total_tokens: u.total_token_count,
        });

        Ok(ModelResponse {
            message: Message {
                role: Role::Model,
                blocks,
            },
            usage,
            model: resp
                .model_version
                .unwrap_or_else(|| requested_model.to_string()),
        })
    }

    /// Classify a non-success HTTP status.
    fn status_error(status: u16, retry_after: Option<u64>, body: String) -> ProviderError {
        match status {
            429 => ProviderError::RateLimited {
                retry_after_secs: retry_after.unwrap_or(DEFAULT_RETRY_AFTER_SECS),
            },
            401 | 403 => ProviderError::AuthenticationFailed("Invalid Gemini API key".into()),
            404 => ProviderError::ModelNotFound(body),
            400 => ProviderError::InvalidRequest(body),
            _ => ProviderError::ApiError {
                status_code: status,
                message: body,
            },
        }
    }
}

#[async_trait]
impl Provider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn complete(&self, request: ModelRequest) -> Result<ModelResponse, ProviderError> {
        let url = self.endpoint(&request.model);
        let body = Self::to_api_request(&request);

        debug!(
            provider = "gemini",
            model = %request.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "Sending generateContent request"
        );

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(e.to_string())
                } else if e.is_builder() {
                    ProviderError::InvalidRequest(e.to_string())
                } else {
                    ProviderError::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();
        if status != 200 {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok());
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Gemini API error");
            return Err(Self::status_error(status, retry_after, error_body));
        }

        let api_resp: GenerateContentResponse = response.json().await.map_err(|e| {
            ProviderError::MalformedOutput(format!("Failed to parse Gemini response: {e}"))
        })?;

        Self::from_api_response(api_resp, &request.model)
    }
}

// --- Gemini API types ---

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<GeminiTool>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_call: Option<FunctionCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_response: Option<FunctionResponse>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    thought_signature: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    thought: Option<bool>,
}

impl Part {
    fn text(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct FunctionCall {
    name: String,
    #[serde(default)]
    args: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct FunctionResponse {
    name: String,
    response: serde_json::Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiTool {
    function_declarations: Vec<FunctionDeclaration>,
}

#[derive(Debug, Serialize)]
struct FunctionDeclaration {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
    #[serde(default)]
    model_version: Option<String>,
    #[serde(default)]
    prompt_feedback: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<GeminiContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
    #[serde(default)]
    total_token_count: u32,
}
