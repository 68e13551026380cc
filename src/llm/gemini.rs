//! Gemini client for haiku generation.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

use crate::error::LlmError;

/// Default generateContent endpoint.
pub const DEFAULT_API_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent";

/// One haiku generation request: the persona instruction plus the
/// player's prompt.
#[derive(Debug, Clone)]
pub struct HaikuRequest {
    pub system_instruction: String,
    pub user_prompt: String,
}

/// Token counters reported by the service for one call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Usage {
    pub prompt_tokens: u32,
    pub output_tokens: u32,
    pub total_tokens: u32,
}

/// A generated reply with its token usage.
#[derive(Debug, Clone)]
pub struct HaikuReply {
    pub text: String,
    pub usage: Usage,
}

/// Trait for haiku collaborators.
#[async_trait]
pub trait HaikuProvider: Send + Sync {
    /// Generate a reply for the given request.
    async fn generate_haiku(&self, request: HaikuRequest) -> Result<HaikuReply, LlmError>;
}

/// Client for the Gemini generateContent API.
pub struct GeminiClient {
    api_url: String,
    api_key: String,
    http_client: Client,
}

impl GeminiClient {
    /// Create a new client for an explicit endpoint and key.
    pub fn new(api_url: String, api_key: String) -> Self {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            api_url,
            api_key,
            http_client,
        }
    }

    /// Create a client from `GEMINI_API_KEY`, with `GEMINI_API_URL` as an
    /// optional endpoint override.
    pub fn from_env() -> Result<Self, LlmError> {
        let api_key = env::var("GEMINI_API_KEY").map_err(|_| LlmError::MissingApiKey)?;
        let api_url = env::var("GEMINI_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());
        Ok(Self::new(api_url, api_key))
    }

    /// The endpoint this client calls.
    pub fn api_url(&self) -> &str {
        &self.api_url
    }
}

#[async_trait]
impl HaikuProvider for GeminiClient {
    async fn generate_haiku(&self, request: HaikuRequest) -> Result<HaikuReply, LlmError> {
        let api_request = ApiRequest {
            system_instruction: ApiContent {
                parts: vec![ApiPart {
                    text: request.system_instruction,
                }],
            },
            contents: vec![ApiContent {
                parts: vec![ApiPart {
                    text: request.user_prompt,
                }],
            }],
        };

        let response = self
            .http_client
            .post(&self.api_url)
            .header("Content-Type", "application/json")
            .header("x-goog-api-key", &self.api_key)
            .json(&api_request)
            .send()
            .await
            .map_err(|e| LlmError::RequestFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            let message = serde_json::from_str::<ApiErrorBody>(&error_text)
                .map(|body| body.error.message)
                .unwrap_or(error_text);
            if status.as_u16() == 429 {
                return Err(LlmError::RateLimited(message));
            }
            return Err(LlmError::ApiError {
                code: status.as_u16(),
                message,
            });
        }

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| LlmError::ParseError(format!("Failed to parse API response: {}", e)))?;

        reply_from_response(api_response)
    }
}

fn reply_from_response(response: ApiResponse) -> Result<HaikuReply, LlmError> {
    let text = response
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
        .and_then(|content| content.parts.into_iter().next())
        .map(|part| part.text)
        .ok_or(LlmError::EmptyResponse)?;

    let usage = response.usage_metadata.unwrap_or_default();
    Ok(HaikuReply {
        text,
        usage: Usage {
            prompt_tokens: usage.prompt_token_count,
            output_tokens: usage.candidates_token_count,
            total_tokens: usage.total_token_count,
        },
    })
}

// Wire types for the generateContent API.

#[derive(Debug, Serialize)]
struct ApiRequest {
    system_instruction: ApiContent,
    contents: Vec<ApiContent>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiContent {
    parts: Vec<ApiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiPart {
    text: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    candidates: Vec<ApiCandidate>,
    #[serde(rename = "usageMetadata")]
    usage_metadata: Option<ApiUsageMetadata>,
}

#[derive(Debug, Deserialize)]
struct ApiCandidate {
    content: Option<ApiContent>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiUsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
    #[serde(default)]
    total_token_count: u32,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}
