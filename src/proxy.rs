//! Callable haiku endpoint.
//!
//! Transport-agnostic handler for the server-side generation endpoint:
//! verify the caller, validate the payload, forward to the collaborator
//! and wrap the reply in the wire envelope. Mounting [`ProxyHandler`] on
//! an HTTP server is deployment glue and lives outside this crate; the
//! status code and error code for a failure come from
//! [`ProxyError::status_code`] and [`ProxyError::code`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::ProxyError;
use crate::llm::{HaikuProvider, HaikuRequest, Usage};
use crate::session::engine::MAX_PROMPT_CHARS;

/// Request payload for the haiku endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HaikuCallRequest {
    pub user_prompt: String,
    pub system_instruction: String,
    /// Correlation id for logs; opaque to the endpoint.
    pub session_id: String,
}

/// Response envelope for the haiku endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HaikuCallResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<HaikuCallData>,
    /// Machine-readable error code on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Human-readable failure description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl HaikuCallResponse {
    /// Failure envelope for an error.
    pub fn from_error(err: &ProxyError) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(err.code().to_string()),
            message: Some(err.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HaikuCallData {
    pub response_text: String,
    pub usage_metadata: UsageMetadata,
}

/// Token counters in the upstream service's wire naming, so browser and
/// CLI clients read the same fields either way they reach the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageMetadata {
    #[serde(rename = "promptTokenCount")]
    pub prompt_token_count: u32,
    #[serde(rename = "candidatesTokenCount")]
    pub candidates_token_count: u32,
    #[serde(rename = "totalTokenCount")]
    pub total_token_count: u32,
}

impl From<Usage> for UsageMetadata {
    fn from(usage: Usage) -> Self {
        Self {
            prompt_token_count: usage.prompt_tokens,
            candidates_token_count: usage.output_tokens,
            total_token_count: usage.total_tokens,
        }
    }
}

/// Capability for resolving a caller's bearer token to an identity.
#[async_trait]
pub trait CallerVerifier: Send + Sync {
    /// Resolve `token` to a caller id, or fail as unauthenticated.
    async fn verify(&self, token: Option<&str>) -> Result<String, ProxyError>;
}

/// The haiku endpoint handler.
pub struct ProxyHandler {
    provider: Arc<dyn HaikuProvider>,
    verifier: Arc<dyn CallerVerifier>,
}

impl ProxyHandler {
    pub fn new(provider: Arc<dyn HaikuProvider>, verifier: Arc<dyn CallerVerifier>) -> Self {
        Self { provider, verifier }
    }

    /// Run one call end to end. Verification runs before validation, and
    /// validation before any upstream traffic.
    pub async fn handle(
        &self,
        token: Option<&str>,
        request: HaikuCallRequest,
    ) -> Result<HaikuCallResponse, ProxyError> {
        let caller = self.verifier.verify(token).await?;
        validate(&request)?;

        info!(
            caller = %caller,
            session = %request.session_id,
            prompt_chars = request.user_prompt.chars().count(),
            "haiku generation requested"
        );

        let reply = self
            .provider
            .generate_haiku(HaikuRequest {
                system_instruction: request.system_instruction,
                user_prompt: request.user_prompt,
            })
            .await
            .map_err(|err| {
                warn!(session = %request.session_id, error = %err, "upstream haiku call failed");
                ProxyError::Upstream(err)
            })?;

        Ok(HaikuCallResponse {
            success: true,
            data: Some(HaikuCallData {
                response_text: reply.text,
                usage_metadata: reply.usage.into(),
            }),
            error: None,
            message: None,
        })
    }
}

fn validate(request: &HaikuCallRequest) -> Result<(), ProxyError> {
    if request.user_prompt.trim().is_empty() {
        return Err(ProxyError::InvalidArgument(
            "userPrompt is required".to_string(),
        ));
    }
    if request.user_prompt.chars().count() > MAX_PROMPT_CHARS {
        return Err(ProxyError::InvalidArgument(format!(
            "userPrompt must be {} characters or less",
            MAX_PROMPT_CHARS
        )));
    }
    if request.system_instruction.trim().is_empty() {
        return Err(ProxyError::InvalidArgument(
            "systemInstruction is required".to_string(),
        ));
    }
    Ok(())
}
