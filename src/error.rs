//! Error types for wordveil operations.
//!
//! Defines error types for all major subsystems:
//! - Puzzle derivation from date keys
//! - Game session transitions
//! - Generative-text API interactions
//! - Daily puzzle persistence
//! - Session export
//! - Proxy endpoint validation

use thiserror::Error;

/// Errors that can occur during puzzle derivation.
#[derive(Debug, Error)]
pub enum PuzzleError {
    #[error("Invalid date key '{0}': expected a canonical YYYY-MM-DD calendar date")]
    InvalidDateKey(String),
}

/// Errors that can occur during session transitions.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Prompt is empty after trimming")]
    EmptyPrompt,

    #[error("Prompt is {length} characters, limit is {limit}")]
    PromptTooLong { length: usize, limit: usize },

    #[error("Session is over; a new calendar day starts a fresh session")]
    SessionOver,

    #[error("Generative-text call failed: {0}")]
    Provider(#[from] LlmError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors that can occur during generative-text operations.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Missing API key: GEMINI_API_KEY environment variable not set")]
    MissingApiKey,

    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Response contained no candidate text")]
    EmptyResponse,

    #[error("API error ({code}): {message}")]
    ApiError { code: u16, message: String },
}

/// Errors that can occur during daily puzzle persistence.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("No puzzle stored for date '{0}'")]
    NotFound(String),

    #[error("Puzzle derivation failed: {0}")]
    Derivation(#[from] PuzzleError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors that can occur during session export.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors returned by the callable proxy endpoint.
///
/// Maps onto the HTTP contract: 400 for malformed input, 401 for a missing
/// or expired caller identity, 500 for upstream or configuration failure.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Caller identity missing or expired")]
    Unauthenticated,

    #[error("Upstream failure: {0}")]
    Upstream(#[from] LlmError),
}

impl ProxyError {
    /// HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            ProxyError::InvalidArgument(_) => 400,
            ProxyError::Unauthenticated => 401,
            ProxyError::Upstream(_) => 500,
        }
    }

    /// Stable error code string exposed in the response envelope.
    pub fn code(&self) -> &'static str {
        match self {
            ProxyError::InvalidArgument(_) => "invalid-argument",
            ProxyError::Unauthenticated => "unauthenticated",
            ProxyError::Upstream(_) => "internal",
        }
    }
}
