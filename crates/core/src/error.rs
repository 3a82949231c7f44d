//! Error types for the Deckr domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all Deckr operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Errors raised at the model boundary.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Malformed model output: {0}")]
    MalformedOutput(String),
}

impl ProviderError {
    /// Whether this error is a transient upstream condition worth retrying.
    ///
    /// Server-side faults, rate limiting, timeouts and dropped or refused
    /// connections qualify. Bad input, authentication, missing models, missing
    /// configuration and malformed output fail immediately.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ApiError { status_code, .. } => (500..600).contains(status_code),
            Self::RateLimited { .. } | Self::Timeout(_) | Self::Network(_) => true,
            Self::AuthenticationFailed(_)
            | Self::ModelNotFound(_)
            | Self::InvalidRequest(_)
            | Self::NotConfigured(_)
            | Self::MalformedOutput(_) => false,
        }
    }
}

/// Errors raised by tool lookup and execution.
///
/// These never escape the execution loop: the executor folds them into a
/// failed `ToolResult` that the model can react to.
#[derive(Debug, Clone, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Tool timed out: {tool_name} after {timeout_secs}s")]
    Timeout { tool_name: String, timeout_secs: u64 },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_displays_correctly() {
        let err = Error::Provider(ProviderError::ApiError {
            status_code: 503,
            message: "backend unavailable".into(),
        });
        assert!(err.to_string().contains("503"));
        assert!(err.to_string().contains("backend unavailable"));
    }

    #[test]
    fn server_faults_are_retryable() {
        assert!(
            ProviderError::ApiError {
                status_code: 500,
                message: "INTERNAL".into()
            }
            .is_retryable()
        );
        assert!(ProviderError::RateLimited { retry_after_secs: 1 }.is_retryable());
        assert!(ProviderError::Timeout("slow".into()).is_retryable());
        assert!(ProviderError::Network("connection reset by peer".into()).is_retryable());
    }

    #[test]
    fn client_faults_are_fatal() {
        assert!(
            !ProviderError::ApiError {
                status_code: 400,
                message: "bad".into()
            }
            .is_retryable()
        );
        assert!(!ProviderError::AuthenticationFailed("nope".into()).is_retryable());
        assert!(!ProviderError::ModelNotFound("x".into()).is_retryable());
        assert!(!ProviderError::MalformedOutput("garbage".into()).is_retryable());
        assert!(!ProviderError::NotConfigured("no api key".into()).is_retryable());
    }

    #[test]
    fn tool_error_displays_correctly() {
        let err = Error::Tool(ToolError::ExecutionFailed {
            tool_name: "fetch_logo".into(),
            reason: "no logo on file".into(),
        });
        assert!(err.to_string().contains("fetch_logo"));
        assert!(err.to_string().contains("no logo"));
    }
}
