//! LLM Provider trait

use crate::types::LlmRequest;

/// Result type for LLM operations
pub type LlmResult<T> = Result<T, LlmError>;

/// LLM error types
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("request failed: {0}")]
    RequestFailed(String),

    #[error("authentication failed: {0}")]
    AuthFailed(String),

    #[error("rate limited: retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("timed out after {0}ms")]
    Timeout(u64),

    #[error("network error: {0}")]
    NetworkError(#[from] reqwest::Error),
}

impl LlmError {
    /// Worth trying again later, as opposed to a broken request or key.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            LlmError::RateLimited { .. } | LlmError::Timeout(_) | LlmError::NetworkError(_)
        )
    }
}

impl From<LlmError> for archivefever_core::Error {
    fn from(err: LlmError) -> Self {
        archivefever_core::Error::llm_error("llm", err.to_string())
    }
}

/// LLM Provider trait
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Run a single non-streaming completion and return the concatenated
    /// text blocks of the response.
    async fn complete(&self, request: LlmRequest) -> LlmResult<String>;
}
