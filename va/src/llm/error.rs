//! LLM error types

use std::time::Duration;
use thiserror::Error;

/// Backoff before the first retry of a transient failure
const BASE_BACKOFF: Duration = Duration::from_secs(1);

/// Longest we are willing to honour a server's `retry-after`
const MAX_RETRY_AFTER: Duration = Duration::from_secs(30);

/// Errors raised while talking to a chat-completions endpoint
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Rate limited by provider (retry after {retry_after:?})")]
    RateLimited { retry_after: Duration },

    #[error("Provider returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Malformed provider reply: {0}")]
    InvalidResponse(String),

    #[error("Unknown LLM provider '{0}' (supported: openai)")]
    UnknownProvider(String),
}

impl LlmError {
    /// Whether sending the same request again may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::RateLimited { .. } | LlmError::Network(_) | LlmError::Timeout(_) => true,
            LlmError::Http { status, .. } => matches!(status, 408 | 500 | 502 | 503 | 504),
            LlmError::InvalidResponse(_) | LlmError::UnknownProvider(_) => false,
        }
    }

    /// How long to wait before retry number `attempt` (1-based)
    ///
    /// Rate limits use the server's hint, capped; everything else backs off
    /// exponentially.
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        match self {
            LlmError::RateLimited { retry_after } => (*retry_after).min(MAX_RETRY_AFTER),
            _ => BASE_BACKOFF * 2u32.saturating_pow(attempt.saturating_sub(1)),
        }
    }
}
