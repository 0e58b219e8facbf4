//! Agent error types

use thiserror::Error;

use crate::llm::LlmError;

/// Errors raised while asking the agent for code
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("LLM request failed: {0}")]
    Llm(#[from] LlmError),

    #[error("Agent returned an empty reply")]
    EmptyReply,

    #[error("Failed to read media file {path}: {source}")]
    Media {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to render prompt: {0}")]
    Prompt(String),
}
