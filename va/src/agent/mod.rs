//! Code-synthesis agent
//!
//! The session only depends on the [`Agent`] trait: hand it the workflow
//! messages for the current task and get back generated code, optionally
//! with a test. [`LlmAgent`] is the production implementation.

use async_trait::async_trait;

mod error;
mod llm_agent;
pub mod parse;
mod types;

pub use error::AgentError;
pub use llm_agent::LlmAgent;
pub use types::{AgentMessage, AgentResponse, AgentRole, GeneratedCode, TaskRequest};

/// Capability interface for anything that can turn a task into code
///
/// Implementations are stateless: every call receives the full message list
/// for the task, oldest first.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Generate code for the conversation so far
    async fn chat_with_workflow(&self, messages: &[AgentMessage]) -> Result<AgentResponse, AgentError>;
}
