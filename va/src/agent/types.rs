//! Agent request/response types

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// One operator turn: what to do and which media to do it on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRequest {
    pub instruction: String,
    pub media: Vec<PathBuf>,
}

impl TaskRequest {
    pub fn new(instruction: impl Into<String>, media: Vec<PathBuf>) -> Self {
        Self {
            instruction: instruction.into(),
            media,
        }
    }

    /// The message that opens the agent conversation for this task
    pub fn to_message(&self) -> AgentMessage {
        AgentMessage::user(self.instruction.clone(), self.media.clone())
    }
}

/// Who sent an agent message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentRole {
    User,
    Assistant,
}

/// A chat message in the agent workflow: `{role, content, media}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentMessage {
    pub role: AgentRole,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub media: Vec<PathBuf>,
}

impl AgentMessage {
    pub fn user(content: impl Into<String>, media: Vec<PathBuf>) -> Self {
        Self {
            role: AgentRole::User,
            content: content.into(),
            media,
        }
    }

    /// Record a previous answer so follow-up requests see what was generated
    pub fn assistant(generated: &GeneratedCode) -> Self {
        debug!(has_test = generated.test.is_some(), "AgentMessage::assistant: called");
        let content = serde_json::json!({
            "code": generated.code,
            "test": generated.test.clone().unwrap_or_default(),
        })
        .to_string();

        Self {
            role: AgentRole::Assistant,
            content,
            media: Vec::new(),
        }
    }
}

/// What the agent hands back: a structured code/test pair or a bare string
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentResponse {
    Structured { code: String, test: String },
    Raw(String),
}

/// Normalized agent output for one attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedCode {
    pub code: String,
    pub test: Option<String>,
}

impl From<AgentResponse> for GeneratedCode {
    fn from(response: AgentResponse) -> Self {
        match response {
            AgentResponse::Structured { code, test } => {
                let test = if test.trim().is_empty() { None } else { Some(test) };
                Self { code, test }
            }
            AgentResponse::Raw(code) => Self { code, test: None },
        }
    }
}
