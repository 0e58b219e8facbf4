//! Agent backed by a vision-capable chat model

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tracing::{debug, info, warn};

use super::parse::parse_reply;
use super::{Agent, AgentError, AgentMessage, AgentResponse, AgentRole};
use crate::config::Config;
use crate::llm::{CompletionRequest, ContentPart, LlmClient, Message, StopReason};
use crate::prompts::{GenerationContext, PromptLoader};

/// Generates code by prompting an LLM with the task and attached images
pub struct LlmAgent {
    llm: Arc<dyn LlmClient>,
    system_prompt: String,
    max_tokens: u32,
    temperature: f32,
}

impl LlmAgent {
    /// Build an agent with an already-rendered system prompt
    pub fn new(llm: Arc<dyn LlmClient>, system_prompt: String, max_tokens: u32, temperature: f32) -> Self {
        debug!(system_prompt_len = system_prompt.len(), max_tokens, "LlmAgent::new: called");
        Self {
            llm,
            system_prompt,
            max_tokens,
            temperature,
        }
    }

    /// Build an agent whose system prompt reflects the runner's preamble and placeholders
    pub fn from_config(llm: Arc<dyn LlmClient>, config: &Config, prompts: &PromptLoader) -> Result<Self, AgentError> {
        debug!("LlmAgent::from_config: called");
        let context = GenerationContext {
            preamble: config.runner.preamble.trim().to_string(),
            input_placeholder: first_or_default(&config.runner.input_placeholders),
            output_placeholder: first_or_default(&config.runner.output_placeholders),
        };
        let system_prompt = prompts
            .generation_prompt(&context)
            .map_err(|e| AgentError::Prompt(e.to_string()))?;

        Ok(Self::new(
            llm,
            system_prompt,
            config.agent.max_tokens,
            config.agent.temperature,
        ))
    }

    /// Convert workflow messages into LLM messages, inlining images
    async fn convert_messages(&self, messages: &[AgentMessage]) -> Result<Vec<Message>, AgentError> {
        debug!(count = messages.len(), "LlmAgent::convert_messages: called");
        let mut converted = Vec::with_capacity(messages.len());

        for msg in messages {
            match msg.role {
                AgentRole::Assistant => converted.push(Message::assistant(msg.content.clone())),
                AgentRole::User if msg.media.is_empty() => converted.push(Message::user(msg.content.clone())),
                AgentRole::User => {
                    let listing: Vec<String> = msg.media.iter().map(|p| p.display().to_string()).collect();
                    let mut parts = vec![ContentPart::text(format!(
                        "{}\n\nMedia files: {}",
                        msg.content,
                        listing.join(", ")
                    ))];
                    for path in &msg.media {
                        if let Some(url) = image_data_url(path).await? {
                            parts.push(ContentPart::image_url(url));
                        }
                    }
                    converted.push(Message::user_parts(parts));
                }
            }
        }

        Ok(converted)
    }
}

#[async_trait]
impl Agent for LlmAgent {
    async fn chat_with_workflow(&self, messages: &[AgentMessage]) -> Result<AgentResponse, AgentError> {
        debug!(count = messages.len(), "LlmAgent::chat_with_workflow: called");
        let request = CompletionRequest {
            system_prompt: self.system_prompt.clone(),
            messages: self.convert_messages(messages).await?,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        let response = self.llm.complete(request).await?;
        info!(
            input_tokens = response.usage.input_tokens,
            output_tokens = response.usage.output_tokens,
            "agent reply received"
        );
        if response.stop_reason == StopReason::MaxTokens {
            warn!("LlmAgent::chat_with_workflow: reply truncated at max tokens");
        }

        match response.content {
            Some(text) if !text.trim().is_empty() => Ok(parse_reply(&text)),
            _ => Err(AgentError::EmptyReply),
        }
    }
}

fn first_or_default(values: &[String]) -> String {
    values.first().cloned().unwrap_or_default()
}

/// MIME type for image extensions the chat API accepts
fn image_mime(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}

/// Read an image into a `data:` URL; non-image media is only listed by name
async fn image_data_url(path: &Path) -> Result<Option<String>, AgentError> {
    let Some(mime) = image_mime(path) else {
        warn!(?path, "image_data_url: not an inline image type, sending path only");
        return Ok(None);
    };

    let bytes = tokio::fs::read(path).await.map_err(|source| AgentError::Media {
        path: path.display().to_string(),
        source,
    })?;
    debug!(?path, size = bytes.len(), "image_data_url: encoded image");
    Ok(Some(format!("data:{};base64,{}", mime, STANDARD.encode(bytes))))
}
