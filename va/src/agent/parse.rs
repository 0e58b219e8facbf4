//! Turn a model reply into an AgentResponse
//!
//! Models are asked for `{"code": ..., "test": ...}` but do not always comply.
//! Parsing falls back from a bare JSON reply, to JSON in a json fence, to
//! fenced code blocks, to the raw text.

use serde::Deserialize;
use tracing::debug;

use super::AgentResponse;

#[derive(Debug, Deserialize)]
struct JsonReply {
    code: String,
    #[serde(default)]
    test: Option<String>,
}

/// A ``` fenced block: its info string and body
struct Fence<'a> {
    lang: &'a str,
    body: String,
}

/// Parse a model reply
pub fn parse_reply(text: &str) -> AgentResponse {
    debug!(len = text.len(), "parse_reply: called");
    let trimmed = text.trim();

    if let Some(reply) = parse_json(trimmed) {
        debug!("parse_reply: structured JSON reply");
        return reply.into_response();
    }

    let fences = fenced_blocks(trimmed);

    // JSON only counts inside a json (or untagged) fence; braces in code are code
    if let Some(reply) = fences
        .iter()
        .filter(|f| f.lang.is_empty() || f.lang.eq_ignore_ascii_case("json"))
        .find_map(|f| parse_json(f.body.trim()))
    {
        debug!("parse_reply: JSON reply inside a fence");
        return reply.into_response();
    }

    if !fences.is_empty() {
        debug!(count = fences.len(), "parse_reply: fenced code blocks");
        let mut bodies = fences.into_iter().map(|f| f.body);
        let code = bodies.next().unwrap_or_default();
        let test = bodies.next().unwrap_or_default();
        return AgentResponse::Structured { code, test };
    }

    debug!("parse_reply: raw reply");
    AgentResponse::Raw(trimmed.to_string())
}

impl JsonReply {
    fn into_response(self) -> AgentResponse {
        AgentResponse::Structured {
            code: self.code,
            test: self.test.unwrap_or_default(),
        }
    }
}

/// The whole text must be one JSON object
fn parse_json(text: &str) -> Option<JsonReply> {
    if !text.starts_with('{') {
        return None;
    }
    serde_json::from_str::<JsonReply>(text).ok()
}

/// Every ``` fenced block, in order
fn fenced_blocks(text: &str) -> Vec<Fence<'_>> {
    let mut blocks = Vec::new();
    let mut current: Option<(&str, Vec<&str>)> = None;

    for line in text.lines() {
        let stripped = line.trim_start();
        if let Some(info) = stripped.strip_prefix("```") {
            match current.take() {
                Some((lang, lines)) => blocks.push(Fence {
                    lang,
                    body: lines.join("\n"),
                }),
                None => current = Some((info.trim(), Vec::new())),
            }
        } else if let Some((_, lines)) = current.as_mut() {
            lines.push(line);
        }
    }

    // Unterminated trailing fence
    if let Some((lang, lines)) = current
        && !lines.is_empty()
    {
        blocks.push(Fence {
            lang,
            body: lines.join("\n"),
        });
    }

    blocks
}
