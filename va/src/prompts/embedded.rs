//! Embedded prompts
//!
//! These are compiled into the binary from .pmt files at build time.

use tracing::debug;

/// System prompt for code generation
pub const GENERATE: &str = include_str!("../../prompts/generate.pmt");

/// Follow-up prompt sent when a test run fails
pub const CORRECT: &str = include_str!("../../prompts/correct.pmt");

/// Get the embedded prompt by name
pub fn get_embedded(name: &str) -> Option<&'static str> {
    debug!(%name, "get_embedded: called");
    match name {
        "generate" => Some(GENERATE),
        "correct" => Some(CORRECT),
        _ => {
            debug!("get_embedded: no match found");
            None
        }
    }
}
