//! Placeholder substitution and program assembly
//!
//! Generated code refers to media through fixed literal paths. Before a
//! program runs, those literals are swapped for the operator's real paths.

use std::path::Path;

use tracing::debug;

use crate::config::RunnerConfig;

/// Literal path fragments that stand in for the real media paths
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholders {
    pub input: Vec<String>,
    pub output: Vec<String>,
}

impl Placeholders {
    pub fn from_config(config: &RunnerConfig) -> Self {
        Self {
            input: config.input_placeholders.clone(),
            output: config.output_placeholders.clone(),
        }
    }

    /// The placeholder advertised to the agent for the input image
    pub fn primary_input(&self) -> &str {
        self.input.first().map(String::as_str).unwrap_or_default()
    }

    /// The placeholder advertised to the agent for the output image
    pub fn primary_output(&self) -> &str {
        self.output.first().map(String::as_str).unwrap_or_default()
    }
}

impl Default for Placeholders {
    fn default() -> Self {
        Self::from_config(&RunnerConfig::default())
    }
}

/// Replace every placeholder occurrence with the real input/output path
///
/// A single left-to-right pass: at each position the earliest (then longest)
/// placeholder wins, and inserted paths are never scanned again. Idempotent
/// as long as neither real path contains a placeholder.
pub fn substitute_placeholders(text: &str, placeholders: &Placeholders, input: &Path, output: &Path) -> String {
    debug!(?input, ?output, "substitute_placeholders: called");
    let input = input.to_string_lossy();
    let output = output.to_string_lossy();

    let rules: Vec<(&str, &str)> = placeholders
        .input
        .iter()
        .map(|p| (p.as_str(), &*input))
        .chain(placeholders.output.iter().map(|p| (p.as_str(), &*output)))
        .filter(|(p, _)| !p.is_empty())
        .collect();

    let mut result = String::with_capacity(text.len());
    let mut rest = text;
    loop {
        let next = rules
            .iter()
            .filter_map(|(placeholder, path)| rest.find(placeholder).map(|at| (at, *placeholder, *path)))
            .min_by_key(|(at, placeholder, _)| (*at, std::cmp::Reverse(placeholder.len())));

        let Some((at, placeholder, path)) = next else {
            result.push_str(rest);
            return result;
        };
        result.push_str(&rest[..at]);
        result.push_str(path);
        rest = &rest[at + placeholder.len()..];
    }
}

/// Call appended to code-only programs so the generated function runs
///
/// Returns `None` unless the code returns a value from a top-level Python
/// function and has no `__main__` guard of its own. The call prints the
/// result of the last top-level function on the input placeholder.
pub fn entry_point_call(code: &str, input_placeholder: &str) -> Option<String> {
    if input_placeholder.is_empty() || !code.contains("return") || code.contains("__name__") {
        return None;
    }

    let name = code
        .lines()
        .filter_map(|line| line.strip_prefix("def "))
        .filter_map(|rest| rest.split_once('(').map(|(name, _)| name.trim()))
        .filter(|name| !name.is_empty() && !name.starts_with('_'))
        .last()?;
    debug!(%name, "entry_point_call: calling generated function");

    Some(format!(
        "if __name__ == '__main__':\n    print({}('{}'))",
        name, input_placeholder
    ))
}

/// Assemble the program that is actually executed
///
/// Layout: preamble, function code, then the test script when there is one.
/// Placeholders are substituted across the whole program.
pub fn assemble_program(
    preamble: &str,
    code: &str,
    test: Option<&str>,
    placeholders: &Placeholders,
    input: &Path,
    output: &Path,
) -> String {
    debug!(has_test = test.is_some(), "assemble_program: called");
    let mut program = String::new();

    let preamble = preamble.trim_end();
    if !preamble.is_empty() {
        program.push_str(preamble);
        program.push_str("\n\n");
    }

    program.push_str(code.trim_end());
    program.push('\n');

    if let Some(test) = test {
        program.push('\n');
        program.push_str(test.trim_end());
        program.push('\n');
    }

    substitute_placeholders(&program, placeholders, input, output)
}
