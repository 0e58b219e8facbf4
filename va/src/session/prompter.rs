//! Operator input

use std::collections::VecDeque;

use colored::Colorize;
use eyre::Result;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing::debug;

/// Source of operator answers
///
/// `Ok(None)` means the operator is gone (end of input) and the session
/// should stop.
pub trait Prompter {
    fn read_line(&mut self, prompt: &str) -> Result<Option<String>>;
}

/// Interactive prompter with line editing and history
pub struct ReadlinePrompter {
    editor: DefaultEditor,
}

impl ReadlinePrompter {
    pub fn new() -> Result<Self> {
        let editor = DefaultEditor::new().map_err(|e| eyre::eyre!("Failed to initialize readline: {}", e))?;
        Ok(Self { editor })
    }
}

impl Prompter for ReadlinePrompter {
    fn read_line(&mut self, prompt: &str) -> Result<Option<String>> {
        match self.editor.readline(&format!("{} ", prompt.bright_green())) {
            Ok(line) => {
                if !line.trim().is_empty() {
                    let _ = self.editor.add_history_entry(line.as_str());
                }
                Ok(Some(line))
            }
            Err(ReadlineError::Interrupted) => {
                // Ctrl+C - treat like Ctrl+D and leave the session
                println!("^C");
                Ok(None)
            }
            Err(ReadlineError::Eof) => {
                println!();
                Ok(None)
            }
            Err(err) => Err(eyre::eyre!("Readline error: {}", err)),
        }
    }
}

/// Prompter that replays a fixed list of answers
///
/// Returns `None` once the script runs out. Records every prompt it was
/// asked so callers can check the conversation.
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    answers: VecDeque<String>,
    prompts: Vec<String>,
}

impl ScriptedPrompter {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: answers.into_iter().map(Into::into).collect(),
            prompts: Vec::new(),
        }
    }

    /// Prompts shown so far, oldest first
    pub fn prompts(&self) -> &[String] {
        &self.prompts
    }

    /// Answers not yet consumed
    pub fn remaining(&self) -> usize {
        self.answers.len()
    }
}

impl Prompter for ScriptedPrompter {
    fn read_line(&mut self, prompt: &str) -> Result<Option<String>> {
        self.prompts.push(prompt.to_string());
        let answer = self.answers.pop_front();
        debug!(%prompt, ?answer, "ScriptedPrompter::read_line: called");
        Ok(answer)
    }
}
