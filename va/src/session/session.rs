//! Interactive code-synthesis session

use std::path::{Path, PathBuf};
use std::sync::Arc;

use colored::Colorize;
use eyre::Result;
use tracing::{debug, info, warn};

use super::Prompter;
use crate::agent::{Agent, AgentMessage, GeneratedCode, TaskRequest};
use crate::config::{Config, RunnerConfig};
use crate::prompts::{CorrectionContext, PromptLoader};
use crate::runner::{CodeRunner, ExecutionResult, Placeholders, assemble_program, entry_point_call};

const TASK_PROMPT: &str = "What would you like to do? (or type 'exit' to quit):";
const INPUT_PROMPT: &str = "Enter the input media path(s) (comma-separated):";
const OUTPUT_PROMPT: &str = "Enter the output media path:";
const EXECUTE_PROMPT: &str = "Execute this code? (yes/no):";
const CONTINUE_PROMPT: &str = "Do you want to continue? (yes/no):";

/// Knobs that shape a turn, resolved from configuration
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Import line prepended to every executed program
    pub preamble: String,
    pub placeholders: Placeholders,
    /// Maximum test executions per turn
    pub max_attempts: u32,
    /// Ask before the first execution of a turn
    pub confirm_execution: bool,
    /// Call the generated function when code arrives without a test
    pub entry_call: bool,
}

impl SessionSettings {
    pub fn from_config(config: &RunnerConfig) -> Self {
        Self {
            preamble: config.preamble.clone(),
            placeholders: Placeholders::from_config(config),
            max_attempts: config.max_attempts.max(1),
            confirm_execution: config.confirm_execution,
            entry_call: config.entry_call,
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from_config(&RunnerConfig::default())
    }
}

/// How a single turn ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// Operator typed `exit` or closed input
    Exit,
    /// Operator input was rejected before the agent was called
    InvalidInput { reason: String },
    /// Turn abandoned because of an agent, runner or filesystem error
    Aborted { reason: String },
    /// Generated test passed after this many executions
    Passed { attempts: u32 },
    /// Every allowed execution of the generated test failed
    Failed { attempts: u32, last_error: String },
    /// No test was generated; the code ran once
    Executed { stdout: String },
    /// Operator declined to execute the generated code
    Skipped,
}

/// Real paths for the current turn
struct MediaPaths {
    input: PathBuf,
    output: PathBuf,
}

/// Interactive session: prompt, generate, execute, correct, repeat
pub struct Session {
    agent: Arc<dyn Agent>,
    runner: CodeRunner,
    prompts: PromptLoader,
    settings: SessionSettings,
}

impl Session {
    pub fn new(agent: Arc<dyn Agent>, runner: CodeRunner, prompts: PromptLoader, settings: SessionSettings) -> Self {
        debug!(?settings, interpreter = %runner.interpreter(), "Session::new: called");
        Self {
            agent,
            runner,
            prompts,
            settings,
        }
    }

    /// Build a session from loaded configuration
    pub fn from_config(agent: Arc<dyn Agent>, config: &Config, prompts: PromptLoader) -> Self {
        Self::new(
            agent,
            CodeRunner::from_config(&config.runner),
            prompts,
            SessionSettings::from_config(&config.runner),
        )
    }

    /// Run turns until the operator exits
    pub async fn run(&mut self, prompter: &mut dyn Prompter) -> Result<()> {
        self.print_welcome();

        loop {
            let outcome = self.run_turn(prompter).await?;
            info!(?outcome, "turn finished");

            match outcome {
                TurnOutcome::Exit => break,
                // Bad input goes straight back to the task prompt
                TurnOutcome::InvalidInput { .. } => continue,
                _ => {}
            }

            match prompter.read_line(CONTINUE_PROMPT)? {
                Some(answer) if is_no(&answer) => break,
                Some(_) => continue,
                None => break,
            }
        }

        println!("Goodbye!");
        Ok(())
    }

    /// Run one turn: collect a task, generate code and execute it
    pub async fn run_turn(&mut self, prompter: &mut dyn Prompter) -> Result<TurnOutcome> {
        debug!("Session::run_turn: called");

        let instruction = loop {
            let Some(line) = prompter.read_line(TASK_PROMPT)? else {
                return Ok(TurnOutcome::Exit);
            };
            let line = line.trim();
            if line.eq_ignore_ascii_case("exit") {
                return Ok(TurnOutcome::Exit);
            }
            if !line.is_empty() {
                break line.to_string();
            }
        };

        let Some(media_line) = prompter.read_line(INPUT_PROMPT)? else {
            return Ok(TurnOutcome::Exit);
        };
        let media = match parse_media_list(&media_line) {
            Ok(media) => media,
            Err(reason) => {
                println!("{} {}", "Error:".red(), reason);
                return Ok(TurnOutcome::InvalidInput { reason });
            }
        };

        let Some(output_line) = prompter.read_line(OUTPUT_PROMPT)? else {
            return Ok(TurnOutcome::Exit);
        };
        let output = output_line.trim();
        if output.is_empty() {
            let reason = "No output media path given".to_string();
            println!("{} {}", "Error:".red(), reason);
            return Ok(TurnOutcome::InvalidInput { reason });
        }
        let output = PathBuf::from(output);
        if let Err(e) = ensure_parent_dir(&output) {
            let reason = format!("Failed to create output directory for {}: {}", output.display(), e);
            println!("{} {}", "Error:".red(), reason);
            return Ok(TurnOutcome::Aborted { reason });
        }

        let paths = MediaPaths {
            input: absolute(&media[0]),
            output: absolute(&output),
        };
        let task = TaskRequest::new(instruction, media);
        info!(instruction = %task.instruction, media = ?task.media, output = ?paths.output, "starting task");

        let mut messages = vec![task.to_message()];
        let generated = match self.ask_agent(&messages).await {
            Ok(generated) => generated,
            Err(reason) => return Ok(TurnOutcome::Aborted { reason }),
        };
        self.print_generated(&generated);

        if self.settings.confirm_execution {
            match prompter.read_line(EXECUTE_PROMPT)? {
                Some(answer) if is_yes(&answer) => {}
                Some(_) => return Ok(TurnOutcome::Skipped),
                None => return Ok(TurnOutcome::Exit),
            }
        }

        if generated.test.is_none() {
            return Ok(self.execute_once(&generated, &paths).await);
        }

        Ok(self.test_and_correct(generated, &mut messages, &paths).await)
    }

    /// Execute code that came without a test; no retry
    async fn execute_once(&self, generated: &GeneratedCode, paths: &MediaPaths) -> TurnOutcome {
        debug!("Session::execute_once: called");
        let entry = if self.settings.entry_call {
            entry_point_call(&generated.code, self.settings.placeholders.primary_input())
        } else {
            None
        };
        if let Some(call) = &entry {
            println!("{}", "Adding entry point:".dimmed());
            println!("{}", call);
        }

        let program = assemble_program(
            &self.settings.preamble,
            &generated.code,
            entry.as_deref(),
            &self.settings.placeholders,
            &paths.input,
            &paths.output,
        );

        match self.runner.execute(&program, &paths.input, &paths.output).await {
            Ok(result) => {
                print_execution(&result);
                TurnOutcome::Executed { stdout: result.stdout }
            }
            Err(e) => {
                println!("{} {}", "Error:".red(), e);
                TurnOutcome::Aborted { reason: e.to_string() }
            }
        }
    }

    /// Run the generated test, asking the agent for a fix after each failure
    async fn test_and_correct(
        &self,
        mut generated: GeneratedCode,
        messages: &mut Vec<AgentMessage>,
        paths: &MediaPaths,
    ) -> TurnOutcome {
        let max_attempts = self.settings.max_attempts;
        let mut attempt = 0;

        loop {
            attempt += 1;
            debug!(attempt, max_attempts, "Session::test_and_correct: running test");

            let program = assemble_program(
                &self.settings.preamble,
                &generated.code,
                generated.test.as_deref(),
                &self.settings.placeholders,
                &paths.input,
                &paths.output,
            );

            let result = match self.runner.execute(&program, &paths.input, &paths.output).await {
                Ok(result) => result,
                Err(e) => {
                    println!("{} {}", "Error:".red(), e);
                    return TurnOutcome::Aborted { reason: e.to_string() };
                }
            };
            print_execution(&result);

            if !result.failed() {
                println!("{} Test passed", "✓".green());
                return TurnOutcome::Passed { attempts: attempt };
            }

            let error = result.error_text();
            println!(
                "{} Test failed (attempt {}/{})",
                "✗".red(),
                attempt,
                max_attempts
            );

            if attempt >= max_attempts {
                warn!(attempts = attempt, "giving up after repeated test failures");
                println!("{} Giving up after {} attempts. Last error:", "Error:".red(), attempt);
                println!("{}", error);
                return TurnOutcome::Failed {
                    attempts: attempt,
                    last_error: error,
                };
            }

            let correction = match self.correction_request(&error) {
                Ok(text) => text,
                Err(reason) => return TurnOutcome::Aborted { reason },
            };
            messages.push(AgentMessage::assistant(&generated));
            messages.push(AgentMessage::user(correction, Vec::new()));

            println!("{}", "Asking the agent for a fix...".dimmed());
            generated = match self.ask_agent(messages).await {
                Ok(generated) => generated,
                Err(reason) => return TurnOutcome::Aborted { reason },
            };
            self.print_generated(&generated);

            if generated.test.is_none() {
                warn!("corrected response dropped the test, keeping the code only");
                return self.execute_once(&generated, paths).await;
            }
        }
    }

    /// Render the correction request carrying the literal error text
    fn correction_request(&self, error: &str) -> std::result::Result<String, String> {
        let context = CorrectionContext {
            error: error.to_string(),
            input_placeholder: self.settings.placeholders.primary_input().to_string(),
            output_placeholder: self.settings.placeholders.primary_output().to_string(),
        };
        self.prompts.correction_prompt(&context).map_err(|e| {
            println!("{} {}", "Error:".red(), e);
            e.to_string()
        })
    }

    /// Call the agent, reporting failures to the operator
    async fn ask_agent(&self, messages: &[AgentMessage]) -> std::result::Result<GeneratedCode, String> {
        debug!(count = messages.len(), "Session::ask_agent: called");
        println!("{}", "Generating code...".dimmed());
        match self.agent.chat_with_workflow(messages).await {
            Ok(response) => Ok(response.into()),
            Err(e) => {
                warn!(error = %e, "agent call failed");
                println!("{} {}", "Agent error:".red(), e);
                Err(e.to_string())
            }
        }
    }

    fn print_welcome(&self) {
        println!();
        println!("{}", "Welcome to the Vision-Agent CLI!".bright_cyan().bold());
        println!(
            "Interpreter: {}  Max attempts: {}",
            self.runner.interpreter(),
            self.settings.max_attempts
        );
        println!("Type {} at the task prompt to quit", "exit".yellow());
        println!();
    }

    fn print_generated(&self, generated: &GeneratedCode) {
        println!();
        println!("{}", "Generated Code:".bright_cyan());
        println!("{}", generated.code);
        if let Some(test) = &generated.test {
            println!();
            println!("{}", "Generated Test:".bright_cyan());
            println!("{}", test);
        }
        println!();
    }
}

fn print_execution(result: &ExecutionResult) {
    if !result.stdout.is_empty() {
        println!("{} {}", "stdout=".bright_blue(), result.stdout);
    }
    if !result.stderr.is_empty() {
        println!("{} {}", "stderr=".red(), result.stderr);
    }
    if result.timed_out {
        println!("{}", result.error_text().yellow());
    }
}

/// Split a comma-separated media list and check every entry is a file
fn parse_media_list(line: &str) -> std::result::Result<Vec<PathBuf>, String> {
    let media: Vec<PathBuf> = line
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
        .collect();

    if media.is_empty() {
        return Err("No input media path given".to_string());
    }

    if let Some(missing) = media.iter().find(|p| !p.is_file()) {
        return Err(format!("The file {} does not exist", missing.display()));
    }

    Ok(media)
}

/// Create the output path's parent directory when it is missing
fn ensure_parent_dir(output: &Path) -> std::io::Result<()> {
    if let Some(parent) = output.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        std::fs::create_dir_all(parent)?;
        println!("Created output directory {}", parent.display());
        info!(?parent, "created output directory");
    }
    Ok(())
}

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

fn is_no(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "n" | "no")
}
