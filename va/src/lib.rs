//! Vision-Agent - interactive vision code synthesis
//!
//! An operator describes an image or video task, an agent writes a program
//! and a test for it, and the program is executed locally. When the test
//! writes anything to standard error the error text goes back to the agent
//! for a corrected version.
//!
//! # Modules
//!
//! - [`agent`] - Agent trait, message types and the LLM-backed agent
//! - [`llm`] - LLM client trait and OpenAI-compatible implementation
//! - [`prompts`] - Handlebars prompt templates with user overrides
//! - [`runner`] - Placeholder substitution and sandboxed program execution
//! - [`session`] - The interactive turn loop
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod agent;
pub mod cli;
pub mod config;
pub mod llm;
pub mod prompts;
pub mod runner;
pub mod session;

// Re-export commonly used types
pub use agent::{Agent, AgentError, AgentMessage, AgentResponse, GeneratedCode, LlmAgent, TaskRequest};
pub use config::Config;
pub use llm::{CompletionRequest, CompletionResponse, LlmClient, LlmError, OpenAIClient, create_client};
pub use prompts::PromptLoader;
pub use runner::{CodeRunner, ExecutionResult, Placeholders, RunnerError, SandboxPolicy, assemble_program};
pub use session::{Prompter, ReadlinePrompter, ScriptedPrompter, Session, SessionSettings, TurnOutcome};
