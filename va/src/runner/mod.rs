//! Generated-code execution
//!
//! - [`placeholders`] - swap literal media placeholders for real paths
//! - [`CodeRunner`] - write a program to a temp file and run it under a [`SandboxPolicy`]

mod error;
mod executor;
pub mod placeholders;
mod sandbox;

pub use error::RunnerError;
pub use executor::{CodeRunner, ExecutionResult};
pub use placeholders::{Placeholders, assemble_program, entry_point_call, substitute_placeholders};
pub use sandbox::{INPUT_ENV, OUTPUT_ENV, SandboxPolicy};
