//! Interactive session
//!
//! Drives the prompt / generate / execute / correct loop for one operator.

mod prompter;
#[allow(clippy::module_inception)]
mod session;

pub use prompter::{Prompter, ReadlinePrompter, ScriptedPrompter};
pub use session::{Session, SessionSettings, TurnOutcome};
