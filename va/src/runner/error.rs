//! Runner error types

use thiserror::Error;

/// Errors that prevent a generated program from running at all
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("Failed to prepare program file: {0}")]
    TempFile(#[source] std::io::Error),

    #[error("Failed to start interpreter '{interpreter}': {source}")]
    Spawn {
        interpreter: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error while running program: {0}")]
    Io(#[source] std::io::Error),
}
