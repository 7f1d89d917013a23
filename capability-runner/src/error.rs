//! Error types for code runs and artifact access.

use std::time::Duration;

use thiserror::Error;

/// Result alias for runner operations.
pub type RunnerResult<T> = Result<T, RunnerError>;

/// Errors emitted by the code runner.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// The interpreter exceeded its wall-clock budget and was killed.
    #[error("{language} execution timed out after {}s: {stderr}", .timeout.as_secs())]
    Timeout {
        /// Language of the run.
        language: String,
        /// Budget that elapsed.
        timeout: Duration,
        /// Standard error captured before the kill.
        stderr: String,
    },
    /// The interpreter exited unsuccessfully.
    #[error("{language} execution failed ({}): {stderr}", exit_label(.code))]
    NonZeroExit {
        /// Language of the run.
        language: String,
        /// Exit code, absent when terminated by a signal.
        code: Option<i32>,
        /// Captured standard error.
        stderr: String,
    },
    /// The interpreter could not be started.
    #[error("failed to start {interpreter}: {source}")]
    Spawn {
        /// Interpreter program.
        interpreter: String,
        /// Source [`std::io::Error`].
        source: std::io::Error,
    },
    /// An artifact name contains a path separator or parent reference.
    #[error("invalid artifact name `{name}`")]
    InvalidArtifactName {
        /// Name as supplied by the caller.
        name: String,
    },
    /// No regular file with this name exists in the scratch directory.
    #[error("artifact not found: {name}")]
    ArtifactNotFound {
        /// Decoded artifact name.
        name: String,
    },
    /// Underlying I/O failure on the scratch directory.
    #[error("i/o error: {source}")]
    Io {
        /// Source [`std::io::Error`].
        #[from]
        source: std::io::Error,
    },
}

impl RunnerError {
    /// Captured standard error for execution failures.
    #[must_use]
    pub fn stderr(&self) -> Option<&str> {
        match self {
            Self::Timeout { stderr, .. } | Self::NonZeroExit { stderr, .. } => Some(stderr),
            _ => None,
        }
    }
}

#[allow(clippy::ref_option)]
fn exit_label(code: &Option<i32>) -> String {
    code.map_or_else(|| "terminated by signal".to_owned(), |code| format!("exit code {code}"))
}
