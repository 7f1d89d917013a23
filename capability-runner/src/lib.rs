//! Ephemeral code execution.
//!
//! [`CodeRunner`] writes a snippet to a fresh file in a shared scratch
//! directory, runs the matching interpreter under a wall-clock budget and
//! reports stdout, stderr and every file the directory holds afterwards.
//! [`CodeRunner::resolve_artifact`] backs download lookups.

#![warn(missing_docs, clippy::pedantic)]

pub mod artifacts;
pub mod error;
pub mod runner;

pub use artifacts::{Artifact, ResolvedArtifact, content_type_for, download_url};
pub use error::{RunnerError, RunnerResult};
pub use runner::{CodeRunner, DEFAULT_SCRATCH_DIR, ExecutionOutput};
