//! Core shared types for the capability aggregation engine.

#![warn(missing_docs, clippy::pedantic)]

mod capability;
mod error;
mod ids;
mod invocation;

/// Capability names, kinds, and the detail records returned by `describe`.
pub use capability::{
    CapabilityDetail, CapabilityKind, CapabilityName, CodeDetail, CodeLanguage, SkillDetail,
    ToolDetail,
};
/// Error type and result alias shared across the engine.
pub use error::{Error, Result};
/// Globally unique identifier for a remote tool.
pub use ids::ToolId;
/// Batch invocation inputs and per-item results.
pub use invocation::{InvocationItem, InvocationResult};
