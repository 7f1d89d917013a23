//! Capability registry and the runtime pieces around it.
//!
//! [`CapabilityRegistry`] merges local procedures, remote tools and the code
//! runner into one namespace. A small lifecycle state machine guards
//! initialization, and [`TaskScheduler`] bounds concurrent batch execution.

#![warn(missing_docs, clippy::pedantic)]

mod error;
mod lifecycle;
pub mod listing;
mod registry;
mod scheduler;

pub use error::{RegistryError, RegistryResult};
pub use lifecycle::{Lifecycle, LifecycleError, LifecycleEvent, LifecycleResult, RegistryState};
pub use listing::ListingEntry;
pub use registry::{BACKENDS_DIR, CapabilityRegistry, RegistryStats, Resolution};
pub use scheduler::{SchedulerConfig, SchedulerError, SchedulerResult, TaskScheduler};
