//! Registry lifecycle state machine.

use thiserror::Error;
use tracing::debug;

/// States a registry moves through before it can serve requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryState {
    /// Constructed, or a previous initialize failed.
    Uninitialized,
    /// Sources are being loaded.
    Initializing,
    /// Catalogs are loaded; refreshes happen within this state.
    Ready,
}

impl RegistryState {
    /// Returns `true` once initialization has completed.
    #[must_use]
    pub const fn is_ready(self) -> bool {
        matches!(self, Self::Ready)
    }
}

/// Events that trigger lifecycle transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// Start loading sources.
    Begin,
    /// Loading finished.
    Complete,
    /// Loading failed; the registry may be initialized again.
    Fail,
}

/// Lifecycle state manager.
#[derive(Debug, Clone, Copy)]
pub struct Lifecycle {
    state: RegistryState,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    /// Creates a lifecycle in [`RegistryState::Uninitialized`].
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: RegistryState::Uninitialized,
        }
    }

    /// Returns the current state.
    #[must_use]
    pub const fn state(&self) -> RegistryState {
        self.state
    }

    /// Applies a lifecycle event, returning the resulting state.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::InvalidTransition`] when the event is not
    /// allowed from the current state.
    pub fn transition(&mut self, event: LifecycleEvent) -> LifecycleResult<RegistryState> {
        let next = match (self.state, event) {
            (RegistryState::Uninitialized, LifecycleEvent::Begin) => RegistryState::Initializing,
            (RegistryState::Initializing, LifecycleEvent::Complete) => RegistryState::Ready,
            (RegistryState::Initializing, LifecycleEvent::Fail) => RegistryState::Uninitialized,
            (from, event) => return Err(LifecycleError::InvalidTransition { from, event }),
        };

        debug!(from = ?self.state, to = ?next, ?event, "registry lifecycle transition");
        self.state = next;
        Ok(next)
    }
}

/// Errors emitted by the lifecycle controller.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LifecycleError {
    /// Transition was not permitted from the current state.
    #[error("invalid registry transition from {from:?} via {event:?}")]
    InvalidTransition {
        /// State prior to the attempted transition.
        from: RegistryState,
        /// Event that triggered the failure.
        event: LifecycleEvent,
    },
}

/// Result alias used for lifecycle operations.
pub type LifecycleResult<T> = Result<T, LifecycleError>;
