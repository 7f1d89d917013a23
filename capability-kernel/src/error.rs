//! Error type for registry operations that propagate.

use capability_procedures::CatalogError;
use capability_remote::RemoteError;
use thiserror::Error;

use crate::lifecycle::LifecycleError;

/// Errors raised by initialize and refresh. Per-item failures never use this
/// type; they become failed [`capability_primitives::InvocationResult`]s.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The procedure catalog could not be loaded.
    #[error("procedure catalog failed to load: {source}")]
    Catalog {
        /// Underlying catalog error.
        #[from]
        source: CatalogError,
    },
    /// Backend configs could not be loaded.
    #[error("remote backends failed to load: {source}")]
    Remote {
        /// Underlying remote error.
        #[from]
        source: RemoteError,
    },
    /// The lifecycle rejected a transition.
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}

/// Result alias for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;
