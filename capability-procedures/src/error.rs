//! Error types for the procedure catalog.

use std::path::PathBuf;

use thiserror::Error;

/// Errors emitted while loading procedure documents.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The structured header is malformed or lacks a required field.
    #[error("invalid procedure header in {path}: {reason}")]
    Header {
        /// Document the header belongs to.
        path: PathBuf,
        /// Human-readable reason describing the failure.
        reason: String,
    },
    /// No procedure with the given id is in the metadata cache.
    #[error("procedure not found: {id}")]
    NotFound {
        /// Identifier that failed to resolve.
        id: String,
    },
    /// Underlying I/O failure while reading documents.
    #[error("i/o error: {source}")]
    Io {
        /// Source [`std::io::Error`].
        #[from]
        source: std::io::Error,
    },
}

impl CatalogError {
    /// Helper to construct header errors.
    #[must_use]
    pub fn header(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Header {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Helper to construct not-found errors.
    #[must_use]
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }
}

/// Result type alias for catalog operations.
pub type CatalogResult<T> = Result<T, CatalogError>;
