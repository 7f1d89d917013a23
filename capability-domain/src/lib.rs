//! Capability aggregation engine facade.
//!
//! Bundles the engine crates behind feature flags so downstream users can
//! enable only the parts they need. With the `kernel` and `config` features
//! enabled, [`build_registry`] wires a [`kernel::CapabilityRegistry`] from a
//! [`config::ServerConfig`].

#![warn(missing_docs, clippy::pedantic)]

/// Re-export shared primitives for convenience.
pub use capability_primitives as primitives;

/// Capability registry, lifecycle and scheduler (enabled by `kernel` feature).
#[cfg(feature = "kernel")]
pub use capability_kernel as kernel;

/// Remote tool backends and credentials (enabled by `remote` feature).
#[cfg(feature = "remote")]
pub use capability_remote as remote;

/// Local procedure catalog (enabled by `procedures` feature).
#[cfg(feature = "procedures")]
pub use capability_procedures as procedures;

/// Ephemeral code execution (enabled by `runner` feature).
#[cfg(feature = "runner")]
pub use capability_runner as runner;

/// Tracing setup (enabled by `telemetry` feature).
#[cfg(feature = "telemetry")]
pub use capability_telemetry as telemetry;

/// Server configuration (enabled by `config` feature).
#[cfg(feature = "config")]
pub use capability_config as config;

#[cfg(all(feature = "kernel", feature = "config"))]
mod wiring {
    use std::sync::Arc;

    use capability_config::ServerConfig;
    use capability_kernel::CapabilityRegistry;
    use capability_procedures::ProcedureCatalog;
    use capability_remote::{CredentialManager, HttpTransport, HyperTransport, RemoteToolDirectory};
    use capability_runner::CodeRunner;

    /// Builds an uninitialized registry from `config`, talking to backends
    /// over HTTPS.
    #[must_use]
    pub fn build_registry(config: &ServerConfig) -> CapabilityRegistry {
        let transport = HyperTransport::new().with_timeout(config.remote_timeout());
        build_registry_with_transport(config, Arc::new(transport))
    }

    /// Builds an uninitialized registry from `config` over a caller-supplied
    /// transport.
    #[must_use]
    pub fn build_registry_with_transport(
        config: &ServerConfig,
        transport: Arc<dyn HttpTransport>,
    ) -> CapabilityRegistry {
        let credentials = Arc::new(
            CredentialManager::new(Arc::clone(&transport))
                .with_expiry_skew(config.token_expiry_skew()),
        );
        let directory = RemoteToolDirectory::new(transport, credentials, config.mcps_dir());
        let runner = CodeRunner::new(config.code_scratch_dir()).with_timeout(config.code_timeout());
        CapabilityRegistry::new(ProcedureCatalog::new(config.domains_path()), directory, runner)
    }
}

#[cfg(all(feature = "kernel", feature = "config"))]
pub use wiring::{build_registry, build_registry_with_transport};
