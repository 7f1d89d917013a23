//! Remote tool backends reachable over a JSON-RPC style protocol.
//!
//! [`config`] loads one JSON unit per backend, [`credentials`] issues the
//! authorization headers for each backend (static tokens and OAuth2 with an
//! expiry-aware token cache), and [`directory`] discovers tools with
//! `tools/list` and invokes them with `tools/call`. All network access goes
//! through the [`traits::HttpTransport`] seam; [`http_client::HyperTransport`]
//! is the production implementation.

#![warn(missing_docs, clippy::pedantic)]

pub mod config;
pub mod credentials;
pub mod directory;
pub mod http_client;
pub mod rpc;
pub mod traits;

#[cfg(test)]
mod test_support;

pub use config::{AuthDescriptor, BackendConfig, OAuth2Descriptor, load_backend_configs};
pub use credentials::{CredentialManager, TokenCacheEntry};
pub use directory::{RemoteToolDirectory, ToolDescriptor};
pub use http_client::HyperTransport;
pub use traits::{HttpRequest, HttpResponse, HttpTransport, RemoteError, RemoteResult};
