//! Transport seam and error type shared by the remote modules.

use async_trait::async_trait;
use bytes::Bytes;
use hyper::StatusCode;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

/// Result alias used by remote operations.
pub type RemoteResult<T> = Result<T, RemoteError>;

/// Error type shared by the credential manager and the tool directory.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// A backend config unit is malformed or incomplete.
    #[error("invalid backend config {source_name}: {reason}")]
    Config {
        /// File or identifier the config came from.
        source_name: String,
        /// Reason the unit was rejected.
        reason: String,
    },

    /// No usable credential could be produced for a backend.
    #[error("authentication failed for backend `{backend}`: {reason}")]
    Auth {
        /// Backend identifier.
        backend: String,
        /// Additional context for the failure.
        reason: String,
    },

    /// The backend answered with a non-success status or a protocol error.
    #[error("backend `{backend}` error: {reason}")]
    Protocol {
        /// Backend identifier.
        backend: String,
        /// Message reported by the backend or derived from the status.
        reason: String,
    },

    /// Network-level failure (connect, timeout, body read).
    #[error("transport error: {reason}")]
    Transport {
        /// Additional context about the error.
        reason: String,
    },

    /// Requested tool is not known to the directory.
    #[error("tool not found: {tool}")]
    ToolNotFound {
        /// Identifier that failed to resolve.
        tool: String,
    },

    /// The backend owning a tool is not loaded.
    #[error("backend config not found: {backend}")]
    BackendNotFound {
        /// Identifier of the missing backend.
        backend: String,
    },

    /// Local file system failure while reading config units.
    #[error("i/o error: {source}")]
    Io {
        /// Source [`std::io::Error`].
        #[from]
        source: std::io::Error,
    },
}

impl RemoteError {
    /// Convenience constructor for config errors.
    #[must_use]
    pub fn config(source_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Config {
            source_name: source_name.into(),
            reason: reason.into(),
        }
    }

    /// Convenience constructor for authentication failures.
    #[must_use]
    pub fn auth(backend: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Auth {
            backend: backend.into(),
            reason: reason.into(),
        }
    }

    /// Convenience constructor for backend protocol failures.
    #[must_use]
    pub fn protocol(backend: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Protocol {
            backend: backend.into(),
            reason: reason.into(),
        }
    }

    /// Convenience constructor for transport failures.
    #[must_use]
    pub fn transport(reason: impl Into<String>) -> Self {
        Self::Transport {
            reason: reason.into(),
        }
    }
}

/// Outbound JSON `POST` request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpRequest {
    url: String,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl HttpRequest {
    /// Starts a `POST` request to the supplied URL.
    #[must_use]
    pub fn post(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    /// Appends a header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Appends every header of the iterator.
    #[must_use]
    pub fn headers<I, K, V>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.headers
            .extend(headers.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Serializes the payload as the JSON request body.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::Transport`] if the payload cannot be encoded.
    pub fn json<T: Serialize>(mut self, payload: &T) -> RemoteResult<Self> {
        self.body = serde_json::to_vec(payload).map_err(|err| {
            RemoteError::transport(format!("failed to encode request body: {err}"))
        })?;
        Ok(self)
    }

    /// Target URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Headers in insertion order.
    #[must_use]
    pub fn header_pairs(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Looks up the last value of a header by case-insensitive name.
    #[must_use]
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .rev()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Encoded body bytes.
    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }
}

/// Response returned by a transport.
#[derive(Clone, Debug)]
pub struct HttpResponse {
    status: StatusCode,
    body: Bytes,
}

impl HttpResponse {
    /// Creates a response from a status and a raw body.
    #[must_use]
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Creates a `200 OK` response with a JSON body.
    #[must_use]
    pub fn json_ok(value: &serde_json::Value) -> Self {
        Self::new(StatusCode::OK, value.to_string())
    }

    /// Response status.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns `true` for 2xx statuses.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Raw body bytes.
    #[must_use]
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Body decoded lossily as UTF-8.
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Decodes the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`serde_json::Error`] when the body is not valid JSON for `T`.
    pub fn json<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_slice(&self.body)
    }
}

/// Transport used for every outbound call (discovery, invocation, token
/// refresh).
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Sends a JSON `POST` request and returns the raw response.
    async fn post_json(&self, request: HttpRequest) -> RemoteResult<HttpResponse>;
}
