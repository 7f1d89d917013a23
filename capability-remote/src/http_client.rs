//! Hyper-backed HTTPS transport.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use hyper::body::to_bytes;
use hyper::client::HttpConnector;
use hyper::{Body, Client, Request, Uri};
use hyper_rustls::HttpsConnector;
use rustls::{ClientConfig, OwnedTrustAnchor, RootCertStore};
use tokio::time::timeout;
use webpki_roots::TLS_SERVER_ROOTS;

use crate::traits::{HttpRequest, HttpResponse, HttpTransport, RemoteError, RemoteResult};

pub(crate) type HyperClient = Client<HttpsConnector<HttpConnector>, Body>;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

pub(crate) fn build_https_client() -> HyperClient {
    let mut roots = RootCertStore::empty();
    roots.add_trust_anchors(TLS_SERVER_ROOTS.iter().map(|anchor| {
        OwnedTrustAnchor::from_subject_spki_name_constraints(
            anchor.subject,
            anchor.spki,
            anchor.name_constraints,
        )
    }));

    let config = ClientConfig::builder()
        .with_safe_defaults()
        .with_root_certificates(roots)
        .with_no_client_auth();

    let mut http = HttpConnector::new();
    http.enforce_http(false);

    let connector = HttpsConnector::from((http, Arc::new(config)));

    Client::builder().build::<_, Body>(connector)
}

/// Production [`HttpTransport`] speaking HTTP/1.1 over plain TCP or rustls.
///
/// Every request is bounded by the configured timeout, covering both the
/// response headers and the body read.
#[derive(Clone)]
pub struct HyperTransport {
    client: HyperClient,
    timeout: Duration,
}

impl fmt::Debug for HyperTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HyperTransport")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl Default for HyperTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl HyperTransport {
    /// Creates a transport with the default 30 second timeout.
    #[must_use]
    pub fn new() -> Self {
        Self {
            client: build_https_client(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Overrides the per-request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns the per-request timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn send(&self, request: HttpRequest) -> RemoteResult<HttpResponse> {
        let uri = request
            .url()
            .parse::<Uri>()
            .map_err(|err| RemoteError::transport(format!("invalid url {}: {err}", request.url())))?;

        let mut builder = Request::post(uri);
        for (name, value) in request.header_pairs() {
            builder = builder.header(name.as_str(), value.as_str());
        }
        let req = builder
            .body(Body::from(request.body().to_vec()))
            .map_err(|err| RemoteError::transport(format!("failed to build request: {err}")))?;

        let response = self
            .client
            .request(req)
            .await
            .map_err(|err| RemoteError::transport(format!("request failed: {err}")))?;

        let status = response.status();
        let bytes = to_bytes(response.into_body())
            .await
            .map_err(|err| RemoteError::transport(format!("failed to read response: {err}")))?;

        Ok(HttpResponse::new(status, bytes))
    }
}

#[async_trait]
impl HttpTransport for HyperTransport {
    async fn post_json(&self, request: HttpRequest) -> RemoteResult<HttpResponse> {
        let url = request.url().to_owned();
        timeout(self.timeout, self.send(request))
            .await
            .map_err(|_| RemoteError::transport(format!("request to {url} timed out")))?
    }
}
