//! Per-backend authorization headers with an expiry-aware token cache.
//!
//! OAuth2 resolution order for a backend:
//! 1. a cached token that is still outside the expiry skew window,
//! 2. a refresh-token grant against the token endpoint,
//! 3. the pre-seeded access token while its `expiresAt` lies in the future.
//!
//! Concurrent callers for the same backend share a single refresh: the
//! refresh runs under a per-backend async lock and the cache is re-checked
//! once the lock is held.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::config::{AuthDescriptor, BackendConfig, OAuth2Descriptor};
use crate::traits::{HttpRequest, HttpTransport, RemoteError, RemoteResult};

const AUTHORIZATION: &str = "Authorization";
const DEFAULT_EXPIRY_SKEW: Duration = Duration::from_secs(30);

/// Cached access token for one backend.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenCacheEntry {
    token: String,
    expires_at: DateTime<Utc>,
}

impl TokenCacheEntry {
    /// Creates an entry expiring at the given instant.
    #[must_use]
    pub fn new(token: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            token: token.into(),
            expires_at,
        }
    }

    /// Access token value.
    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Absolute expiry instant.
    #[must_use]
    pub const fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    fn remaining(&self, now: DateTime<Utc>) -> TimeDelta {
        self.expires_at - now
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

/// Issues authorization headers for backends and owns the token cache.
pub struct CredentialManager {
    transport: Arc<dyn HttpTransport>,
    cache: RwLock<HashMap<String, TokenCacheEntry>>,
    refresh_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    expiry_skew: Duration,
}

impl std::fmt::Debug for CredentialManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialManager")
            .field("expiry_skew", &self.expiry_skew)
            .finish_non_exhaustive()
    }
}

impl CredentialManager {
    /// Creates a manager sending token requests through `transport`.
    #[must_use]
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            transport,
            cache: RwLock::new(HashMap::new()),
            refresh_locks: Mutex::new(HashMap::new()),
            expiry_skew: DEFAULT_EXPIRY_SKEW,
        }
    }

    /// Overrides the window before expiry during which a cached token is
    /// treated as expired.
    #[must_use]
    pub fn with_expiry_skew(mut self, skew: Duration) -> Self {
        self.expiry_skew = skew;
        self
    }

    /// Returns the configured expiry skew.
    #[must_use]
    pub const fn expiry_skew(&self) -> Duration {
        self.expiry_skew
    }

    /// Builds the headers required to call `config`'s endpoint.
    ///
    /// Backends without an auth descriptor get an empty map.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::Auth`] when no usable credential can be
    /// produced after every fallback.
    pub async fn headers_for(&self, config: &BackendConfig) -> RemoteResult<HashMap<String, String>> {
        let mut headers = HashMap::new();
        let token = match config.auth() {
            None => {
                debug!(backend_id = %config.id(), "no auth configured");
                return Ok(headers);
            }
            Some(AuthDescriptor::AppToken { app_token }) => match app_token {
                Some(token) if !token.is_empty() => token.clone(),
                _ => {
                    return Err(RemoteError::auth(
                        config.id(),
                        "app token is required for app-token authentication",
                    ));
                }
            },
            Some(AuthDescriptor::Oauth2 { oauth2 }) => {
                let oauth2 = oauth2.as_ref().ok_or_else(|| {
                    RemoteError::auth(config.id(), "oauth2 configuration is required")
                })?;
                self.oauth2_token(config.id(), oauth2).await?
            }
        };

        headers.insert(AUTHORIZATION.to_owned(), format!("Bearer {token}"));
        Ok(headers)
    }

    /// Evicts the cached token of one backend, or every token when `None`.
    pub async fn clear_token_cache(&self, backend_id: Option<&str>) {
        let mut cache = self.cache.write().await;
        match backend_id {
            Some(id) => {
                cache.remove(id);
                info!(backend_id = %id, "cleared token cache");
            }
            None => {
                cache.clear();
                info!("cleared all cached tokens");
            }
        }
    }

    /// Returns `true` when the backend has no cached token or the token
    /// expires within `buffer`.
    pub async fn is_token_expiring_soon(&self, backend_id: &str, buffer: Duration) -> bool {
        let cache = self.cache.read().await;
        let Some(entry) = cache.get(backend_id) else {
            return true;
        };
        entry.remaining(Utc::now()) < to_delta(buffer)
    }

    /// Returns a copy of the cached entry for a backend.
    pub async fn cached_token(&self, backend_id: &str) -> Option<TokenCacheEntry> {
        self.cache.read().await.get(backend_id).cloned()
    }

    /// Seeds the cache, replacing any entry for the backend.
    pub async fn store_token(&self, backend_id: impl Into<String>, entry: TokenCacheEntry) {
        self.cache.write().await.insert(backend_id.into(), entry);
    }

    async fn oauth2_token(&self, backend_id: &str, oauth2: &OAuth2Descriptor) -> RemoteResult<String> {
        if let Some(token) = self.usable_cached(backend_id).await {
            debug!(backend_id = %backend_id, "using cached oauth2 token");
            return Ok(token);
        }

        if let Some(refresh_token) = oauth2.refresh_token.as_deref() {
            let lock = self.refresh_lock(backend_id).await;
            let _guard = lock.lock().await;

            if let Some(token) = self.usable_cached(backend_id).await {
                debug!(backend_id = %backend_id, "token refreshed by a concurrent caller");
                return Ok(token);
            }

            match self.refresh(backend_id, oauth2, refresh_token).await {
                Ok(token) => return Ok(token),
                Err(err) => {
                    warn!(backend_id = %backend_id, error = %err, "oauth2 refresh failed, trying pre-seeded token");
                }
            }
        }

        if let (Some(token), Some(expires_at)) = (&oauth2.access_token, oauth2.expires_at) {
            if expires_at > Utc::now().timestamp_millis() {
                debug!(backend_id = %backend_id, "using pre-seeded oauth2 token");
                return Ok(token.clone());
            }
        }

        Err(RemoteError::auth(backend_id, "no valid oauth2 token available"))
    }

    async fn usable_cached(&self, backend_id: &str) -> Option<String> {
        let cache = self.cache.read().await;
        cache
            .get(backend_id)
            .filter(|entry| entry.remaining(Utc::now()) > to_delta(self.expiry_skew))
            .map(|entry| entry.token.clone())
    }

    async fn refresh_lock(&self, backend_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.refresh_locks.lock().await;
        Arc::clone(locks.entry(backend_id.to_owned()).or_default())
    }

    async fn refresh(
        &self,
        backend_id: &str,
        oauth2: &OAuth2Descriptor,
        refresh_token: &str,
    ) -> RemoteResult<String> {
        info!(backend_id = %backend_id, "refreshing oauth2 token");

        let request = HttpRequest::post(&oauth2.token_url)
            .header("Content-Type", "application/json")
            .json(&json!({
                "grant_type": "refresh_token",
                "refresh_token": refresh_token,
                "client_id": oauth2.client_id,
                "client_secret": oauth2.client_secret,
            }))?;
        let response = self.transport.post_json(request).await?;

        if !response.is_success() {
            return Err(RemoteError::auth(
                backend_id,
                format!(
                    "token endpoint returned {}: {}",
                    response.status(),
                    response.text()
                ),
            ));
        }

        let body: TokenResponse = response.json().map_err(|err| {
            RemoteError::auth(backend_id, format!("invalid token response: {err}"))
        })?;
        let lifetime = TimeDelta::try_seconds(body.expires_in.unwrap_or(0)).unwrap_or_default();
        let entry = TokenCacheEntry::new(body.access_token, Utc::now() + lifetime);
        info!(
            backend_id = %backend_id,
            expires_at = %entry.expires_at.to_rfc3339(),
            "oauth2 token refreshed"
        );

        let token = entry.token.clone();
        self.cache.write().await.insert(backend_id.to_owned(), entry);
        Ok(token)
    }
}

fn to_delta(duration: Duration) -> TimeDelta {
    TimeDelta::from_std(duration).unwrap_or(TimeDelta::MAX)
}
