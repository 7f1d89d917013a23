//! Backend config units (`mcps/*.json`).

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{info, warn};

use crate::traits::{RemoteError, RemoteResult};

/// Validated configuration of one remote backend.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BackendConfig {
    id: String,
    name: String,
    endpoint: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    auth: Option<AuthDescriptor>,
}

/// Authentication scheme of a backend, tagged by `type`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum AuthDescriptor {
    /// Static bearer token.
    #[serde(rename_all = "camelCase")]
    AppToken {
        /// Token value, required to be non-empty when headers are issued.
        #[serde(default)]
        app_token: Option<String>,
    },
    /// OAuth2 refresh-token grant.
    Oauth2 {
        /// Client credentials and optional pre-seeded tokens.
        #[serde(default)]
        oauth2: Option<OAuth2Descriptor>,
    },
}

/// OAuth2 client description with optional pre-seeded tokens.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuth2Descriptor {
    /// OAuth2 client identifier.
    pub client_id: String,
    /// OAuth2 client secret.
    pub client_secret: String,
    /// Token endpoint used for the refresh grant.
    pub token_url: String,
    /// Pre-seeded access token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    /// Refresh token used for the refresh grant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Expiry of the pre-seeded access token in epoch milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct RawBackendConfig {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    endpoint: Option<String>,
    #[serde(default)]
    auth: Option<AuthDescriptor>,
}

impl BackendConfig {
    /// Creates an unauthenticated backend config.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            endpoint: endpoint.into(),
            auth: None,
        }
    }

    /// Attaches an authentication descriptor.
    #[must_use]
    pub fn with_auth(mut self, auth: AuthDescriptor) -> Self {
        self.auth = Some(auth);
        self
    }

    /// Parses one JSON config unit.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::Config`] when the JSON is malformed or the
    /// `id` or `endpoint` field is missing or empty, or when the `id`
    /// contains `:`, which separates backend and tool in qualified names.
    pub fn from_json(source_name: &str, text: &str) -> RemoteResult<Self> {
        let raw: RawBackendConfig = serde_json::from_str(text)
            .map_err(|err| RemoteError::config(source_name, err.to_string()))?;

        let id = raw
            .id
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| RemoteError::config(source_name, "missing id"))?;
        if id.contains(':') {
            return Err(RemoteError::config(
                source_name,
                format!("backend id `{id}` must not contain ':'"),
            ));
        }
        let endpoint = raw
            .endpoint
            .filter(|endpoint| !endpoint.trim().is_empty())
            .ok_or_else(|| RemoteError::config(source_name, "missing endpoint"))?;
        let name = raw.name.unwrap_or_else(|| id.clone());

        Ok(Self {
            id,
            name,
            endpoint,
            auth: raw.auth,
        })
    }

    /// Backend identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// JSON-RPC endpoint URL.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Authentication descriptor, if any.
    #[must_use]
    pub fn auth(&self) -> Option<&AuthDescriptor> {
        self.auth.as_ref()
    }
}

/// Reads every `*.json` unit directly under `dir`, keyed by backend id.
///
/// A missing directory yields an empty map. Units that fail to parse or lack
/// an `id`/`endpoint` are skipped with a warning; on duplicate ids the
/// last unit in file-name order wins.
///
/// # Errors
///
/// Returns [`RemoteError::Io`] when the directory exists but cannot be read.
pub async fn load_backend_configs(dir: &Path) -> RemoteResult<BTreeMap<String, BackendConfig>> {
    let mut configs = BTreeMap::new();
    if !fs::try_exists(dir).await? {
        info!(path = %dir.display(), "backend config directory missing");
        return Ok(configs);
    }

    let mut files = Vec::new();
    let mut entries = fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_json = path.extension().is_some_and(|ext| ext == "json");
        if is_json && entry.file_type().await?.is_file() {
            files.push(path);
        }
    }
    files.sort();

    for path in files {
        let source_name = path.display().to_string();
        let text = match fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(err) => {
                warn!(path = %source_name, error = %err, "unreadable backend config skipped");
                continue;
            }
        };
        match BackendConfig::from_json(&source_name, &text) {
            Ok(config) => {
                info!(backend_id = %config.id(), path = %source_name, "loaded backend config");
                configs.insert(config.id().to_owned(), config);
            }
            Err(err) => warn!(error = %err, "backend config skipped"),
        }
    }

    Ok(configs)
}

#[cfg(test)]
mod tests {
    use super::*;

    use tempfile::TempDir;

    #[test]
    fn parses_oauth2_unit() {
        let text = r#"{
            "id": "crm",
            "name": "CRM",
            "endpoint": "https://crm.example.com/mcp",
            "auth": {
                "type": "oauth2",
                "oauth2": {
                    "clientId": "client",
                    "clientSecret": "secret",
                    "tokenUrl": "https://crm.example.com/token",
                    "refreshToken": "r-1",
                    "expiresAt": 1700000000000
                }
            }
        }"#;
        let config = BackendConfig::from_json("crm.json", text).unwrap();
        assert_eq!(config.id(), "crm");
        let Some(AuthDescriptor::Oauth2 { oauth2: Some(oauth2) }) = config.auth() else {
            panic!("expected oauth2 descriptor");
        };
        assert_eq!(oauth2.refresh_token.as_deref(), Some("r-1"));
        assert_eq!(oauth2.expires_at, Some(1_700_000_000_000));
    }

    #[test]
    fn parses_app_token_unit() {
        let text = r#"{"id":"web","endpoint":"http://localhost:9000","auth":{"type":"app-token","appToken":"t"}}"#;
        let config = BackendConfig::from_json("web.json", text).unwrap();
        assert_eq!(config.name(), "web");
        assert_eq!(
            config.auth(),
            Some(&AuthDescriptor::AppToken {
                app_token: Some("t".into())
            })
        );
    }

    #[test]
    fn missing_endpoint_is_a_config_error() {
        let err = BackendConfig::from_json("x.json", r#"{"id":"x"}"#).unwrap_err();
        assert!(matches!(err, RemoteError::Config { .. }));
    }

    #[test]
    fn colon_in_id_is_a_config_error() {
        let err = BackendConfig::from_json("x.json", r#"{"id":"a:b","endpoint":"http://x"}"#)
            .unwrap_err();
        assert!(matches!(err, RemoteError::Config { .. }));
        assert!(err.to_string().contains("a:b"));
    }

    #[tokio::test]
    async fn loader_skips_invalid_units() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("a.json"),
            r#"{"id":"a","name":"A","endpoint":"http://a"}"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("b.json"), r#"{"name":"no id"}"#).unwrap();
        std::fs::write(dir.path().join("c.json"), "not json").unwrap();
        std::fs::write(
            dir.path().join("d.json"),
            r#"{"id":"web:v2","endpoint":"http://d"}"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let configs = load_backend_configs(dir.path()).await.unwrap();
        assert_eq!(configs.len(), 1);
        assert!(configs.contains_key("a"));
    }

    #[tokio::test]
    async fn duplicate_ids_last_file_wins() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("1.json"),
            r#"{"id":"dup","endpoint":"http://first"}"#,
        )
        .unwrap();
        std::fs::write(
            dir.path().join("2.json"),
            r#"{"id":"dup","endpoint":"http://second"}"#,
        )
        .unwrap();

        let configs = load_backend_configs(dir.path()).await.unwrap();
        assert_eq!(configs["dup"].endpoint(), "http://second");
    }

    #[tokio::test]
    async fn missing_directory_is_empty() {
        let dir = TempDir::new().unwrap();
        let configs = load_backend_configs(&dir.path().join("absent")).await.unwrap();
        assert!(configs.is_empty());
    }
}
