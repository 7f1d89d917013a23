//! Remote tool directory: backend configs, discovery and invocation.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use capability_primitives::ToolId;
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::config::{BackendConfig, load_backend_configs};
use crate::credentials::CredentialManager;
use crate::rpc::{RawTool, RpcRequest, RpcResponse, ToolsListResult};
use crate::traits::{HttpRequest, HttpResponse, HttpTransport, RemoteError, RemoteResult};

const ACCEPT: &str = "application/json, text/event-stream";

/// A tool discovered on a backend.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescriptor {
    id: ToolId,
    name: String,
    description: String,
    input_schema: Value,
    backend_id: String,
}

impl ToolDescriptor {
    /// Creates a descriptor; the id is derived from backend id and name.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::Protocol`] when the backend id or tool name
    /// cannot form a valid [`ToolId`].
    pub fn new(
        backend_id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: Value,
    ) -> RemoteResult<Self> {
        let backend_id = backend_id.into();
        let name = name.into();
        let id = ToolId::new(backend_id.clone(), name.clone())
            .map_err(|err| RemoteError::protocol(&backend_id, err.to_string()))?;
        Ok(Self {
            id,
            name,
            description: description.into(),
            input_schema,
            backend_id,
        })
    }

    /// Qualified identifier `backendId:toolName`.
    #[must_use]
    pub fn id(&self) -> &ToolId {
        &self.id
    }

    /// Bare tool name as reported by the backend.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Tool description (empty when the backend sent none).
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// JSON schema of the tool arguments.
    #[must_use]
    pub fn input_schema(&self) -> &Value {
        &self.input_schema
    }

    /// Owning backend identifier.
    #[must_use]
    pub fn backend_id(&self) -> &str {
        &self.backend_id
    }
}

/// Loads backend configs, discovers their tools and invokes them.
///
/// Configs and tool descriptors are cached behind async locks; discovery
/// builds its results off-lock and publishes them in one write.
pub struct RemoteToolDirectory {
    transport: Arc<dyn HttpTransport>,
    credentials: Arc<CredentialManager>,
    configs_dir: PathBuf,
    configs: RwLock<BTreeMap<String, BackendConfig>>,
    tools: RwLock<BTreeMap<ToolId, ToolDescriptor>>,
    next_request_id: AtomicU64,
}

impl std::fmt::Debug for RemoteToolDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteToolDirectory")
            .field("configs_dir", &self.configs_dir)
            .finish_non_exhaustive()
    }
}

impl RemoteToolDirectory {
    /// Creates an empty directory reading config units from `configs_dir`.
    #[must_use]
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        credentials: Arc<CredentialManager>,
        configs_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            transport,
            credentials,
            configs_dir: configs_dir.into(),
            configs: RwLock::new(BTreeMap::new()),
            tools: RwLock::new(BTreeMap::new()),
            next_request_id: AtomicU64::new(1),
        }
    }

    /// Directory the config units are read from.
    #[must_use]
    pub fn configs_dir(&self) -> &Path {
        &self.configs_dir
    }

    /// Credential manager used for every backend call.
    #[must_use]
    pub fn credentials(&self) -> &Arc<CredentialManager> {
        &self.credentials
    }

    /// Reads every config unit and adds the valid ones, replacing entries
    /// with the same id. Returns the number of loaded backends.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::Io`] when the config directory cannot be read.
    pub async fn load_configs(&self) -> RemoteResult<usize> {
        info!(path = %self.configs_dir.display(), "loading backend configs");
        let loaded = load_backend_configs(&self.configs_dir).await?;

        let mut configs = self.configs.write().await;
        configs.extend(loaded);
        info!(count = configs.len(), "backend configs loaded");
        Ok(configs.len())
    }

    /// Adds or replaces a single backend config.
    pub async fn register_backend(&self, config: BackendConfig) {
        debug!(backend_id = %config.id(), "registering backend");
        self.configs
            .write()
            .await
            .insert(config.id().to_owned(), config);
    }

    /// Runs `tools/list` against every loaded backend and merges the
    /// results into the tool cache, overwriting identical ids.
    ///
    /// A failing backend is logged and skipped. Returns the tools
    /// discovered by this pass.
    pub async fn discover_tools(&self) -> Vec<ToolDescriptor> {
        let discovered = self.discover_all().await;
        let mut tools = self.tools.write().await;
        for tool in &discovered {
            tools.insert(tool.id.clone(), tool.clone());
        }
        discovered
    }

    /// Discards every cached tool and re-runs discovery.
    pub async fn refresh_tools(&self) -> Vec<ToolDescriptor> {
        info!("refreshing remote tools");
        let discovered = self.discover_all().await;
        let fresh = discovered
            .iter()
            .map(|tool| (tool.id.clone(), tool.clone()))
            .collect();
        *self.tools.write().await = fresh;
        discovered
    }

    /// Invokes a tool with the given arguments and returns the backend's
    /// `result` payload.
    ///
    /// # Errors
    ///
    /// - [`RemoteError::ToolNotFound`] / [`RemoteError::BackendNotFound`]
    ///   when the tool or its backend is unknown.
    /// - [`RemoteError::Auth`] when no credential is available.
    /// - [`RemoteError::Protocol`] for a non-success status or an `error`
    ///   field in the response.
    /// - [`RemoteError::Transport`] for network failures and timeouts.
    pub async fn call_tool(&self, tool_id: &ToolId, arguments: Value) -> RemoteResult<Value> {
        info!(tool_id = %tool_id, "calling remote tool");

        let tool = self
            .tool(tool_id)
            .await
            .ok_or_else(|| RemoteError::ToolNotFound {
                tool: tool_id.to_string(),
            })?;
        let config = self
            .backend_config(tool.backend_id())
            .await
            .ok_or_else(|| RemoteError::BackendNotFound {
                backend: tool.backend_id().to_owned(),
            })?;

        let request = RpcRequest::tools_call(self.next_id(), tool.name(), arguments);
        match self.send(&config, &request).await {
            Ok(result) => {
                info!(tool_id = %tool_id, "remote tool call succeeded");
                Ok(result)
            }
            Err(err) => {
                error!(tool_id = %tool_id, error = %err, "remote tool call failed");
                Err(err)
            }
        }
    }

    /// Snapshot of every cached tool, ordered by id.
    pub async fn tools(&self) -> Vec<ToolDescriptor> {
        self.tools.read().await.values().cloned().collect()
    }

    /// Looks up a tool by its qualified id.
    pub async fn tool(&self, tool_id: &ToolId) -> Option<ToolDescriptor> {
        self.tools.read().await.get(tool_id).cloned()
    }

    /// Every cached tool whose bare name equals `name`.
    pub async fn find_by_name(&self, name: &str) -> Vec<ToolDescriptor> {
        self.tools
            .read()
            .await
            .values()
            .filter(|tool| tool.name == name)
            .cloned()
            .collect()
    }

    /// Every cached tool owned by a backend.
    pub async fn tools_by_backend(&self, backend_id: &str) -> Vec<ToolDescriptor> {
        self.tools
            .read()
            .await
            .values()
            .filter(|tool| tool.backend_id == backend_id)
            .cloned()
            .collect()
    }

    /// Number of cached tools.
    pub async fn tool_count(&self) -> usize {
        self.tools.read().await.len()
    }

    /// Config of a loaded backend.
    pub async fn backend_config(&self, backend_id: &str) -> Option<BackendConfig> {
        self.configs.read().await.get(backend_id).cloned()
    }

    /// Every loaded backend config, ordered by id.
    pub async fn backends(&self) -> Vec<BackendConfig> {
        self.configs.read().await.values().cloned().collect()
    }

    async fn discover_all(&self) -> Vec<ToolDescriptor> {
        info!("discovering remote tools");
        let configs = self.backends().await;

        let mut discovered = Vec::new();
        for config in &configs {
            match self.list_tools(config).await {
                Ok(tools) => {
                    info!(backend_id = %config.id(), count = tools.len(), "discovered tools");
                    discovered.extend(tools);
                }
                Err(err) => {
                    error!(backend_id = %config.id(), error = %err, "tool discovery failed");
                }
            }
        }

        info!(count = discovered.len(), "remote tool discovery finished");
        discovered
    }

    async fn list_tools(&self, config: &BackendConfig) -> RemoteResult<Vec<ToolDescriptor>> {
        let request = RpcRequest::tools_list(self.next_id());
        let result = self.send(config, &request).await?;
        let list: ToolsListResult = if result.is_null() {
            ToolsListResult::default()
        } else {
            serde_json::from_value(result).map_err(|err| {
                RemoteError::protocol(config.id(), format!("invalid tools/list result: {err}"))
            })?
        };

        let mut tools = Vec::with_capacity(list.tools.len());
        for entry in list.tools {
            let descriptor = serde_json::from_value::<RawTool>(entry)
                .map_err(|err| RemoteError::protocol(config.id(), format!("invalid tool entry: {err}")))
                .and_then(|raw| {
                    ToolDescriptor::new(
                        config.id(),
                        raw.name,
                        raw.description.unwrap_or_default(),
                        raw.input_schema.unwrap_or_else(|| Value::Object(Map::new())),
                    )
                });
            match descriptor {
                Ok(descriptor) => tools.push(descriptor),
                Err(err) => warn!(backend_id = %config.id(), error = %err, "skipping malformed tool"),
            }
        }
        Ok(tools)
    }

    async fn send(&self, config: &BackendConfig, rpc: &RpcRequest) -> RemoteResult<Value> {
        let headers = self.credentials.headers_for(config).await?;
        let request = HttpRequest::post(config.endpoint())
            .headers(headers)
            .header("Content-Type", "application/json")
            .header("Accept", ACCEPT)
            .json(rpc)?;

        debug!(backend_id = %config.id(), method = rpc.method(), id = rpc.id(), "sending rpc");
        let response = self.transport.post_json(request).await?;
        if !response.is_success() {
            return Err(RemoteError::protocol(
                config.id(),
                format!("{} returned HTTP {}", rpc.method(), response.status()),
            ));
        }

        let envelope =
            decode_envelope(&response).map_err(|reason| RemoteError::protocol(config.id(), reason))?;
        if let Some(error) = envelope.error {
            return Err(RemoteError::protocol(config.id(), error.message()));
        }
        Ok(envelope.result.unwrap_or(Value::Null))
    }

    fn next_id(&self) -> u64 {
        self.next_request_id.fetch_add(1, Ordering::Relaxed)
    }
}

/// Decodes a JSON body, or the first parseable `data:` line of an
/// event-stream body.
fn decode_envelope(response: &HttpResponse) -> Result<RpcResponse, String> {
    match response.json::<RpcResponse>() {
        Ok(envelope) => Ok(envelope),
        Err(err) => {
            let text = response.text();
            text.lines()
                .filter_map(|line| line.strip_prefix("data:"))
                .find_map(|data| serde_json::from_str::<RpcResponse>(data.trim()).ok())
                .ok_or_else(|| format!("invalid response body: {err}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use hyper::StatusCode;
    use serde_json::json;
    use tempfile::TempDir;

    use crate::config::AuthDescriptor;
    use crate::test_support::ScriptedTransport;

    fn rpc_method(request: &HttpRequest) -> (String, Value) {
        let body: Value = serde_json::from_slice(request.body()).unwrap();
        (body["method"].as_str().unwrap_or_default().to_owned(), body)
    }

    /// Two backends each exposing `search`; `broken` always fails.
    fn backends() -> Arc<ScriptedTransport> {
        Arc::new(ScriptedTransport::new(|request| {
            let (method, body) = rpc_method(request);
            match (request.url(), method.as_str()) {
                ("http://web", "tools/list") => Ok(HttpResponse::json_ok(&json!({
                    "jsonrpc": "2.0", "id": body["id"],
                    "result": {"tools": [
                        {"name": "search", "description": "Web search",
                         "inputSchema": {"type": "object", "properties": {"q": {"type": "string"}}}},
                        {"name": "fetch"}
                    ]}
                }))),
                ("http://docs", "tools/list") => Ok(HttpResponse::json_ok(&json!({
                    "jsonrpc": "2.0", "id": body["id"],
                    "result": {"tools": [
                        {"name": "search", "description": "Docs search",
                         "inputSchema": {"type": "object", "properties": {"topic": {"type": "string"}}}}
                    ]}
                }))),
                ("http://web", "tools/call") => {
                    if body["params"]["name"] == "fetch" {
                        Ok(HttpResponse::json_ok(&json!({
                            "jsonrpc": "2.0", "id": body["id"],
                            "error": {"code": -32000, "message": "fetch blocked"}
                        })))
                    } else {
                        Ok(HttpResponse::json_ok(&json!({
                            "jsonrpc": "2.0", "id": body["id"],
                            "result": {"echo": body["params"]["arguments"]}
                        })))
                    }
                }
                ("http://broken", _) => Ok(HttpResponse::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "boom",
                )),
                _ => Err(RemoteError::transport("unexpected request")),
            }
        }))
    }

    async fn directory(transport: Arc<ScriptedTransport>) -> RemoteToolDirectory {
        let credentials = Arc::new(CredentialManager::new(transport.clone()));
        let directory = RemoteToolDirectory::new(transport, credentials, "unused");
        directory
            .register_backend(BackendConfig::new("web", "Web", "http://web"))
            .await;
        directory
            .register_backend(BackendConfig::new("docs", "Docs", "http://docs"))
            .await;
        directory
    }

    #[tokio::test]
    async fn same_name_on_two_backends_yields_two_tools() {
        let directory = directory(backends()).await;
        let discovered = directory.discover_tools().await;
        assert_eq!(discovered.len(), 3);

        let web = directory
            .tool(&ToolId::new("web", "search").unwrap())
            .await
            .unwrap();
        let docs = directory
            .tool(&ToolId::new("docs", "search").unwrap())
            .await
            .unwrap();
        assert_eq!(web.description(), "Web search");
        assert_eq!(docs.description(), "Docs search");
        assert!(web.input_schema()["properties"].get("q").is_some());
        assert!(docs.input_schema()["properties"].get("topic").is_some());
        assert_eq!(directory.find_by_name("search").await.len(), 2);
    }

    #[tokio::test]
    async fn missing_fields_default() {
        let directory = directory(backends()).await;
        directory.discover_tools().await;

        let fetch = directory
            .tool(&ToolId::new("web", "fetch").unwrap())
            .await
            .unwrap();
        assert_eq!(fetch.description(), "");
        assert_eq!(fetch.input_schema(), &json!({}));
    }

    #[tokio::test]
    async fn failing_backend_does_not_abort_discovery() {
        let directory = directory(backends()).await;
        directory
            .register_backend(BackendConfig::new("broken", "Broken", "http://broken"))
            .await;

        let discovered = directory.discover_tools().await;
        assert_eq!(discovered.len(), 3);
        assert!(directory.tools_by_backend("broken").await.is_empty());
        assert_eq!(directory.tools_by_backend("web").await.len(), 2);
    }

    #[tokio::test]
    async fn malformed_tools_are_skipped() {
        let transport = Arc::new(ScriptedTransport::new(|request| {
            let (_, body) = rpc_method(request);
            Ok(HttpResponse::json_ok(&json!({
                "jsonrpc": "2.0", "id": body["id"],
                "result": {"tools": [
                    {"name": "search", "description": "Web search"},
                    {"name": ""},
                    {"description": "no name"},
                    {"name": "fetch", "description": 42},
                    {"name": "translate"}
                ]}
            })))
        }));
        let credentials = Arc::new(CredentialManager::new(transport.clone()));
        let directory = RemoteToolDirectory::new(transport, credentials, "unused");
        directory
            .register_backend(BackendConfig::new("mixed", "Mixed", "http://mixed"))
            .await;

        let names: Vec<String> = directory
            .discover_tools()
            .await
            .iter()
            .map(|tool| tool.name().to_owned())
            .collect();
        assert_eq!(names, ["search", "translate"]);
        assert_eq!(directory.tool_count().await, 2);
    }

    #[tokio::test]
    async fn discovery_sends_headers_and_envelope() {
        let transport = backends();
        let directory = directory(transport.clone()).await;
        directory
            .register_backend(
                BackendConfig::new("web", "Web", "http://web").with_auth(AuthDescriptor::AppToken {
                    app_token: Some("secret".into()),
                }),
            )
            .await;
        directory.discover_tools().await;

        let requests = transport.requests();
        let web = requests.iter().find(|r| r.url() == "http://web").unwrap();
        assert_eq!(web.header_value("authorization"), Some("Bearer secret"));
        assert_eq!(web.header_value("accept"), Some(ACCEPT));
        assert_eq!(web.header_value("content-type"), Some("application/json"));
        let (method, body) = rpc_method(web);
        assert_eq!(method, "tools/list");
        assert_eq!(body["jsonrpc"], "2.0");
        assert!(body.get("params").is_none());

        let ids: Vec<u64> = requests
            .iter()
            .map(|r| rpc_method(r).1["id"].as_u64().unwrap())
            .collect();
        assert!(ids.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[tokio::test]
    async fn call_tool_returns_result_payload() {
        let directory = directory(backends()).await;
        directory.discover_tools().await;

        let result = directory
            .call_tool(&ToolId::new("web", "search").unwrap(), json!({"q": "rust"}))
            .await
            .unwrap();
        assert_eq!(result, json!({"echo": {"q": "rust"}}));
    }

    #[tokio::test]
    async fn call_tool_error_field_is_protocol_error() {
        let directory = directory(backends()).await;
        directory.discover_tools().await;

        let err = directory
            .call_tool(&ToolId::new("web", "fetch").unwrap(), json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteError::Protocol { ref reason, .. } if reason == "fetch blocked"));
    }

    #[tokio::test]
    async fn call_unknown_tool_is_not_found() {
        let directory = directory(backends()).await;
        let err = directory
            .call_tool(&ToolId::new("web", "search").unwrap(), json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteError::ToolNotFound { ref tool } if tool == "web:search"));
    }

    #[tokio::test]
    async fn refresh_replaces_the_whole_map() {
        let directory = directory(backends()).await;
        directory.discover_tools().await;
        let stale = ToolDescriptor::new("gone", "old", "", json!({})).unwrap();
        directory
            .tools
            .write()
            .await
            .insert(stale.id().clone(), stale);
        assert_eq!(directory.tool_count().await, 4);

        directory.refresh_tools().await;
        assert_eq!(directory.tool_count().await, 3);
        assert!(directory.tools_by_backend("gone").await.is_empty());
    }

    #[tokio::test]
    async fn event_stream_bodies_are_decoded() {
        let transport = Arc::new(ScriptedTransport::new(|_| {
            Ok(HttpResponse::new(
                StatusCode::OK,
                "event: message\ndata: {\"jsonrpc\":\"2.0\",\"id\":1,\"result\":{\"tools\":[{\"name\":\"ping\"}]}}\n\n",
            ))
        }));
        let credentials = Arc::new(CredentialManager::new(transport.clone()));
        let directory = RemoteToolDirectory::new(transport, credentials, "unused");
        directory
            .register_backend(BackendConfig::new("sse", "SSE", "http://sse"))
            .await;

        let discovered = directory.discover_tools().await;
        assert_eq!(discovered.len(), 1);
        assert_eq!(discovered[0].id().to_string(), "sse:ping");
    }

    #[tokio::test]
    async fn load_configs_reads_directory() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("web.json"),
            r#"{"id":"web","name":"Web","endpoint":"http://web"}"#,
        )
        .unwrap();
        let transport = backends();
        let credentials = Arc::new(CredentialManager::new(transport.clone()));
        let directory = RemoteToolDirectory::new(transport, credentials, dir.path());

        assert_eq!(directory.load_configs().await.unwrap(), 1);
        assert_eq!(directory.discover_tools().await.len(), 2);
    }
}
