//! JSON-RPC 2.0 envelopes for `tools/list` and `tools/call`.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Method used to discover the tools of a backend.
pub const METHOD_TOOLS_LIST: &str = "tools/list";
/// Method used to invoke a tool.
pub const METHOD_TOOLS_CALL: &str = "tools/call";

const JSONRPC_VERSION: &str = "2.0";

/// Outbound request envelope.
#[derive(Debug, Clone, Serialize)]
pub struct RpcRequest {
    jsonrpc: &'static str,
    id: u64,
    method: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<Value>,
}

impl RpcRequest {
    /// Builds a `tools/list` request (no params).
    #[must_use]
    pub fn tools_list(id: u64) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            method: METHOD_TOOLS_LIST,
            params: None,
        }
    }

    /// Builds a `tools/call` request for the bare tool name and arguments.
    #[must_use]
    pub fn tools_call(id: u64, tool_name: &str, arguments: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            method: METHOD_TOOLS_CALL,
            params: Some(json!({
                "name": tool_name,
                "arguments": arguments,
            })),
        }
    }

    /// Request identifier.
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Method name.
    #[must_use]
    pub const fn method(&self) -> &'static str {
        self.method
    }
}

/// Inbound response envelope. A present `error` marks a backend-level
/// failure regardless of the HTTP status.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RpcResponse {
    #[serde(default)]
    pub(crate) result: Option<Value>,
    #[serde(default)]
    pub(crate) error: Option<RpcErrorObject>,
}

/// Error object carried by a failed response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RpcErrorObject {
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    message: Option<String>,
}

impl RpcErrorObject {
    /// Message reported by the backend, or a generic fallback.
    #[must_use]
    pub fn message(&self) -> String {
        match (&self.message, self.code) {
            (Some(message), _) if !message.is_empty() => message.clone(),
            (_, Some(code)) => format!("unknown backend error (code {code})"),
            _ => "unknown backend error".to_owned(),
        }
    }
}

/// `result` payload of a `tools/list` response. Entries stay raw so one
/// malformed tool cannot fail the whole list.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct ToolsListResult {
    #[serde(default)]
    pub(crate) tools: Vec<Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawTool {
    pub(crate) name: String,
    #[serde(default)]
    pub(crate) description: Option<String>,
    #[serde(default)]
    pub(crate) input_schema: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tools_list_has_no_params() {
        let value = serde_json::to_value(RpcRequest::tools_list(7)).unwrap();
        assert_eq!(value["jsonrpc"], "2.0");
        assert_eq!(value["id"], 7);
        assert_eq!(value["method"], "tools/list");
        assert!(value.get("params").is_none());
    }

    #[test]
    fn tools_call_carries_bare_name_and_arguments() {
        let request = RpcRequest::tools_call(3, "search", json!({"q": "rust"}));
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["method"], "tools/call");
        assert_eq!(value["params"]["name"], "search");
        assert_eq!(value["params"]["arguments"]["q"], "rust");
    }

    #[test]
    fn error_message_falls_back_to_code() {
        let response: RpcResponse =
            serde_json::from_value(json!({"error": {"code": -32601}})).unwrap();
        assert_eq!(
            response.error.unwrap().message(),
            "unknown backend error (code -32601)"
        );
    }

    #[test]
    fn raw_tool_defaults_optional_fields() {
        let list: ToolsListResult =
            serde_json::from_value(json!({"tools": [{"name": "search"}]})).unwrap();
        assert_eq!(list.tools.len(), 1);
        let tool: RawTool = serde_json::from_value(list.tools[0].clone()).unwrap();
        assert!(tool.description.is_none());
        assert!(tool.input_schema.is_none());
    }
}
