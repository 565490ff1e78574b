//! JSON-RPC 2.0 envelope and the typed payload shapes used by the
//! browser-automation host protocol. Pure data, no I/O.
//!
//! The envelope keeps `params` and `result` as raw [`Value`]s: inner
//! payloads are decoded lazily by whoever knows their shape, so the
//! envelope stays independent of every tool schema.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Protocol version sent in the `initialize` handshake.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// Client identity advertised to the host.
pub const CLIENT_NAME: &str = "browserlink";
pub const CLIENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// A JSON-RPC 2.0 message.
///
/// One struct covers requests, notifications and responses; which one a
/// message is follows from which fields are set. Absent optional fields
/// must stay absent on the wire (never `null`) — the host uses
/// null-vs-absent `id` to tell requests from notifications.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcMessage {
    pub jsonrpc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl JsonRpcMessage {
    pub fn request(id: u64, method: &str, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: Some(id),
            method: Some(method.to_string()),
            params,
            result: None,
            error: None,
        }
    }

    pub fn notification(method: &str, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: None,
            method: Some(method.to_string()),
            params,
            result: None,
            error: None,
        }
    }

    /// A message with a method and no id is a notification.
    pub fn is_notification(&self) -> bool {
        self.method.is_some() && self.id.is_none()
    }

    /// A message with an id and a result or error is a response.
    pub fn is_response(&self) -> bool {
        self.id.is_some() && (self.result.is_some() || self.error.is_some())
    }
}

/// The `error` member of a JSON-RPC response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// A tool advertised by the host via `tools/list`. Read-only to us.
#[derive(Debug, Clone, Deserialize)]
pub struct Tool {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "inputSchema", default)]
    pub input_schema: Value,
}

/// Result of a `tools/call`.
///
/// Content items are polymorphic across host versions; they are kept as
/// raw values and probed by the tool layer.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolResult {
    #[serde(default)]
    pub content: Vec<Value>,
    #[serde(rename = "isError", default)]
    pub is_error: bool,
    #[serde(default)]
    pub meta: Option<ToolMeta>,
}

impl ToolResult {
    /// Best-effort human-readable message from the first content item.
    pub fn first_text(&self) -> Option<&str> {
        self.content
            .first()
            .and_then(|item| item.get("text"))
            .and_then(|t| t.as_str())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ToolMeta {
    #[serde(rename = "requestId", default)]
    pub request_id: Option<String>,
    #[serde(default)]
    pub timestamp: Option<i64>,
}

/// Params of the `initialize` request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeRequest {
    pub protocol_version: String,
    pub capabilities: Map<String, Value>,
    pub client_info: HashMap<String, String>,
}

impl Default for InitializeRequest {
    fn default() -> Self {
        let mut client_info = HashMap::new();
        client_info.insert("name".to_string(), CLIENT_NAME.to_string());
        client_info.insert("version".to_string(), CLIENT_VERSION.to_string());
        Self {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: Map::new(),
            client_info,
        }
    }
}

/// Params of a `tools/call` request.
#[derive(Debug, Clone, Serialize)]
pub struct CallToolRequest {
    pub name: String,
    pub arguments: Map<String, Value>,
}

/// Result payload of `tools/list`.
#[derive(Debug, Clone, Deserialize)]
pub struct ListToolsResponse {
    #[serde(default)]
    pub tools: Vec<Tool>,
}
