//! Wire types for the MCP envelope.
//!
//! MCP is JSON-RPC 2.0 underneath; the structs here pin down exactly the
//! subset this server speaks (lifecycle, tools, ping) and nothing more.
//! Field names and error codes are fixed by the protocol, so every type
//! derives its serde shape explicitly rather than trusting defaults.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub const JSONRPC_VERSION: &str = "2.0";
pub const MCP_PROTOCOL_VERSION: &str = "2024-11-05";

/// Method names this server dispatches on.
pub mod methods {
    pub const INITIALIZE: &str = "initialize";
    pub const INITIALIZED: &str = "notifications/initialized";
    pub const PING: &str = "ping";
    pub const SHUTDOWN: &str = "shutdown";
    pub const TOOLS_CALL: &str = "tools/call";
    pub const TOOLS_LIST: &str = "tools/list";
}

/// JSON-RPC ids may be numbers or strings; both round-trip untouched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(untagged)]
pub enum RequestId {
    String(String),
    Number(i64),
}

/// One inbound frame. A frame without an id is a notification and gets no
/// response.
#[derive(Debug, Clone, Deserialize)]
pub struct McpRequest {
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Option<RequestId>,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
}

impl McpRequest {
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

/// One outbound frame. Exactly one of `result` / `error` is present; the
/// absent one is omitted from the JSON entirely.
#[derive(Debug, Clone, Serialize)]
pub struct McpResponse {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<RequestId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<McpErrorResponse>,
}

impl McpResponse {
    pub fn ok(id: RequestId, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: Some(id),
            result: Some(result),
            error: None,
        }
    }

    /// `id` is `None` only when the request was too malformed to carry one.
    pub fn fail(id: Option<RequestId>, error: McpError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: None,
            error: Some(McpErrorResponse {
                code: error.code(),
                message: error.to_string(),
            }),
        }
    }
}

/// Protocol-level failures. Tool-level failures travel inside a successful
/// response as [`ToolsCallResult::error`]; these are for frames the server
/// could not dispatch at all.
#[derive(Debug, Clone, Error)]
pub enum McpError {
    #[error("unreadable frame: {0}")]
    ParseError(String),
    #[error("request rejected: {0}")]
    InvalidRequest(String),
    #[error("no such method: {0}")]
    MethodNotFound(String),
    #[error("bad arguments: {0}")]
    InvalidParams(String),
    #[error("server fault: {0}")]
    InternalError(String),
    #[error("tool failed: {0}")]
    ToolExecutionFailed(String),
}

impl McpError {
    /// JSON-RPC error codes; the -327xx range is reserved by the spec, the
    /// tool-failure code sits in the implementation-defined range.
    pub fn code(&self) -> i32 {
        match self {
            McpError::ParseError(_) => -32700,
            McpError::InvalidRequest(_) => -32600,
            McpError::MethodNotFound(_) => -32601,
            McpError::InvalidParams(_) => -32602,
            McpError::InternalError(_) => -32603,
            McpError::ToolExecutionFailed(_) => -32005,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct McpErrorResponse {
    pub code: i32,
    pub message: String,
}

// --- initialize -----------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct InitializeParams {
    #[serde(default)]
    pub protocol_version: Option<String>,
    #[serde(default)]
    pub client_info: Option<ClientInfo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClientInfo {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    pub protocol_version: String,
    pub capabilities: ServerCapabilities,
    pub server_info: ServerInfo,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServerCapabilities {
    pub tools: Option<ToolsCapability>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolsCapability {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub list_changed: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
}

// --- tools ----------------------------------------------------------------

/// What `tools/list` advertises for one tool. The schema key must reach the
/// client as `inputSchema`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolsListResult {
    pub tools: Vec<ToolDefinition>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ToolsCallParams {
    pub name: String,
    #[serde(default)]
    pub arguments: Option<Value>,
}

/// A tool's payload: text blocks plus an error marker. Failed tool calls
/// still produce a JSON-RPC success carrying `is_error: true`.
#[derive(Debug, Clone, Serialize)]
pub struct ToolsCallResult {
    pub content: Vec<ToolResultContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ToolResultContent {
    Text { text: String },
}

impl ToolsCallResult {
    fn envelope(text: String, failed: bool) -> Self {
        Self {
            content: vec![ToolResultContent::Text { text }],
            is_error: failed.then_some(true),
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::envelope(text.into(), false)
    }

    /// Pretty-printed JSON payload; the tool surface is read by models, and
    /// indentation costs little against a multi-kilobyte schema answer.
    pub fn json<T: Serialize>(value: &T) -> Result<Self, serde_json::Error> {
        serde_json::to_string_pretty(value).map(Self::text)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::envelope(message.into(), true)
    }
}

// --- ping -----------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct PingResult {}
