//! The tool surface exposed through the MCP registry.
//!
//! Each tool is a pure async function over `(ToolContext, arguments)` with a
//! bounded response. Non-fatal failures are wrapped in the tool-result
//! envelope (`is_error: true`) carrying the stable error kind; the JSON-RPC
//! response itself stays a success.

pub mod admin;
pub mod objects;
pub mod schema;
pub mod sql;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::ServiceError;
use crate::mcp::protocol::{McpError, ToolsCallResult};
use crate::mcp::registry::McpRegistry;

pub fn register_all_tools(registry: &mut McpRegistry) {
    schema::register_tools(registry);
    objects::register_tools(registry);
    admin::register_tools(registry);
    sql::register_tools(registry);
}

/// Parse tool arguments, mapping malformed input to `InvalidParams`.
pub(crate) fn parse_params<T: DeserializeOwned>(params: Value) -> Result<T, McpError> {
    serde_json::from_value(params).map_err(|e| McpError::InvalidParams(e.to_string()))
}

/// Wrap a service error in the response envelope.
pub(crate) fn error_result(err: &ServiceError) -> ToolsCallResult {
    ToolsCallResult::error(format!("{}: {}", err.kind(), err))
}

/// Serialize a tool payload, or fail the call on a serializer fault.
pub(crate) fn json_result<T: serde::Serialize>(
    value: &T,
) -> Result<ToolsCallResult, McpError> {
    ToolsCallResult::json(value).map_err(|e| McpError::InternalError(e.to_string()))
}

/// Lookup tools answer `NotFound` as a structured payload, not an error.
pub(crate) fn not_found_payload(name: &str) -> Value {
    serde_json::json!({ "error": "not_found", "name": name })
}
