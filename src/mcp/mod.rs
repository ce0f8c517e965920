//! MCP (Model Context Protocol) layer.
//!
//! JSON-RPC 2.0 message types, the explicit tool registry, and the stdio
//! server loop. Tool semantics live in the engine; this layer only frames
//! and dispatches.

pub mod protocol;
pub mod registry;
pub mod server;

pub use protocol::{McpError, McpRequest, McpResponse};
pub use registry::McpRegistry;
pub use server::run_stdio;
