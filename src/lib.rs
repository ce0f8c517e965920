//! Oracle schema-context server library.
//!
//! Exposes the internal layers for integration testing and reuse: the
//! connector (L1), the schema cache (L2), the context engine (L3) and the
//! MCP framing around them.

pub mod cache;
pub mod config;
pub mod connector;
pub mod engine;
pub mod error;
pub mod mcp;

// Re-export commonly used types for convenience
pub use cache::{BuildStats, SchemaCache};
pub use config::{CliArgs, Config};
pub use connector::Connector;
pub use engine::{register_all_tools, ToolContext};
pub use error::{Result, ServiceError};
pub use mcp::{run_stdio, McpRegistry};
