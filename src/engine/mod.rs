//! L3: the context engine.
//!
//! Composes the cache and connector into the tool surface advertised over
//! MCP, and derives cache invalidations from write-tool statements.

pub mod context;
pub mod invalidation;
pub mod tools;

pub use context::ToolContext;
pub use tools::register_all_tools;
