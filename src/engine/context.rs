//! Tool execution context.
//!
//! One explicit value carrying everything a tool handler may touch. Built
//! once at startup and cloned per call; there is no hidden process state.

use std::sync::Arc;

use crate::cache::SchemaCache;
use crate::config::Config;
use crate::connector::Connector;

#[derive(Clone)]
pub struct ToolContext {
    pub config: Arc<Config>,
    pub connector: Arc<Connector>,
    pub cache: Arc<SchemaCache>,
}
