//! Vendor info and cache administration tools.

use serde_json::Value;

use super::{error_result, json_result};
use crate::engine::context::ToolContext;
use crate::mcp::registry::{McpRegistry, RegisteredTool, ToolBuilder, ToolResult};

pub fn register_tools(registry: &mut McpRegistry) {
    registry.register_tool(get_database_vendor_info_tool());
    registry.register_tool(rebuild_schema_cache_tool());
}

fn get_database_vendor_info_tool() -> RegisteredTool {
    ToolBuilder::new("get_database_vendor_info")
        .description(
            "Report the database product, version, effective schema and driver \
             linkage mode. Use this before writing version-specific SQL.",
        )
        .build(get_database_vendor_info_handler)
}

async fn get_database_vendor_info_handler(ctx: ToolContext, _params: Value) -> ToolResult {
    match ctx.connector.session_info().await {
        Ok(info) => json_result(&serde_json::json!({
            "product": info.product,
            "version": info.version,
            "schema": info.schema,
            "connection_mode": info.connection_mode,
            "additional_info": info.banner.iter().skip(1).collect::<Vec<_>>(),
            "nls": info
                .nls
                .iter()
                .map(|(k, v)| serde_json::json!({ "parameter": k, "value": v }))
                .collect::<Vec<_>>(),
        })),
        Err(err) => Ok(error_result(&err)),
    }
}

fn rebuild_schema_cache_tool() -> RegisteredTool {
    ToolBuilder::new("rebuild_schema_cache")
        .description(
            "Force a full rebuild of the schema cache. Expensive on large \
             schemas; only needed after out-of-band DDL. The cache is built at \
             startup and maintained incrementally otherwise.",
        )
        .build(rebuild_schema_cache_handler)
}

async fn rebuild_schema_cache_handler(ctx: ToolContext, _params: Value) -> ToolResult {
    match ctx.cache.rebuild().await {
        Ok(stats) => {
            let hits = ctx.cache.hit_stats();
            json_result(&serde_json::json!({
                "built": stats.built,
                "duration_ms": stats.duration_ms,
                "tables": stats.tables,
                "fingerprint": stats.fingerprint,
                "stages": stats.stages,
                "cache_stats": hits,
            }))
        }
        Err(err) => Ok(error_result(&err)),
    }
}
