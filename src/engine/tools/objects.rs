//! Stored-object tools: PL/SQL inventory, source text, dependencies and
//! user-defined types.

use serde::Deserialize;
use serde_json::Value;

use super::{error_result, json_result, not_found_payload, parse_params};
use crate::cache::models::{ObjectKind, ObjectRefJson};
use crate::engine::context::ToolContext;
use crate::error::ServiceError;
use crate::mcp::registry::{McpRegistry, RegisteredTool, ToolBuilder, ToolResult};

pub fn register_tools(registry: &mut McpRegistry) {
    registry.register_tool(get_pl_sql_objects_tool());
    registry.register_tool(get_object_source_tool());
    registry.register_tool(get_dependent_objects_tool());
    registry.register_tool(get_user_defined_types_tool());
}

// ============================================================================
// get_pl_sql_objects
// ============================================================================

#[derive(Debug, Deserialize)]
struct PlsqlParams {
    #[serde(default)]
    name_pattern: Option<String>,
    #[serde(default)]
    kinds: Vec<String>,
}

fn get_pl_sql_objects_tool() -> RegisteredTool {
    ToolBuilder::new("get_pl_sql_objects")
        .description(
            "List stored objects (procedures, functions, packages, triggers, \
             types, sequences, synonyms, views) with status and last DDL time. \
             Filter by '%' name pattern and/or kind list.",
        )
        .input_schema(serde_json::json!({
            "type": "object",
            "properties": {
                "name_pattern": {
                    "type": "string",
                    "description": "Name filter with '%' wildcards, e.g. 'PAY%'"
                },
                "kinds": {
                    "type": "array",
                    "items": {
                        "type": "string",
                        "enum": ["PROCEDURE", "FUNCTION", "PACKAGE", "PACKAGE_BODY",
                                 "TRIGGER", "TYPE", "TYPE_BODY", "SEQUENCE", "SYNONYM", "VIEW"]
                    }
                }
            }
        }))
        .build(get_pl_sql_objects_handler)
}

async fn get_pl_sql_objects_handler(ctx: ToolContext, params: Value) -> ToolResult {
    let params: PlsqlParams = parse_params(params)?;
    let mut kinds = Vec::new();
    for raw in &params.kinds {
        match ObjectKind::parse(raw) {
            Some(kind) => kinds.push(kind),
            None => {
                return Ok(error_result(&ServiceError::InvalidArgument(format!(
                    "unknown object kind {raw:?}"
                ))))
            }
        }
    }
    match ctx
        .cache
        .get_plsql_objects(params.name_pattern.as_deref(), &kinds)
        .await
    {
        Ok(objects) => {
            let payload: Vec<_> = objects.iter().map(|o| o.to_json()).collect();
            json_result(&payload)
        }
        Err(err) => Ok(error_result(&err)),
    }
}

// ============================================================================
// get_object_source
// ============================================================================

#[derive(Debug, Deserialize)]
struct SourceParams {
    name: String,
    #[serde(default)]
    kind: Option<String>,
}

fn get_object_source_tool() -> RegisteredTool {
    ToolBuilder::new("get_object_source")
        .description(
            "Get the stored source of a PL/SQL object. Responses are capped at \
             1 MiB; 'truncated' is set when the cap cut the text.",
        )
        .input_schema(serde_json::json!({
            "type": "object",
            "properties": {
                "name": {
                    "type": "string",
                    "description": "Exact object name (case-insensitive)"
                },
                "kind": {
                    "type": "string",
                    "description": "Object kind, e.g. PACKAGE_BODY; inferred when omitted"
                }
            },
            "required": ["name"]
        }))
        .build(get_object_source_handler)
}

async fn get_object_source_handler(ctx: ToolContext, params: Value) -> ToolResult {
    let params: SourceParams = parse_params(params)?;
    let kind = match &params.kind {
        Some(raw) => match ObjectKind::parse(raw) {
            Some(kind) => Some(kind),
            None => {
                return Ok(error_result(&ServiceError::InvalidArgument(format!(
                    "unknown object kind {raw:?}"
                ))))
            }
        },
        None => None,
    };
    match ctx.cache.get_object_source(&params.name, kind).await {
        Ok((source, truncated)) => json_result(&serde_json::json!({
            "source": source.as_str(),
            "truncated": truncated,
        })),
        Err(ServiceError::NotFound(_)) => json_result(&not_found_payload(&params.name)),
        Err(err) => Ok(error_result(&err)),
    }
}

// ============================================================================
// get_dependent_objects
// ============================================================================

#[derive(Debug, Deserialize)]
struct DependentsParams {
    name: String,
    #[serde(default)]
    kind: Option<String>,
}

fn get_dependent_objects_tool() -> RegisteredTool {
    ToolBuilder::new("get_dependent_objects")
        .description(
            "List objects that depend on the given one (views over it, code \
             calling it, triggers touching it). Impact analysis before \
             altering or dropping anything.",
        )
        .input_schema(serde_json::json!({
            "type": "object",
            "properties": {
                "name": {
                    "type": "string",
                    "description": "Exact object name (case-insensitive)"
                },
                "kind": {
                    "type": "string",
                    "description": "Restrict results to one dependent kind, e.g. VIEW"
                }
            },
            "required": ["name"]
        }))
        .build(get_dependent_objects_handler)
}

async fn get_dependent_objects_handler(ctx: ToolContext, params: Value) -> ToolResult {
    let params: DependentsParams = parse_params(params)?;
    match ctx
        .cache
        .get_dependents(&params.name, params.kind.as_deref())
        .await
    {
        Ok(refs) => {
            let payload: Vec<ObjectRefJson> = refs
                .into_iter()
                .map(|r| ObjectRefJson {
                    schema: r.schema,
                    name: r.name,
                    kind: r.kind,
                })
                .collect();
            json_result(&payload)
        }
        Err(err) => Ok(error_result(&err)),
    }
}

// ============================================================================
// get_user_defined_types
// ============================================================================

#[derive(Debug, Deserialize)]
struct UdtParams {
    #[serde(default)]
    pattern: Option<String>,
}

fn get_user_defined_types_tool() -> RegisteredTool {
    ToolBuilder::new("get_user_defined_types")
        .description(
            "List user-defined types (object types, collections, VARRAYs) with \
             their attributes. Optional '%' name pattern.",
        )
        .input_schema(serde_json::json!({
            "type": "object",
            "properties": {
                "pattern": {
                    "type": "string",
                    "description": "Name filter with '%' wildcards"
                }
            }
        }))
        .build(get_user_defined_types_handler)
}

async fn get_user_defined_types_handler(ctx: ToolContext, params: Value) -> ToolResult {
    let params: UdtParams = parse_params(params)?;
    match ctx
        .cache
        .get_user_defined_types(params.pattern.as_deref())
        .await
    {
        Ok(types) => json_result(&types),
        Err(err) => Ok(error_result(&err)),
    }
}
