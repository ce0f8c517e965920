//! Table lookup and search tools.

use serde::Deserialize;
use serde_json::Value;

use super::{error_result, json_result, not_found_payload, parse_params};
use crate::cache::models::RelatedTableJson;
use crate::engine::context::ToolContext;
use crate::error::ServiceError;
use crate::mcp::registry::{McpRegistry, RegisteredTool, ToolBuilder, ToolResult};

pub fn register_tools(registry: &mut McpRegistry) {
    registry.register_tool(get_table_schema_tool());
    registry.register_tool(get_tables_schema_tool());
    registry.register_tool(search_tables_schema_tool());
    registry.register_tool(search_columns_tool());
    registry.register_tool(get_table_constraints_tool());
    registry.register_tool(get_table_indexes_tool());
    registry.register_tool(get_related_tables_tool());
}

fn name_schema(description: &str) -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "name": {
                "type": "string",
                "description": description
            }
        },
        "required": ["name"]
    })
}

// ============================================================================
// get_table_schema
// ============================================================================

#[derive(Debug, Deserialize)]
struct NameParams {
    name: String,
}

fn get_table_schema_tool() -> RegisteredTool {
    ToolBuilder::new("get_table_schema")
        .description(
            "Get the full schema of one table or view: columns with data types, \
             nullability, defaults and comments, primary key, foreign keys and \
             indexes. The name is case-insensitive and may be schema-qualified.",
        )
        .input_schema(name_schema("Exact table name (case-insensitive)"))
        .build(get_table_schema_handler)
}

async fn get_table_schema_handler(ctx: ToolContext, params: Value) -> ToolResult {
    let params: NameParams = parse_params(params)?;
    match ctx.cache.get_table(&params.name).await {
        Ok(record) => json_result(&record.to_json()),
        Err(ServiceError::NotFound(_)) => json_result(&not_found_payload(&params.name)),
        Err(err) => Ok(error_result(&err)),
    }
}

// ============================================================================
// get_tables_schema
// ============================================================================

#[derive(Debug, Deserialize)]
struct NamesParams {
    names: Vec<String>,
}

fn get_tables_schema_tool() -> RegisteredTool {
    ToolBuilder::new("get_tables_schema")
        .description(
            "Get schemas for several tables in one call. The result maps each \
             requested name to its schema, or to {\"error\": \"not_found\"}; \
             input order is preserved.",
        )
        .input_schema(serde_json::json!({
            "type": "object",
            "properties": {
                "names": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Exact table names (case-insensitive)"
                }
            },
            "required": ["names"]
        }))
        .build(get_tables_schema_handler)
}

async fn get_tables_schema_handler(ctx: ToolContext, params: Value) -> ToolResult {
    let params: NamesParams = parse_params(params)?;
    if params.names.is_empty() {
        return Ok(error_result(&ServiceError::InvalidArgument(
            "names must not be empty".into(),
        )));
    }
    let mut out = serde_json::Map::new();
    for (name, outcome) in ctx.cache.get_tables(&params.names).await {
        let value = match outcome {
            Ok(record) => serde_json::to_value(record.to_json())
                .map_err(|e| crate::mcp::protocol::McpError::InternalError(e.to_string()))?,
            Err(ServiceError::NotFound(_)) => serde_json::json!({ "error": "not_found" }),
            Err(err) => return Ok(error_result(&err)),
        };
        out.insert(name, value);
    }
    json_result(&Value::Object(out))
}

// ============================================================================
// search_tables_schema
// ============================================================================

#[derive(Debug, Deserialize)]
struct SearchParams {
    pattern: String,
    #[serde(default)]
    limit: Option<usize>,
}

fn search_tables_schema_tool() -> RegisteredTool {
    ToolBuilder::new("search_tables_schema")
        .description(
            "Find tables whose name matches a pattern and return their schemas. \
             '%' acts as a wildcard; a pattern without '%' is a case-insensitive \
             substring. Results are ordered exact, prefix, substring, then \
             alphabetically. Limit defaults to 50, capped at 500.",
        )
        .input_schema(serde_json::json!({
            "type": "object",
            "properties": {
                "pattern": {
                    "type": "string",
                    "description": "Name pattern, e.g. 'customer' or 'CUST%'"
                },
                "limit": {
                    "type": "integer",
                    "minimum": 1,
                    "maximum": 500
                }
            },
            "required": ["pattern"]
        }))
        .build(search_tables_schema_handler)
}

async fn search_tables_schema_handler(ctx: ToolContext, params: Value) -> ToolResult {
    let params: SearchParams = parse_params(params)?;
    match ctx.cache.search_tables(&params.pattern, params.limit).await {
        Ok(records) => {
            let payload: Vec<_> = records.iter().map(|r| r.to_json()).collect();
            json_result(&payload)
        }
        Err(err) => Ok(error_result(&err)),
    }
}

// ============================================================================
// search_columns
// ============================================================================

#[derive(Debug, Deserialize)]
struct ColumnSearchParams {
    fragment: String,
    #[serde(default)]
    limit: Option<usize>,
}

fn search_columns_tool() -> RegisteredTool {
    ToolBuilder::new("search_columns")
        .description(
            "Find which tables contain a column matching the fragment. Useful \
             when the data is known but the table is not, e.g. 'customer_id'. \
             Matching follows search_tables_schema; limit defaults to 50.",
        )
        .input_schema(serde_json::json!({
            "type": "object",
            "properties": {
                "fragment": {
                    "type": "string",
                    "description": "Column name fragment or '%' pattern"
                },
                "limit": {
                    "type": "integer",
                    "minimum": 1,
                    "maximum": 500
                }
            },
            "required": ["fragment"]
        }))
        .build(search_columns_handler)
}

async fn search_columns_handler(ctx: ToolContext, params: Value) -> ToolResult {
    let params: ColumnSearchParams = parse_params(params)?;
    match ctx
        .cache
        .search_columns(&params.fragment, params.limit)
        .await
    {
        Ok(hits) => {
            let payload: Vec<Value> = hits
                .into_iter()
                .map(|(schema, table, column, data_type)| {
                    serde_json::json!({
                        "schema": schema,
                        "table": table,
                        "column": column,
                        "data_type": data_type,
                    })
                })
                .collect();
            json_result(&payload)
        }
        Err(err) => Ok(error_result(&err)),
    }
}

// ============================================================================
// get_table_constraints / get_table_indexes
// ============================================================================

fn get_table_constraints_tool() -> RegisteredTool {
    ToolBuilder::new("get_table_constraints")
        .description(
            "Get a table's primary key, unique keys, foreign keys (with \
             referenced tables and columns) and check constraints.",
        )
        .input_schema(name_schema("Exact table name (case-insensitive)"))
        .build(get_table_constraints_handler)
}

async fn get_table_constraints_handler(ctx: ToolContext, params: Value) -> ToolResult {
    let params: NameParams = parse_params(params)?;
    match ctx.cache.get_constraints(&params.name).await {
        Ok(constraints) => json_result(&constraints),
        Err(ServiceError::NotFound(_)) => json_result(&not_found_payload(&params.name)),
        Err(err) => Ok(error_result(&err)),
    }
}

fn get_table_indexes_tool() -> RegisteredTool {
    ToolBuilder::new("get_table_indexes")
        .description("Get a table's indexes with column lists, order and uniqueness.")
        .input_schema(name_schema("Exact table name (case-insensitive)"))
        .build(get_table_indexes_handler)
}

async fn get_table_indexes_handler(ctx: ToolContext, params: Value) -> ToolResult {
    let params: NameParams = parse_params(params)?;
    match ctx.cache.get_indexes(&params.name).await {
        Ok(indexes) => {
            let payload: Vec<_> = indexes.iter().map(|i| i.to_json()).collect();
            json_result(&payload)
        }
        Err(ServiceError::NotFound(_)) => json_result(&not_found_payload(&params.name)),
        Err(err) => Ok(error_result(&err)),
    }
}

// ============================================================================
// get_related_tables
// ============================================================================

fn get_related_tables_tool() -> RegisteredTool {
    ToolBuilder::new("get_related_tables")
        .description(
            "Walk the foreign-key graph one hop in each direction: tables this \
             table references (outgoing) and tables referencing it (incoming), \
             each with the linking columns.",
        )
        .input_schema(name_schema("Exact table name (case-insensitive)"))
        .build(get_related_tables_handler)
}

async fn get_related_tables_handler(ctx: ToolContext, params: Value) -> ToolResult {
    let params: NameParams = parse_params(params)?;
    let schema = ctx.connector.target_schema().to_string();
    match ctx.cache.get_related_tables(&params.name).await {
        Ok((outgoing, incoming)) => {
            let to_json = |pairs: Vec<(String, String)>| -> Vec<RelatedTableJson> {
                pairs
                    .into_iter()
                    .map(|(name, via)| RelatedTableJson {
                        schema: schema.clone(),
                        name,
                        via,
                    })
                    .collect()
            };
            json_result(&serde_json::json!({
                "incoming": to_json(incoming),
                "outgoing": to_json(outgoing),
            }))
        }
        Err(ServiceError::NotFound(_)) => json_result(&not_found_payload(&params.name)),
        Err(err) => Ok(error_result(&err)),
    }
}
