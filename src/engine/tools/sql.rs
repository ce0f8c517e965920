//! SQL execution tools.
//!
//! Thin wrappers over the connector with the statement-kind gate. Successful
//! DDL posts an invalidation derived from the statement's leading tokens;
//! PL/SQL blocks invalidate the whole schema since their effects are opaque.

use serde::Deserialize;
use serde_json::Value;

use super::{error_result, json_result, parse_params};
use crate::connector::driver::SqlValue;
use crate::connector::gate::StatementKind;
use crate::engine::context::ToolContext;
use crate::engine::invalidation::{invalidation_for_ddl, Invalidation};
use crate::error::ServiceError;
use crate::mcp::registry::{McpRegistry, RegisteredTool, ToolBuilder, ToolResult};

pub fn register_tools(registry: &mut McpRegistry) {
    registry.register_tool(read_query_tool());
    registry.register_tool(exec_ddl_sql_tool());
    registry.register_tool(exec_dml_sql_tool());
    registry.register_tool(exec_pro_sql_tool());
}

/// JSON scalars accepted as bind parameters.
fn bind_values(params: &[Value]) -> Result<Vec<SqlValue>, ServiceError> {
    params
        .iter()
        .map(|v| match v {
            Value::Null => Ok(SqlValue::Null),
            Value::String(s) => Ok(SqlValue::Text(s.clone())),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(SqlValue::Int(i))
                } else {
                    Ok(SqlValue::Float(n.as_f64().unwrap_or(0.0)))
                }
            }
            Value::Bool(b) => Ok(SqlValue::Int(*b as i64)),
            other => Err(ServiceError::InvalidArgument(format!(
                "unsupported bind value: {other}"
            ))),
        })
        .collect()
}

// ============================================================================
// read_query
// ============================================================================

#[derive(Debug, Deserialize)]
struct ReadQueryParams {
    sql: String,
    #[serde(default)]
    params: Vec<Value>,
}

fn read_query_tool() -> RegisteredTool {
    ToolBuilder::new("read_query")
        .description(
            "Execute a SELECT (or WITH) query with optional positional bind \
             parameters. Any other statement kind is rejected before reaching \
             the database.",
        )
        .input_schema(serde_json::json!({
            "type": "object",
            "properties": {
                "sql": {
                    "type": "string",
                    "description": "The SELECT statement to run"
                },
                "params": {
                    "type": "array",
                    "items": {},
                    "description": "Positional bind values for :1, :2, ..."
                }
            },
            "required": ["sql"]
        }))
        .build(read_query_handler)
}

async fn read_query_handler(ctx: ToolContext, params: Value) -> ToolResult {
    let params: ReadQueryParams = parse_params(params)?;
    if let Err(err) = crate::connector::gate::enforce(StatementKind::Select, &params.sql) {
        return Ok(error_result(&err));
    }
    let binds = match bind_values(&params.params) {
        Ok(binds) => binds,
        Err(err) => return Ok(error_result(&err)),
    };
    match ctx.connector.fetch_all(&params.sql, binds).await {
        Ok(rows) => {
            let row_count = rows.rows.len();
            json_result(&serde_json::json!({
                "columns": rows.columns,
                "rows": rows.rows,
                "row_count": row_count,
            }))
        }
        Err(err) => Ok(error_result(&err)),
    }
}

// ============================================================================
// exec_ddl_sql
// ============================================================================

#[derive(Debug, Deserialize)]
struct ExecSqlParams {
    sql: String,
    #[serde(default)]
    params: Vec<Value>,
}

fn exec_ddl_sql_tool() -> RegisteredTool {
    ToolBuilder::new("exec_ddl_sql")
        .description(
            "Execute a DDL statement (CREATE/ALTER/DROP/RENAME/COMMENT/...). \
             On success the affected cache entries are invalidated so the next \
             lookup observes the change.",
        )
        .input_schema(serde_json::json!({
            "type": "object",
            "properties": {
                "sql": {
                    "type": "string",
                    "description": "The DDL statement to run"
                }
            },
            "required": ["sql"]
        }))
        .build(exec_ddl_sql_handler)
}

async fn exec_ddl_sql_handler(ctx: ToolContext, params: Value) -> ToolResult {
    let params: ExecSqlParams = parse_params(params)?;
    match ctx
        .connector
        .execute(&params.sql, vec![], StatementKind::Ddl)
        .await
    {
        Ok(_) => {
            match invalidation_for_ddl(&params.sql) {
                Invalidation::Object(obj) => ctx.cache.invalidate(&obj),
                Invalidation::WholeSchema => ctx.cache.invalidate_all(),
                Invalidation::None => {}
            }
            json_result(&serde_json::json!({ "ok": true }))
        }
        Err(err) => Ok(error_result(&err)),
    }
}

// ============================================================================
// exec_dml_sql
// ============================================================================

fn exec_dml_sql_tool() -> RegisteredTool {
    ToolBuilder::new("exec_dml_sql")
        .description(
            "Execute an INSERT/UPDATE/DELETE/MERGE/TRUNCATE statement with \
             optional positional binds; returns the affected row count.",
        )
        .input_schema(serde_json::json!({
            "type": "object",
            "properties": {
                "sql": {
                    "type": "string",
                    "description": "The DML statement to run"
                },
                "params": {
                    "type": "array",
                    "items": {},
                    "description": "Positional bind values for :1, :2, ..."
                }
            },
            "required": ["sql"]
        }))
        .build(exec_dml_sql_handler)
}

async fn exec_dml_sql_handler(ctx: ToolContext, params: Value) -> ToolResult {
    let params: ExecSqlParams = parse_params(params)?;
    let binds = match bind_values(&params.params) {
        Ok(binds) => binds,
        Err(err) => return Ok(error_result(&err)),
    };
    match ctx
        .connector
        .execute(&params.sql, binds, StatementKind::Dml)
        .await
    {
        Ok(affected) => json_result(&serde_json::json!({ "affected": affected })),
        Err(err) => Ok(error_result(&err)),
    }
}

// ============================================================================
// exec_pro_sql
// ============================================================================

#[derive(Debug, Deserialize)]
struct ProSqlParams {
    block: String,
}

fn exec_pro_sql_tool() -> RegisteredTool {
    ToolBuilder::new("exec_pro_sql")
        .description(
            "Execute an anonymous PL/SQL block (BEGIN/DECLARE) or CALL. The \
             block may perform DDL internally, so the schema cache is \
             conservatively invalidated afterwards.",
        )
        .input_schema(serde_json::json!({
            "type": "object",
            "properties": {
                "block": {
                    "type": "string",
                    "description": "The PL/SQL block to run"
                }
            },
            "required": ["block"]
        }))
        .build(exec_pro_sql_handler)
}

async fn exec_pro_sql_handler(ctx: ToolContext, params: Value) -> ToolResult {
    let params: ProSqlParams = parse_params(params)?;
    match ctx
        .connector
        .execute(&params.block, vec![], StatementKind::Plsql)
        .await
    {
        Ok(_) => {
            ctx.cache.invalidate_all();
            json_result(&serde_json::json!({ "ok": true }))
        }
        Err(err) => Ok(error_result(&err)),
    }
}
