//! Shared test harness: an in-memory driver scripted against the catalog
//! templates, plus helpers to stand up a full engine context without a live
//! Oracle.

// Each integration test binary compiles this module; not every binary uses
// every helper.
#![allow(dead_code)]

pub mod fixtures;

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;

use oracle_context_server::cache::SchemaCache;
use oracle_context_server::config::Config;
use oracle_context_server::connector::catalog_sql as sql;
use oracle_context_server::connector::driver::{
    Driver, DriverError, DriverSession, Row, RowSet, SqlValue,
};
use oracle_context_server::connector::pool::PoolConfig;
use oracle_context_server::connector::{ConnectParams, ConnectionMode, Connector};
use oracle_context_server::engine::{register_all_tools, ToolContext};
use oracle_context_server::mcp::protocol::{ToolResultContent, ToolsCallResult};
use oracle_context_server::mcp::McpRegistry;

pub fn text(s: &str) -> SqlValue {
    SqlValue::Text(s.to_string())
}

pub fn int(n: i64) -> SqlValue {
    SqlValue::Int(n)
}

/// The catalog rows the fake driver serves, laid out per template.
#[derive(Default)]
pub struct FixtureState {
    /// object_name, object_type, last_ddl
    pub inventory: Vec<Row>,
    /// table, column, id, data_type, length, char_used, precision, scale,
    /// nullable, default
    pub columns: Vec<Row>,
    /// table, comment
    pub tab_comments: Vec<Row>,
    /// table, column, comment
    pub col_comments: Vec<Row>,
    /// table, name, type, condition, r_owner, r_constraint, delete_rule,
    /// deferrable, status
    pub constraints: Vec<Row>,
    /// constraint, table, column, position
    pub cons_columns: Vec<Row>,
    /// table, index, uniqueness, index_type
    pub indexes: Vec<Row>,
    /// index, table, column, position, descend
    pub ind_columns: Vec<Row>,
    /// object_name, object_type, status, last_ddl
    pub plsql: Vec<Row>,
    /// (name, type) -> source lines
    pub sources: HashMap<(String, String), Vec<String>>,
    /// owner, name, type, ref_owner, ref_name, ref_type
    pub dependencies: Vec<Row>,
    /// type_name, typecode
    pub types: Vec<Row>,
    /// type_name, attr_name, attr_type, attr_no
    pub type_attrs: Vec<Row>,
    pub max_ddl: String,
    pub object_count: i64,
    /// Canned results for arbitrary SELECT statements (read_query tests).
    pub select_results: HashMap<String, RowSet>,
    /// Every statement that reached `execute`, in order.
    pub executed: Vec<String>,
    /// Affected-row count reported for DML.
    pub dml_affected: u64,
}

impl FixtureState {
    fn filtered(&self, rows: &[Row], col: usize, needle: &SqlValue) -> Vec<Row> {
        rows.iter().filter(|r| &r[col] == needle).cloned().collect()
    }
}

pub struct FakeDriver {
    pub state: Arc<Mutex<FixtureState>>,
}

impl Driver for FakeDriver {
    fn connect(&self) -> Result<Box<dyn DriverSession>, DriverError> {
        Ok(Box::new(FakeSession {
            state: self.state.clone(),
        }))
    }

    fn mode(&self) -> &'static str {
        "thin"
    }
}

struct FakeSession {
    state: Arc<Mutex<FixtureState>>,
}

impl DriverSession for FakeSession {
    fn query(&self, statement: &str, binds: &[SqlValue]) -> Result<RowSet, DriverError> {
        let state = self.state.lock().unwrap();
        let rows: Vec<Row> = match statement {
            sql::PROBE => vec![vec![int(1)]],
            sql::VERSION_BANNER => vec![
                vec![text(
                    "Oracle Database 19c Enterprise Edition Release 19.0.0.0.0 - Production",
                )],
                vec![text("Version 19.22.0.0.0")],
            ],
            sql::NLS_SESSION => vec![
                vec![text("NLS_COMP"), text("BINARY")],
                vec![text("NLS_SORT"), text("BINARY")],
            ],
            sql::CATALOG_GENERATION => {
                vec![vec![text(&state.max_ddl), int(state.object_count)]]
            }
            sql::TABLE_INVENTORY => state.inventory.clone(),
            sql::TABLE_INVENTORY_ONE => state.filtered(&state.inventory, 0, &binds[1]),
            sql::COLUMNS => state.columns.clone(),
            sql::COLUMNS_ONE => state.filtered(&state.columns, 0, &binds[1]),
            sql::TABLE_COMMENTS => state.tab_comments.clone(),
            sql::TABLE_COMMENTS_ONE => state.filtered(&state.tab_comments, 0, &binds[1]),
            sql::COLUMN_COMMENTS => state.col_comments.clone(),
            sql::COLUMN_COMMENTS_ONE => state.filtered(&state.col_comments, 0, &binds[1]),
            sql::CONSTRAINTS => state.constraints.clone(),
            sql::CONSTRAINTS_ONE => state.filtered(&state.constraints, 0, &binds[1]),
            sql::CONSTRAINT_BY_NAME => state.filtered(&state.constraints, 1, &binds[1]),
            sql::CONSTRAINT_COLUMNS => state.cons_columns.clone(),
            sql::CONSTRAINT_COLUMNS_ONE => state.filtered(&state.cons_columns, 1, &binds[1]),
            sql::CONSTRAINT_COLUMNS_FOR => state.filtered(&state.cons_columns, 0, &binds[1]),
            sql::INDEXES => state.indexes.clone(),
            sql::INDEXES_ONE => state.filtered(&state.indexes, 0, &binds[1]),
            sql::INDEX_COLUMNS => state.ind_columns.clone(),
            sql::INDEX_COLUMNS_ONE => state.filtered(&state.ind_columns, 1, &binds[1]),
            sql::PLSQL_OBJECTS => state.plsql.clone(),
            sql::OBJECT_SOURCE => {
                let name = binds[1].as_str().unwrap_or_default().to_string();
                let kind = binds[2].as_str().unwrap_or_default().to_string();
                state
                    .sources
                    .get(&(name, kind))
                    .map(|lines| lines.iter().map(|l| vec![text(l)]).collect())
                    .unwrap_or_default()
            }
            sql::DEPENDENTS_OF => state
                .dependencies
                .iter()
                .filter(|r| r[4] == binds[1])
                .map(|r| vec![r[0].clone(), r[1].clone(), r[2].clone()])
                .collect(),
            sql::DEPENDENCIES => state.dependencies.clone(),
            sql::TYPES => state.types.clone(),
            sql::TYPE_ATTRS => state.type_attrs.clone(),
            other => {
                if let Some(canned) = state.select_results.get(other) {
                    return Ok(canned.clone());
                }
                return Err(DriverError::Db {
                    code: 942,
                    message: "table or view does not exist".into(),
                });
            }
        };
        Ok(RowSet {
            columns: vec![],
            rows,
        })
    }

    fn execute(&self, statement: &str, _binds: &[SqlValue]) -> Result<u64, DriverError> {
        let mut state = self.state.lock().unwrap();
        state.executed.push(statement.to_string());
        Ok(state.dml_affected)
    }

    fn ping(&self) -> Result<(), DriverError> {
        Ok(())
    }

    fn username(&self) -> String {
        "HR".into()
    }
}

/// A full engine context over the fixture: connector, warmed cache, config.
pub struct TestHarness {
    pub ctx: ToolContext,
    pub registry: Arc<McpRegistry>,
    pub state: Arc<Mutex<FixtureState>>,
}

pub async fn harness(state: FixtureState, cache_dir: &Path) -> TestHarness {
    let state = Arc::new(Mutex::new(state));
    let driver = Arc::new(FakeDriver {
        state: state.clone(),
    });
    let connector = Arc::new(
        Connector::connect(driver, PoolConfig::default(), None)
            .await
            .expect("fixture connector"),
    );
    let cache = SchemaCache::open(connector.clone(), cache_dir.to_path_buf())
        .await
        .expect("fixture cache");

    let config = Arc::new(Config {
        connect: ConnectParams {
            username: "HR".into(),
            password: "hr".into(),
            descriptor: "localhost:1521/XEPDB1".into(),
        },
        mode: ConnectionMode::Thin,
        target_schema: None,
        cache_dir: cache_dir.to_path_buf(),
        pool: PoolConfig::default(),
        tool_deadline: Duration::from_millis(30000),
        ddl_probe_interval: None,
    });

    let mut registry = McpRegistry::new();
    register_all_tools(&mut registry);

    TestHarness {
        ctx: ToolContext {
            config,
            connector,
            cache,
        },
        registry: Arc::new(registry),
        state,
    }
}

impl TestHarness {
    /// Invoke a registered tool the way the MCP dispatcher would.
    pub async fn call(&self, tool: &str, args: Value) -> ToolsCallResult {
        let tool = self
            .registry
            .get_tool(tool)
            .unwrap_or_else(|| panic!("tool {tool} not registered"));
        (tool.handler)(self.ctx.clone(), args)
            .await
            .expect("tool call failed at the protocol level")
    }

    /// Invoke a tool and parse its text payload as JSON, asserting success.
    pub async fn call_json(&self, tool: &str, args: Value) -> Value {
        let result = self.call(tool, args).await;
        assert!(
            result.is_error.is_none(),
            "tool returned error: {}",
            payload_text(&result)
        );
        serde_json::from_str(&payload_text(&result)).expect("tool payload is JSON")
    }

    /// Invoke a tool expecting an error envelope; returns the message.
    pub async fn call_expect_error(&self, tool: &str, args: Value) -> String {
        let result = self.call(tool, args).await;
        assert_eq!(result.is_error, Some(true), "expected an error envelope");
        payload_text(&result)
    }

    pub fn executed_statements(&self) -> Vec<String> {
        self.state.lock().unwrap().executed.clone()
    }
}

pub fn payload_text(result: &ToolsCallResult) -> String {
    match result.content.first() {
        Some(ToolResultContent::Text { text }) => text.clone(),
        None => String::new(),
    }
}
