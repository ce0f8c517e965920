//! Stdio MCP server loop.
//!
//! Reads line-delimited JSON-RPC from stdin and writes responses to stdout;
//! stderr carries all diagnostics. Tool calls run as independent tasks so
//! slow catalog queries never block the read loop, and every call carries
//! the configured deadline.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use super::protocol::{
    methods, InitializeParams, InitializeResult, McpError, McpRequest, McpResponse, PingResult,
    RequestId, ServerCapabilities, ServerInfo, ToolsCallParams, ToolsCallResult, ToolsCapability,
    ToolsListResult, MCP_PROTOCOL_VERSION,
};
use super::registry::McpRegistry;
use crate::engine::context::ToolContext;

pub fn server_version() -> String {
    format!("{}-{}", env!("CARGO_PKG_VERSION"), env!("GIT_HASH"))
}

/// Run the server until stdin closes or the client sends `shutdown`.
pub async fn run_stdio(registry: Arc<McpRegistry>, ctx: ToolContext) -> anyhow::Result<()> {
    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();

    let (out_tx, mut out_rx) = mpsc::channel::<String>(64);
    let writer = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(line) = out_rx.recv().await {
            if stdout.write_all(line.as_bytes()).await.is_err() {
                break;
            }
            if stdout.write_all(b"\n").await.is_err() {
                break;
            }
            let _ = stdout.flush().await;
        }
    });

    let initialized = Arc::new(AtomicBool::new(false));
    info!(tools = registry.tool_count(), "mcp server ready on stdio");

    while let Some(line) = lines.next_line().await? {
        let line = line.trim().to_string();
        if line.is_empty() {
            continue;
        }

        let request: McpRequest = match serde_json::from_str(&line) {
            Ok(request) => request,
            Err(e) => {
                send(&out_tx, McpResponse::fail(None, McpError::ParseError(e.to_string()))).await;
                continue;
            }
        };

        if request.is_notification() {
            if request.method == methods::INITIALIZED {
                debug!("client initialization complete");
            }
            continue;
        }
        let request_id = request.id.clone().expect("non-notification has an id");

        match request.method.as_str() {
            methods::INITIALIZE => {
                let response = handle_initialize(&request, request_id, &initialized);
                send(&out_tx, response).await;
            }
            methods::PING => {
                let result = serde_json::to_value(PingResult {}).expect("ping serializes");
                send(&out_tx, McpResponse::ok(request_id, result)).await;
            }
            methods::SHUTDOWN => {
                send(&out_tx, McpResponse::ok(request_id, serde_json::Value::Null)).await;
                break;
            }
            methods::TOOLS_LIST => {
                let response = if initialized.load(Ordering::SeqCst) {
                    let result = ToolsListResult {
                        tools: registry.tool_definitions(),
                    };
                    match serde_json::to_value(result) {
                        Ok(value) => McpResponse::ok(request_id, value),
                        Err(e) => McpResponse::fail(
                            Some(request_id),
                            McpError::InternalError(e.to_string()),
                        ),
                    }
                } else {
                    McpResponse::fail(
                        Some(request_id),
                        McpError::InvalidRequest("Not initialized".to_string()),
                    )
                };
                send(&out_tx, response).await;
            }
            methods::TOOLS_CALL => {
                if !initialized.load(Ordering::SeqCst) {
                    send(
                        &out_tx,
                        McpResponse::fail(
                            Some(request_id),
                            McpError::InvalidRequest("Not initialized".to_string()),
                        ),
                    )
                    .await;
                    continue;
                }
                // Concurrent in-flight calls: each runs as its own task.
                let registry = registry.clone();
                let ctx = ctx.clone();
                let out_tx = out_tx.clone();
                tokio::spawn(async move {
                    let response = handle_tools_call(&registry, ctx, &request, request_id).await;
                    send(&out_tx, response).await;
                });
            }
            other => {
                send(
                    &out_tx,
                    McpResponse::fail(
                        Some(request_id),
                        McpError::MethodNotFound(other.to_string()),
                    ),
                )
                .await;
            }
        }
    }

    drop(out_tx);
    let _ = writer.await;
    info!("mcp server shutting down");
    Ok(())
}

async fn send(out_tx: &mpsc::Sender<String>, response: McpResponse) {
    match serde_json::to_string(&response) {
        Ok(json) => {
            if out_tx.send(json).await.is_err() {
                error!("stdout writer gone, dropping response");
            }
        }
        Err(e) => error!("failed to serialize MCP response: {e}"),
    }
}

fn handle_initialize(
    request: &McpRequest,
    request_id: RequestId,
    initialized: &AtomicBool,
) -> McpResponse {
    let params: InitializeParams = request
        .params
        .clone()
        .map(serde_json::from_value)
        .transpose()
        .unwrap_or_default()
        .unwrap_or_default();
    if let Some(client) = &params.client_info {
        debug!(client = %client.name, version = %client.version, "initialize");
    }

    initialized.store(true, Ordering::SeqCst);

    let result = InitializeResult {
        protocol_version: MCP_PROTOCOL_VERSION.to_string(),
        capabilities: ServerCapabilities {
            tools: Some(ToolsCapability { list_changed: None }),
        },
        server_info: ServerInfo {
            name: "oracle-context-server".to_string(),
            version: server_version(),
        },
    };
    match serde_json::to_value(result) {
        Ok(value) => McpResponse::ok(request_id, value),
        Err(e) => McpResponse::fail(Some(request_id), McpError::InternalError(e.to_string())),
    }
}

async fn handle_tools_call(
    registry: &McpRegistry,
    ctx: ToolContext,
    request: &McpRequest,
    request_id: RequestId,
) -> McpResponse {
    let params: Result<ToolsCallParams, McpError> = request
        .params
        .clone()
        .map(serde_json::from_value)
        .transpose()
        .map_err(|e| McpError::InvalidParams(e.to_string()))
        .and_then(|p| p.ok_or_else(|| McpError::InvalidParams("Missing params".to_string())));
    let params = match params {
        Ok(params) => params,
        Err(err) => return McpResponse::fail(Some(request_id), err),
    };

    let Some(tool) = registry.get_tool(&params.name) else {
        return McpResponse::fail(
            Some(request_id),
            McpError::MethodNotFound(format!("Unknown tool: {}", params.name)),
        );
    };

    let deadline = ctx.config.tool_deadline;
    let arguments = params.arguments.unwrap_or_else(|| serde_json::json!({}));
    let outcome = tokio::time::timeout(deadline, (tool.handler)(ctx, arguments)).await;

    let result = match outcome {
        Ok(Ok(result)) => result,
        Ok(Err(err)) => return McpResponse::fail(Some(request_id), err),
        Err(_elapsed) => ToolsCallResult::error(format!(
            "timeout: deadline of {}ms exceeded",
            deadline.as_millis()
        )),
    };
    match serde_json::to_value(result) {
        Ok(value) => McpResponse::ok(request_id, value),
        Err(e) => McpResponse::fail(Some(request_id), McpError::InternalError(e.to_string())),
    }
}
