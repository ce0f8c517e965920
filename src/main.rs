use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use oracle_context_server::cache::SchemaCache;
use oracle_context_server::config::{CliArgs, Config};
use oracle_context_server::connector::{Connector, OracleDriver};
use oracle_context_server::engine::{register_all_tools, ToolContext};
use oracle_context_server::mcp::{run_stdio, McpRegistry};

const EXIT_CONFIG: u8 = 1;
const EXIT_DB_UNREACHABLE: u8 = 2;
const EXIT_CACHE_IO: u8 = 3;

#[tokio::main]
async fn main() -> ExitCode {
    // Stdout carries JSON-RPC frames; all diagnostics go to stderr.
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .unwrap();

    let config = match Config::resolve(CliArgs::parse()) {
        Ok(config) => Arc::new(config),
        Err(e) => {
            error!("configuration error: {e:#}");
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    if let Err(e) = std::fs::create_dir_all(&config.cache_dir) {
        error!(dir = %config.cache_dir.display(), "cannot create cache directory: {e}");
        return ExitCode::from(EXIT_CACHE_IO);
    }

    info!(mode = config.mode.as_str(), "connecting to oracle");
    let driver = Arc::new(OracleDriver::new(config.connect.clone(), config.mode.clone()));
    let connector = match Connector::connect(
        driver,
        config.pool.clone(),
        config.target_schema.clone(),
    )
    .await
    {
        Ok(connector) => Arc::new(connector),
        Err(e) => {
            error!("database unreachable at startup: {e}");
            return ExitCode::from(EXIT_DB_UNREACHABLE);
        }
    };

    info!(schema = connector.target_schema(), "preparing schema cache");
    let cache = match SchemaCache::open(connector.clone(), config.cache_dir.clone()).await {
        Ok(cache) => cache,
        Err(e) => {
            error!("schema cache initialization failed: {e}");
            let code = match e.kind() {
                "connection_error" | "query_error" => EXIT_DB_UNREACHABLE,
                _ => EXIT_CACHE_IO,
            };
            return ExitCode::from(code);
        }
    };
    info!(tables = cache.table_count(), "schema cache ready");

    // Optional staleness probe against MAX(LAST_DDL_TIME).
    if let Some(interval) = config.ddl_probe_interval {
        let probe_cache = cache.clone();
        info!(interval_secs = interval.as_secs(), "catalog generation probe enabled");
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // Skip the immediate first tick.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match probe_cache.probe_generation().await {
                    Ok(true) => info!("catalog generation changed"),
                    Ok(false) => {}
                    Err(e) => error!("generation probe failed: {e}"),
                }
            }
        });
    }

    let mut registry = McpRegistry::new();
    register_all_tools(&mut registry);

    let ctx = ToolContext {
        config,
        connector,
        cache,
    };

    match run_stdio(Arc::new(registry), ctx).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("transport failure: {e}");
            ExitCode::from(EXIT_CONFIG)
        }
    }
}
