//! Process configuration.
//!
//! Every knob is settable by flag or environment variable and resolves into
//! an immutable [`Config`] constructed once in `main`. There is no other
//! process-wide state.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;

use crate::connector::pool::PoolConfig;
use crate::connector::{ConnectParams, ConnectionMode};

/// Minimum spacing of the optional catalog-generation probe.
const MIN_PROBE_INTERVAL_SECS: u64 = 300;

#[derive(Parser, Debug)]
#[command(name = "oracle-context-server", version, about = "MCP schema-context server for Oracle")]
pub struct CliArgs {
    /// Oracle connection string: user/password@host:port/service.
    #[clap(long, env = "ORACLE_CONNECTION_STRING", hide_env_values = true)]
    pub oracle_connection_string: Option<String>,

    /// Default scope for catalog filters; defaults to the session user.
    #[clap(long, env = "TARGET_SCHEMA")]
    pub target_schema: Option<String>,

    /// Directory holding the persisted schema index files.
    #[clap(long, env = "CACHE_DIR", default_value = ".cache")]
    pub cache_dir: PathBuf,

    /// Use the native client library ("1"/"true"/"yes"); else the pure driver.
    #[clap(long, env = "THICK_MODE")]
    pub thick_mode: Option<String>,

    /// Override the client library path in thick mode.
    #[clap(long, env = "ORACLE_CLIENT_LIB_DIR")]
    pub oracle_client_lib_dir: Option<String>,

    #[clap(long, env = "POOL_SIZE", default_value_t = 8)]
    pub pool_size: usize,

    #[clap(long, env = "POOL_ACQUIRE_TIMEOUT_MS", default_value_t = 5000)]
    pub pool_acquire_timeout_ms: u64,

    #[clap(long, env = "TOOL_DEADLINE_MS", default_value_t = 30000)]
    pub tool_deadline_ms: u64,

    /// Periodic probe of MAX(LAST_DDL_TIME); 0 disables it. Values below
    /// 300s are clamped up.
    #[clap(long, env = "DDL_PROBE_INTERVAL_SECS", default_value_t = 0)]
    pub ddl_probe_interval_secs: u64,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub connect: ConnectParams,
    pub mode: ConnectionMode,
    pub target_schema: Option<String>,
    pub cache_dir: PathBuf,
    pub pool: PoolConfig,
    pub tool_deadline: Duration,
    pub ddl_probe_interval: Option<Duration>,
}

impl Config {
    pub fn resolve(cli: CliArgs) -> Result<Self> {
        let raw_connect = cli
            .oracle_connection_string
            .context("ORACLE_CONNECTION_STRING is required")?;
        let connect = parse_connection_string(&raw_connect)?;

        let thick = cli
            .thick_mode
            .as_deref()
            .map(is_truthy)
            .unwrap_or(false);
        let mode = if thick {
            ConnectionMode::Thick {
                lib_dir: cli.oracle_client_lib_dir,
            }
        } else {
            ConnectionMode::Thin
        };

        if cli.pool_size == 0 {
            bail!("POOL_SIZE must be at least 1");
        }
        let pool = PoolConfig {
            size: cli.pool_size,
            acquire_timeout: Duration::from_millis(cli.pool_acquire_timeout_ms),
            ..PoolConfig::default()
        };

        let ddl_probe_interval = match cli.ddl_probe_interval_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs.max(MIN_PROBE_INTERVAL_SECS))),
        };

        Ok(Self {
            connect,
            mode,
            target_schema: cli.target_schema.filter(|s| !s.trim().is_empty()),
            cache_dir: cli.cache_dir,
            pool,
            tool_deadline: Duration::from_millis(cli.tool_deadline_ms.max(1)),
            ddl_probe_interval,
        })
    }
}

/// Split `user/password@descriptor`. The descriptor is passed through to the
/// driver untouched (host:port/service, TNS alias, or full descriptor).
fn parse_connection_string(raw: &str) -> Result<ConnectParams> {
    let (credentials, descriptor) = raw
        .split_once('@')
        .context("connection string must contain '@' (user/password@host:port/service)")?;
    let (username, password) = credentials
        .split_once('/')
        .context("connection string must contain 'user/password' before '@'")?;
    if username.is_empty() || descriptor.is_empty() {
        bail!("connection string is missing user or descriptor");
    }
    Ok(ConnectParams {
        username: username.to_string(),
        password: password.to_string(),
        descriptor: descriptor.to_string(),
    })
}

fn is_truthy(value: &str) -> bool {
    matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes")
}
