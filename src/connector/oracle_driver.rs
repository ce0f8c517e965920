//! Production driver backed by the `oracle` crate.
//!
//! Linkage (thin protocol vs. native client library) is chosen once at
//! startup from configuration; there is no runtime fallback between modes.

use chrono::{DateTime, Utc};
use oracle::sql_type::{OracleType, ToSql};
use oracle::{Connection, Row as OracleRow};
use tracing::debug;

use super::driver::{Driver, DriverError, DriverSession, RowSet, SqlValue};

/// Driver linkage selected at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionMode {
    /// Pure-protocol driver path.
    Thin,
    /// Native client library, optionally from an explicit directory.
    Thick { lib_dir: Option<String> },
}

impl ConnectionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionMode::Thin => "thin",
            ConnectionMode::Thick { .. } => "thick",
        }
    }
}

/// Credentials and descriptor split out of `ORACLE_CONNECTION_STRING`.
#[derive(Clone)]
pub struct ConnectParams {
    pub username: String,
    pub password: String,
    pub descriptor: String,
}

// The password must never reach logs or error messages.
impl std::fmt::Debug for ConnectParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectParams")
            .field("username", &self.username)
            .field("password", &"***")
            .field("descriptor", &self.descriptor)
            .finish()
    }
}

pub struct OracleDriver {
    params: ConnectParams,
    mode: ConnectionMode,
}

impl OracleDriver {
    pub fn new(params: ConnectParams, mode: ConnectionMode) -> Self {
        if let ConnectionMode::Thick {
            lib_dir: Some(dir),
        } = &mode
        {
            // The client library is resolved through ORACLE_HOME at load
            // time; this must happen before the first connection attempt.
            std::env::set_var("ORACLE_HOME", dir);
        }
        Self { params, mode }
    }
}

impl Driver for OracleDriver {
    fn connect(&self) -> Result<Box<dyn DriverSession>, DriverError> {
        let mut conn = Connection::connect(
            &self.params.username,
            &self.params.password,
            &self.params.descriptor,
        )
        .map_err(|e| DriverError::Connect(e.to_string()))?;
        conn.set_autocommit(true);
        debug!(mode = self.mode.as_str(), "oracle session established");
        Ok(Box::new(OracleSession {
            conn,
            username: self.params.username.to_uppercase(),
        }))
    }

    fn mode(&self) -> &'static str {
        self.mode.as_str()
    }
}

struct OracleSession {
    conn: Connection,
    username: String,
}

impl DriverSession for OracleSession {
    fn query(&self, sql: &str, binds: &[SqlValue]) -> Result<RowSet, DriverError> {
        let owned = to_sql_params(binds);
        let refs: Vec<&dyn ToSql> = owned.iter().map(|b| b.as_ref()).collect();

        let mut stmt = self.conn.statement(sql).build().map_err(map_err)?;
        let rows = stmt.query(&refs).map_err(map_err)?;

        let column_info: Vec<(String, OracleType)> = rows
            .column_info()
            .iter()
            .map(|ci| (ci.name().to_string(), ci.oracle_type().clone()))
            .collect();

        let mut out = RowSet {
            columns: column_info.iter().map(|(name, _)| name.clone()).collect(),
            rows: Vec::new(),
        };
        for row_result in rows {
            let row = row_result.map_err(map_err)?;
            let mut values = Vec::with_capacity(column_info.len());
            for (idx, (_, otype)) in column_info.iter().enumerate() {
                values.push(value_at(&row, idx, otype)?);
            }
            out.rows.push(values);
        }
        Ok(out)
    }

    fn execute(&self, sql: &str, binds: &[SqlValue]) -> Result<u64, DriverError> {
        let owned = to_sql_params(binds);
        let refs: Vec<&dyn ToSql> = owned.iter().map(|b| b.as_ref()).collect();

        let mut stmt = self.conn.statement(sql).build().map_err(map_err)?;
        stmt.execute(&refs).map_err(map_err)?;
        stmt.row_count().map_err(map_err)
    }

    fn ping(&self) -> Result<(), DriverError> {
        // A plain round-trip beats driver-level liveness flags: it also
        // validates that the session can still parse and execute.
        self.query(super::catalog_sql::PROBE, &[]).map(|_| ())
    }

    fn username(&self) -> String {
        self.username.clone()
    }
}

fn to_sql_params(binds: &[SqlValue]) -> Vec<Box<dyn ToSql>> {
    binds
        .iter()
        .map(|b| -> Box<dyn ToSql> {
            match b {
                SqlValue::Null => Box::new(None::<String>),
                SqlValue::Int(n) => Box::new(*n),
                SqlValue::Float(f) => Box::new(*f),
                SqlValue::Text(s) => Box::new(s.clone()),
                SqlValue::Timestamp(t) => Box::new(*t),
            }
        })
        .collect()
}

fn value_at(row: &OracleRow, idx: usize, otype: &OracleType) -> Result<SqlValue, DriverError> {
    let value = match otype {
        OracleType::Number(precision, scale) if *scale == 0 && *precision > 0 => row
            .get::<usize, Option<i64>>(idx)
            .map_err(map_err)?
            .map(SqlValue::Int),
        OracleType::Int64 | OracleType::UInt64 => row
            .get::<usize, Option<i64>>(idx)
            .map_err(map_err)?
            .map(SqlValue::Int),
        OracleType::Number(..) | OracleType::Float(_) | OracleType::BinaryFloat
        | OracleType::BinaryDouble => row
            .get::<usize, Option<f64>>(idx)
            .map_err(map_err)?
            .map(SqlValue::Float),
        OracleType::Date | OracleType::Timestamp(_) | OracleType::TimestampTZ(_)
        | OracleType::TimestampLTZ(_) => row
            .get::<usize, Option<DateTime<Utc>>>(idx)
            .map_err(map_err)?
            .map(SqlValue::Timestamp),
        _ => row
            .get::<usize, Option<String>>(idx)
            .map_err(map_err)?
            .map(SqlValue::Text),
    };
    Ok(value.unwrap_or(SqlValue::Null))
}

fn map_err(e: oracle::Error) -> DriverError {
    match e.db_error() {
        Some(db) => DriverError::Db {
            code: db.code(),
            message: db.message().trim().to_string(),
        },
        None => DriverError::Other(e.to_string()),
    }
}
