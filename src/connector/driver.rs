//! Driver seam.
//!
//! The Oracle client library sits behind this trait pair so the rest of the
//! service is driver-agnostic: the production implementation wraps the
//! `oracle` crate, tests script an in-memory fake. Sessions are blocking;
//! the pool runs them on blocking threads.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// A single value in a result row or a bind position.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SqlValue {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
    Timestamp(DateTime<Utc>),
}

impl SqlValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            SqlValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SqlValue::Int(n) => Some(*n),
            SqlValue::Float(f) => Some(*f as i64),
            SqlValue::Text(s) => s.parse().ok(),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            SqlValue::Timestamp(t) => Some(*t),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// Oracle reports booleans in the dictionary as 'Y'/'N' text.
    pub fn as_yes_no(&self) -> bool {
        matches!(self.as_str(), Some("Y") | Some("YES"))
    }
}

impl From<&str> for SqlValue {
    fn from(s: &str) -> Self {
        SqlValue::Text(s.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(s: String) -> Self {
        SqlValue::Text(s)
    }
}

impl From<i64> for SqlValue {
    fn from(n: i64) -> Self {
        SqlValue::Int(n)
    }
}

pub type Row = Vec<SqlValue>;

/// A fully materialized query result.
#[derive(Debug, Clone, Default)]
pub struct RowSet {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl RowSet {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// ORA codes treated as transient connectivity faults and retried.
const TRANSIENT_ORA_CODES: &[i32] = &[3113, 3114, 12537, 12514];

/// Error surfaced by a driver implementation.
#[derive(Debug, Clone)]
pub enum DriverError {
    /// Could not establish or re-establish a session.
    Connect(String),
    /// Database-side error with its ORA code.
    Db { code: i32, message: String },
    /// Anything else (conversion failures, protocol faults).
    Other(String),
}

impl DriverError {
    pub fn is_transient(&self) -> bool {
        match self {
            DriverError::Connect(_) => true,
            DriverError::Db { code, .. } => TRANSIENT_ORA_CODES.contains(code),
            DriverError::Other(_) => false,
        }
    }
}

impl std::fmt::Display for DriverError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DriverError::Connect(msg) => write!(f, "connect failed: {msg}"),
            DriverError::Db { code, message } => write!(f, "ORA-{code:05}: {message}"),
            DriverError::Other(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for DriverError {}

/// One live database session. Implementations are blocking.
pub trait DriverSession: Send {
    /// Run a query with positional binds and materialize all rows.
    fn query(&self, sql: &str, binds: &[SqlValue]) -> Result<RowSet, DriverError>;

    /// Run a non-query statement; returns the affected row count.
    fn execute(&self, sql: &str, binds: &[SqlValue]) -> Result<u64, DriverError>;

    /// Cheap liveness probe.
    fn ping(&self) -> Result<(), DriverError>;

    /// The session user, as Oracle reports it.
    fn username(&self) -> String;
}

/// Session factory. The pool holds one of these and reconnects through it.
pub trait Driver: Send + Sync {
    fn connect(&self) -> Result<Box<dyn DriverSession>, DriverError>;

    /// Human-readable linkage description ("thin" / "thick"), reported by
    /// `session_info`.
    fn mode(&self) -> &'static str;
}
