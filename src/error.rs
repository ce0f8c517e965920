//! Error taxonomy for the schema-context service.
//!
//! Every boundary method returns a tagged outcome from this set. Each variant
//! maps to a stable string via [`ServiceError::kind`], which is what tool
//! responses carry. Messages must never contain credentials or the raw
//! connection string.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ServiceError>;

#[derive(Debug, Error)]
pub enum ServiceError {
    /// Object does not exist in the target schema. Lookup tools return this
    /// as a structured result, not as a tool error.
    #[error("{0} not found")]
    NotFound(String),

    /// Empty name, illegal pattern, limit out of range.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Statement kind did not match the tool's gate.
    #[error("statement is not {expected}: leading keyword {found:?}")]
    DisallowedStatement {
        expected: &'static str,
        found: String,
    },

    /// Pool acquire timeout, driver unreachable, authentication failure.
    #[error("connection error: {0}")]
    ConnectionError(String),

    /// Non-transient SQL error from Oracle, with the vendor error code.
    #[error("ORA-{code:05}: {message}")]
    QueryError { code: i32, message: String },

    /// Bad magic/version/section in the persisted cache file. Logged and the
    /// file is discarded; never surfaced to tool callers.
    #[error("cache file corrupt: {0}")]
    CacheCorrupt(String),

    /// Tool deadline exceeded.
    #[error("deadline of {deadline_ms}ms exceeded")]
    Timeout { deadline_ms: u64 },

    /// Invariant violation.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    /// Stable identifier used in tool response envelopes.
    pub fn kind(&self) -> &'static str {
        match self {
            ServiceError::NotFound(_) => "not_found",
            ServiceError::InvalidArgument(_) => "invalid_argument",
            ServiceError::DisallowedStatement { .. } => "disallowed_statement",
            ServiceError::ConnectionError(_) => "connection_error",
            ServiceError::QueryError { .. } => "query_error",
            ServiceError::CacheCorrupt(_) => "cache_corrupt",
            ServiceError::Timeout { .. } => "timeout",
            ServiceError::Internal(_) => "internal",
        }
    }

    /// Whether a read path may transparently retry once after this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ServiceError::ConnectionError(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_strings_are_stable() {
        assert_eq!(ServiceError::NotFound("T".into()).kind(), "not_found");
        assert_eq!(
            ServiceError::InvalidArgument("x".into()).kind(),
            "invalid_argument"
        );
        assert_eq!(
            ServiceError::DisallowedStatement {
                expected: "SELECT",
                found: "DELETE".into()
            }
            .kind(),
            "disallowed_statement"
        );
        assert_eq!(
            ServiceError::QueryError {
                code: 942,
                message: "table or view does not exist".into()
            }
            .kind(),
            "query_error"
        );
        assert_eq!(
            ServiceError::Timeout { deadline_ms: 30000 }.kind(),
            "timeout"
        );
    }

    #[test]
    fn test_query_error_display_carries_ora_code() {
        let err = ServiceError::QueryError {
            code: 942,
            message: "table or view does not exist".into(),
        };
        assert_eq!(err.to_string(), "ORA-00942: table or view does not exist");
    }

    #[test]
    fn test_only_connection_errors_recoverable() {
        assert!(ServiceError::ConnectionError("reset".into()).is_recoverable());
        assert!(!ServiceError::NotFound("T".into()).is_recoverable());
        assert!(!ServiceError::Timeout { deadline_ms: 1 }.is_recoverable());
    }
}
