//! Statement-kind gate.
//!
//! Each SQL tool family (SELECT / DDL / DML / PL/SQL) executes through a gate
//! that classifies the statement by its first keyword after comments and
//! whitespace. A mismatch is rejected before the statement reaches the
//! driver. This is the only check separating the four tool families.

use crate::error::ServiceError;

/// The four statement families accepted by the execution tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Select,
    Ddl,
    Dml,
    Plsql,
}

impl StatementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatementKind::Select => "SELECT",
            StatementKind::Ddl => "DDL",
            StatementKind::Dml => "DML",
            StatementKind::Plsql => "PL/SQL",
        }
    }
}

/// Strip leading whitespace, `--` line comments and `/* */` block comments.
pub fn strip_leading_comments(sql: &str) -> &str {
    let mut rest = sql;
    loop {
        let trimmed = rest.trim_start();
        if let Some(after) = trimmed.strip_prefix("--") {
            match after.find('\n') {
                Some(pos) => rest = &after[pos + 1..],
                None => return "",
            }
        } else if let Some(after) = trimmed.strip_prefix("/*") {
            match after.find("*/") {
                Some(pos) => rest = &after[pos + 2..],
                None => return "",
            }
        } else {
            return trimmed;
        }
    }
}

/// The first keyword of the statement, uppercased. `None` for an empty or
/// comment-only statement.
pub fn leading_keyword(sql: &str) -> Option<String> {
    let cleaned = strip_leading_comments(sql);
    let word: String = cleaned
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect();
    if word.is_empty() {
        None
    } else {
        Some(word.to_ascii_uppercase())
    }
}

/// Classify a statement by its leading keyword. `None` when the keyword is
/// unknown or absent.
pub fn classify(sql: &str) -> Option<StatementKind> {
    let keyword = leading_keyword(sql)?;
    match keyword.as_str() {
        "SELECT" | "WITH" => Some(StatementKind::Select),
        // TRUNCATE rides with the DML tool family even though Oracle treats
        // it as DDL: the write tool contract groups it with row mutations.
        "INSERT" | "UPDATE" | "DELETE" | "MERGE" | "TRUNCATE" => Some(StatementKind::Dml),
        "CREATE" | "ALTER" | "DROP" | "RENAME" | "GRANT" | "REVOKE" | "COMMENT" | "PURGE" => {
            Some(StatementKind::Ddl)
        }
        "BEGIN" | "DECLARE" | "CALL" => Some(StatementKind::Plsql),
        _ => None,
    }
}

/// Reject `sql` unless its leading keyword belongs to `expected`.
pub fn enforce(expected: StatementKind, sql: &str) -> Result<(), ServiceError> {
    let found = leading_keyword(sql).unwrap_or_default();
    if classify(sql) == Some(expected) {
        Ok(())
    } else {
        Err(ServiceError::DisallowedStatement {
            expected: expected.as_str(),
            found,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_line_comments() {
        assert_eq!(
            strip_leading_comments("-- comment\nSELECT 1 FROM DUAL"),
            "SELECT 1 FROM DUAL"
        );
        assert_eq!(strip_leading_comments("-- only a comment"), "");
    }

    #[test]
    fn test_strip_block_comments() {
        assert_eq!(
            strip_leading_comments("/* a */ /* b */  SELECT 1"),
            "SELECT 1"
        );
        assert_eq!(strip_leading_comments("/* unterminated"), "");
    }

    #[test]
    fn test_leading_keyword_case_insensitive() {
        assert_eq!(leading_keyword("select * from t"), Some("SELECT".into()));
        assert_eq!(
            leading_keyword("  /* hint */ Update t set x = 1"),
            Some("UPDATE".into())
        );
        assert_eq!(leading_keyword(""), None);
    }

    #[test]
    fn test_classify_families() {
        assert_eq!(classify("WITH cte AS (SELECT 1 FROM DUAL) SELECT * FROM cte"), Some(StatementKind::Select));
        assert_eq!(classify("MERGE INTO t USING d ON (1=1)"), Some(StatementKind::Dml));
        assert_eq!(classify("TRUNCATE TABLE t"), Some(StatementKind::Dml));
        assert_eq!(classify("COMMENT ON TABLE t IS 'x'"), Some(StatementKind::Ddl));
        assert_eq!(classify("DECLARE v NUMBER; BEGIN NULL; END;"), Some(StatementKind::Plsql));
        assert_eq!(classify("EXPLAIN PLAN FOR SELECT 1"), None);
    }

    #[test]
    fn test_enforce_rejects_mismatch() {
        let err = enforce(StatementKind::Select, "DELETE FROM hr.employees").unwrap_err();
        match err {
            ServiceError::DisallowedStatement { expected, found } => {
                assert_eq!(expected, "SELECT");
                assert_eq!(found, "DELETE");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_enforce_accepts_commented_statement() {
        assert!(enforce(StatementKind::Select, "/* read */ select 1 from dual").is_ok());
        assert!(enforce(StatementKind::Plsql, "begin null; end;").is_ok());
    }

    #[test]
    fn test_enforce_rejects_empty() {
        assert!(enforce(StatementKind::Ddl, "   -- nothing\n").is_err());
    }
}
