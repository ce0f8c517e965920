//! Deriving cache invalidations from DDL statements.
//!
//! After a successful DDL execution the leading tokens are parsed into an
//! object reference. Modifier keywords (`OR REPLACE`, `IF EXISTS`,
//! `EDITIONABLE`, `GLOBAL TEMPORARY`, ...) are skipped the same way Oracle
//! reads them. When the statement's target cannot be derived the whole
//! schema is invalidated, never nothing.

use crate::cache::models::ObjectRef;
use crate::cache::{normalize_ident, split_qualified};
use crate::connector::gate::strip_leading_comments;

#[derive(Debug, Clone, PartialEq)]
pub enum Invalidation {
    /// One object is stale.
    Object(ObjectRef),
    /// Could not narrow the target; everything is suspect.
    WholeSchema,
    /// No cached state is affected (GRANT/REVOKE/AUDIT).
    None,
}

pub fn invalidation_for_ddl(sql: &str) -> Invalidation {
    let cleaned = strip_leading_comments(sql).to_uppercase();
    let tokens: Vec<&str> = cleaned.split_whitespace().collect();
    let Some(&verb) = tokens.first() else {
        return Invalidation::WholeSchema;
    };

    match verb {
        "GRANT" | "REVOKE" | "AUDIT" | "NOAUDIT" => Invalidation::None,
        "COMMENT" => {
            // COMMENT ON TABLE <name> IS '...' / COMMENT ON COLUMN <t>.<c> ...
            match (tokens.get(1), tokens.get(2)) {
                (Some(&"ON"), Some(&"TABLE")) => object_at(&tokens, 3, "TABLE"),
                (Some(&"ON"), Some(&"COLUMN")) => {
                    // The qualified column name carries the table in front.
                    let Some(raw) = tokens.get(3) else {
                        return Invalidation::WholeSchema;
                    };
                    let mut parts: Vec<&str> = raw.split('.').collect();
                    if parts.len() < 2 {
                        return Invalidation::WholeSchema;
                    }
                    parts.pop();
                    let table = parts.pop().map(normalize_ident).unwrap_or_default();
                    if table.is_empty() {
                        Invalidation::WholeSchema
                    } else {
                        Invalidation::Object(ObjectRef::new("", table, "TABLE"))
                    }
                }
                _ => Invalidation::WholeSchema,
            }
        }
        "TRUNCATE" => match tokens.get(1) {
            Some(&"TABLE") => object_at(&tokens, 2, "TABLE"),
            _ => Invalidation::WholeSchema,
        },
        "RENAME" => object_at(&tokens, 1, "TABLE"),
        "CREATE" | "ALTER" | "DROP" => {
            let mut idx = 1usize;

            // Oracle 23ai IF [NOT] EXISTS.
            if tokens.get(idx) == Some(&"IF") {
                if tokens.get(idx + 1) == Some(&"NOT") && tokens.get(idx + 2) == Some(&"EXISTS") {
                    idx += 3;
                } else if tokens.get(idx + 1) == Some(&"EXISTS") {
                    idx += 2;
                }
            }
            if verb == "CREATE" {
                if tokens.get(idx) == Some(&"OR") && tokens.get(idx + 1) == Some(&"REPLACE") {
                    idx += 2;
                }
                if matches!(tokens.get(idx), Some(&"EDITIONABLE") | Some(&"NONEDITIONABLE")) {
                    idx += 1;
                }
                if tokens.get(idx) == Some(&"NO") && tokens.get(idx + 1) == Some(&"FORCE") {
                    idx += 2;
                } else if tokens.get(idx) == Some(&"FORCE") {
                    idx += 1;
                }
                if matches!(tokens.get(idx), Some(&"GLOBAL") | Some(&"PRIVATE"))
                    && tokens.get(idx + 1) == Some(&"TEMPORARY")
                {
                    idx += 2;
                }
                if tokens.get(idx) == Some(&"UNIQUE") || tokens.get(idx) == Some(&"BITMAP") {
                    idx += 1;
                }
            }

            let object_type = match tokens.get(idx) {
                Some(&"MATERIALIZED") if tokens.get(idx + 1) == Some(&"VIEW") => {
                    idx += 1;
                    "MATERIALIZED VIEW"
                }
                Some(&"PACKAGE") if tokens.get(idx + 1) == Some(&"BODY") => {
                    idx += 1;
                    "PACKAGE BODY"
                }
                Some(&"TYPE") if tokens.get(idx + 1) == Some(&"BODY") => {
                    idx += 1;
                    "TYPE BODY"
                }
                Some(&t) => t,
                None => return Invalidation::WholeSchema,
            };

            match object_type {
                "TABLE" | "VIEW" | "MATERIALIZED VIEW" | "SEQUENCE" | "SYNONYM" | "TRIGGER"
                | "PROCEDURE" | "FUNCTION" | "PACKAGE" | "PACKAGE BODY" | "TYPE" | "TYPE BODY" => {
                    object_at(&tokens, idx + 1, object_type)
                }
                "INDEX" => {
                    // CREATE INDEX name ON table (...) names the table; ALTER
                    // and DROP INDEX do not, so those widen to the schema.
                    if verb == "CREATE" {
                        if let Some(on_pos) = tokens.iter().position(|t| *t == "ON") {
                            return object_at(&tokens, on_pos + 1, "TABLE");
                        }
                    }
                    Invalidation::WholeSchema
                }
                _ => Invalidation::WholeSchema,
            }
        }
        _ => Invalidation::WholeSchema,
    }
}

fn object_at(tokens: &[&str], idx: usize, kind: &str) -> Invalidation {
    let Some(raw) = tokens.get(idx) else {
        return Invalidation::WholeSchema;
    };
    // The name token may drag a parenthesis or semicolon along.
    let raw = raw
        .split('(')
        .next()
        .unwrap_or("")
        .trim_end_matches([';', ',']);
    if raw.is_empty() {
        return Invalidation::WholeSchema;
    }
    let (schema, name) = split_qualified(raw);
    if name.is_empty() {
        return Invalidation::WholeSchema;
    }
    Invalidation::Object(ObjectRef::new(schema.unwrap_or_default(), name, kind))
}
