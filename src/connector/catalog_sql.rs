//! Parameterized catalog queries against the Oracle data dictionary.
//!
//! Every template filters on a bound `owner` (`:1`); table- or
//! object-targeted variants add further positional binds. Values are never
//! interpolated into SQL text.

use chrono::{DateTime, Utc};

use super::driver::{DriverError, Row, SqlValue};

/// Object inventory for the relations the table cache tracks.
pub const TABLE_INVENTORY: &str = "\
SELECT object_name, object_type, last_ddl_time
FROM all_objects
WHERE owner = :1
  AND object_type IN ('TABLE', 'VIEW', 'MATERIALIZED VIEW')
ORDER BY object_name";

pub const TABLE_INVENTORY_ONE: &str = "\
SELECT object_name, object_type, last_ddl_time
FROM all_objects
WHERE owner = :1
  AND object_name = :2
  AND object_type IN ('TABLE', 'VIEW', 'MATERIALIZED VIEW')";

pub const COLUMNS: &str = "\
SELECT table_name, column_name, column_id, data_type, data_length, char_used,
       data_precision, data_scale, nullable, data_default
FROM all_tab_columns
WHERE owner = :1
ORDER BY table_name, column_id";

pub const COLUMNS_ONE: &str = "\
SELECT table_name, column_name, column_id, data_type, data_length, char_used,
       data_precision, data_scale, nullable, data_default
FROM all_tab_columns
WHERE owner = :1
  AND table_name = :2
ORDER BY column_id";

pub const TABLE_COMMENTS: &str = "\
SELECT table_name, comments
FROM all_tab_comments
WHERE owner = :1
  AND comments IS NOT NULL";

pub const TABLE_COMMENTS_ONE: &str = "\
SELECT table_name, comments
FROM all_tab_comments
WHERE owner = :1
  AND table_name = :2";

pub const COLUMN_COMMENTS: &str = "\
SELECT table_name, column_name, comments
FROM all_col_comments
WHERE owner = :1
  AND comments IS NOT NULL";

pub const COLUMN_COMMENTS_ONE: &str = "\
SELECT table_name, column_name, comments
FROM all_col_comments
WHERE owner = :1
  AND table_name = :2";

pub const CONSTRAINTS: &str = "\
SELECT table_name, constraint_name, constraint_type, search_condition,
       r_owner, r_constraint_name, delete_rule, deferrable, status
FROM all_constraints
WHERE owner = :1";

pub const CONSTRAINTS_ONE: &str = "\
SELECT table_name, constraint_name, constraint_type, search_condition,
       r_owner, r_constraint_name, delete_rule, deferrable, status
FROM all_constraints
WHERE owner = :1
  AND table_name = :2";

/// Resolves a referenced constraint to its owning table.
pub const CONSTRAINT_BY_NAME: &str = "\
SELECT table_name, constraint_name, constraint_type, search_condition,
       r_owner, r_constraint_name, delete_rule, deferrable, status
FROM all_constraints
WHERE owner = :1
  AND constraint_name = :2";

pub const CONSTRAINT_COLUMNS: &str = "\
SELECT constraint_name, table_name, column_name, position
FROM all_cons_columns
WHERE owner = :1
ORDER BY constraint_name, position";

pub const CONSTRAINT_COLUMNS_ONE: &str = "\
SELECT constraint_name, table_name, column_name, position
FROM all_cons_columns
WHERE owner = :1
  AND table_name = :2
ORDER BY constraint_name, position";

pub const CONSTRAINT_COLUMNS_FOR: &str = "\
SELECT constraint_name, table_name, column_name, position
FROM all_cons_columns
WHERE owner = :1
  AND constraint_name = :2
ORDER BY position";

pub const INDEXES: &str = "\
SELECT table_name, index_name, uniqueness, index_type
FROM all_indexes
WHERE owner = :1";

pub const INDEXES_ONE: &str = "\
SELECT table_name, index_name, uniqueness, index_type
FROM all_indexes
WHERE owner = :1
  AND table_name = :2";

pub const INDEX_COLUMNS: &str = "\
SELECT index_name, table_name, column_name, column_position, descend
FROM all_ind_columns
WHERE index_owner = :1
ORDER BY index_name, column_position";

pub const INDEX_COLUMNS_ONE: &str = "\
SELECT index_name, table_name, column_name, column_position, descend
FROM all_ind_columns
WHERE index_owner = :1
  AND table_name = :2
ORDER BY index_name, column_position";

pub const PLSQL_OBJECTS: &str = "\
SELECT object_name, object_type, status, last_ddl_time
FROM all_objects
WHERE owner = :1
  AND object_type IN ('PROCEDURE', 'FUNCTION', 'PACKAGE', 'PACKAGE BODY',
                      'TRIGGER', 'TYPE', 'TYPE BODY', 'SEQUENCE', 'SYNONYM', 'VIEW')
ORDER BY object_name";

pub const OBJECT_SOURCE: &str = "\
SELECT text
FROM all_source
WHERE owner = :1
  AND name = :2
  AND type = :3
ORDER BY line";

/// Objects depending on the given object (one hop).
pub const DEPENDENTS_OF: &str = "\
SELECT owner, name, type
FROM all_dependencies
WHERE referenced_owner = :1
  AND referenced_name = :2
ORDER BY owner, name";

/// Full dependency sweep for the target schema, both endpoints.
pub const DEPENDENCIES: &str = "\
SELECT owner, name, type, referenced_owner, referenced_name, referenced_type
FROM all_dependencies
WHERE owner = :1";

pub const TYPES: &str = "\
SELECT type_name, typecode
FROM all_types
WHERE owner = :1
ORDER BY type_name";

pub const TYPE_ATTRS: &str = "\
SELECT type_name, attr_name, attr_type_name, attr_no
FROM all_type_attrs
WHERE owner = :1
ORDER BY type_name, attr_no";

/// Catalog generation marker: newest DDL timestamp plus object count.
pub const CATALOG_GENERATION: &str = "\
SELECT TO_CHAR(MAX(last_ddl_time), 'YYYYMMDDHH24MISS'), COUNT(*)
FROM all_objects
WHERE owner = :1";

pub const VERSION_BANNER: &str = "SELECT banner FROM v$version";

pub const NLS_SESSION: &str = "\
SELECT parameter, value
FROM nls_session_parameters
WHERE parameter IN ('NLS_COMP', 'NLS_SORT')";

/// Session validation probe used by the pool.
pub const PROBE: &str = "SELECT 1 FROM DUAL";

fn text(row: &Row, i: usize) -> String {
    row.get(i).and_then(|v| v.as_str()).unwrap_or("").to_string()
}

fn opt_text(row: &Row, i: usize) -> Option<String> {
    match row.get(i) {
        Some(SqlValue::Text(s)) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

fn int(row: &Row, i: usize) -> Option<i64> {
    row.get(i).and_then(|v| v.as_i64())
}

fn yes_no(row: &Row, i: usize) -> bool {
    row.get(i).map(|v| v.as_yes_no()).unwrap_or(false)
}

fn timestamp(row: &Row, i: usize) -> Option<DateTime<Utc>> {
    row.get(i).and_then(|v| v.as_timestamp())
}

fn expect(row: &Row, i: usize, what: &str) -> Result<String, DriverError> {
    match opt_text(row, i) {
        Some(s) => Ok(s),
        None => Err(DriverError::Other(format!(
            "catalog row missing {what} at position {i}"
        ))),
    }
}

/// One row of [`TABLE_INVENTORY`].
#[derive(Debug, Clone)]
pub struct InventoryRow {
    pub name: String,
    pub object_type: String,
    pub last_ddl: Option<DateTime<Utc>>,
}

impl InventoryRow {
    pub fn from_row(row: &Row) -> Result<Self, DriverError> {
        Ok(Self {
            name: expect(row, 0, "object_name")?,
            object_type: expect(row, 1, "object_type")?,
            last_ddl: timestamp(row, 2),
        })
    }
}

/// One row of [`COLUMNS`].
#[derive(Debug, Clone)]
pub struct ColumnRow {
    pub table: String,
    pub name: String,
    pub position: i64,
    pub data_type: String,
    pub data_length: Option<i64>,
    pub char_used: Option<String>,
    pub precision: Option<i64>,
    pub scale: Option<i64>,
    pub nullable: bool,
    pub default_expr: Option<String>,
}

impl ColumnRow {
    pub fn from_row(row: &Row) -> Result<Self, DriverError> {
        Ok(Self {
            table: expect(row, 0, "table_name")?,
            name: expect(row, 1, "column_name")?,
            position: int(row, 2).unwrap_or(0),
            data_type: expect(row, 3, "data_type")?,
            data_length: int(row, 4),
            char_used: opt_text(row, 5),
            precision: int(row, 6),
            scale: int(row, 7),
            nullable: yes_no(row, 8),
            default_expr: opt_text(row, 9).map(|s| s.trim().to_string()),
        })
    }

    /// Canonical Oracle rendering, e.g. `NUMBER(10,2)` or `VARCHAR2(100 BYTE)`.
    pub fn canonical_type(&self) -> String {
        match self.data_type.as_str() {
            "NUMBER" => match (self.precision, self.scale) {
                (Some(p), Some(s)) if s != 0 => format!("NUMBER({p},{s})"),
                (Some(p), _) => format!("NUMBER({p})"),
                (None, _) => "NUMBER".to_string(),
            },
            "FLOAT" => match self.precision {
                Some(p) => format!("FLOAT({p})"),
                None => "FLOAT".to_string(),
            },
            "VARCHAR2" | "NVARCHAR2" | "CHAR" | "NCHAR" | "RAW" => {
                let len = self.data_length.unwrap_or(0);
                let unit = match self.char_used.as_deref() {
                    Some("C") => " CHAR",
                    Some("B") => " BYTE",
                    _ => "",
                };
                format!("{}({len}{unit})", self.data_type)
            }
            _ => self.data_type.clone(),
        }
    }
}

/// One row of [`CONSTRAINTS`].
#[derive(Debug, Clone)]
pub struct ConstraintRow {
    pub table: String,
    pub name: String,
    pub constraint_type: String,
    pub search_condition: Option<String>,
    pub r_owner: Option<String>,
    pub r_constraint: Option<String>,
    pub delete_rule: Option<String>,
    pub deferrable: bool,
    pub enabled: bool,
}

impl ConstraintRow {
    pub fn from_row(row: &Row) -> Result<Self, DriverError> {
        Ok(Self {
            table: expect(row, 0, "table_name")?,
            name: expect(row, 1, "constraint_name")?,
            constraint_type: expect(row, 2, "constraint_type")?,
            search_condition: opt_text(row, 3),
            r_owner: opt_text(row, 4),
            r_constraint: opt_text(row, 5),
            delete_rule: opt_text(row, 6),
            deferrable: matches!(opt_text(row, 7).as_deref(), Some("DEFERRABLE")),
            enabled: !matches!(opt_text(row, 8).as_deref(), Some("DISABLED")),
        })
    }
}

/// One row of [`CONSTRAINT_COLUMNS`].
#[derive(Debug, Clone)]
pub struct ConstraintColumnRow {
    pub constraint: String,
    pub table: String,
    pub column: String,
    pub position: i64,
}

impl ConstraintColumnRow {
    pub fn from_row(row: &Row) -> Result<Self, DriverError> {
        Ok(Self {
            constraint: expect(row, 0, "constraint_name")?,
            table: expect(row, 1, "table_name")?,
            column: expect(row, 2, "column_name")?,
            position: int(row, 3).unwrap_or(0),
        })
    }
}

/// One row of [`INDEXES`].
#[derive(Debug, Clone)]
pub struct IndexRow {
    pub table: String,
    pub name: String,
    pub unique: bool,
    pub index_type: String,
}

impl IndexRow {
    pub fn from_row(row: &Row) -> Result<Self, DriverError> {
        Ok(Self {
            table: expect(row, 0, "table_name")?,
            name: expect(row, 1, "index_name")?,
            unique: matches!(opt_text(row, 2).as_deref(), Some("UNIQUE")),
            index_type: text(row, 3),
        })
    }
}

/// One row of [`INDEX_COLUMNS`].
#[derive(Debug, Clone)]
pub struct IndexColumnRow {
    pub index: String,
    pub table: String,
    pub column: String,
    pub position: i64,
    pub descending: bool,
}

impl IndexColumnRow {
    pub fn from_row(row: &Row) -> Result<Self, DriverError> {
        Ok(Self {
            index: expect(row, 0, "index_name")?,
            table: expect(row, 1, "table_name")?,
            column: expect(row, 2, "column_name")?,
            position: int(row, 3).unwrap_or(0),
            descending: matches!(opt_text(row, 4).as_deref(), Some("DESC")),
        })
    }
}

/// One row of [`PLSQL_OBJECTS`].
#[derive(Debug, Clone)]
pub struct ObjectRow {
    pub name: String,
    pub object_type: String,
    pub status: String,
    pub last_ddl: Option<DateTime<Utc>>,
}

impl ObjectRow {
    pub fn from_row(row: &Row) -> Result<Self, DriverError> {
        Ok(Self {
            name: expect(row, 0, "object_name")?,
            object_type: expect(row, 1, "object_type")?,
            status: text(row, 2),
            last_ddl: timestamp(row, 3),
        })
    }
}

/// One row of [`DEPENDENCIES`].
#[derive(Debug, Clone)]
pub struct DependencyRow {
    pub owner: String,
    pub name: String,
    pub object_type: String,
    pub referenced_owner: String,
    pub referenced_name: String,
    pub referenced_type: String,
}

impl DependencyRow {
    pub fn from_row(row: &Row) -> Result<Self, DriverError> {
        Ok(Self {
            owner: expect(row, 0, "owner")?,
            name: expect(row, 1, "name")?,
            object_type: expect(row, 2, "type")?,
            referenced_owner: expect(row, 3, "referenced_owner")?,
            referenced_name: expect(row, 4, "referenced_name")?,
            referenced_type: expect(row, 5, "referenced_type")?,
        })
    }
}

/// One row of [`TYPE_ATTRS`].
#[derive(Debug, Clone)]
pub struct TypeAttrRow {
    pub type_name: String,
    pub attr_name: String,
    pub attr_type: String,
    pub position: i64,
}

impl TypeAttrRow {
    pub fn from_row(row: &Row) -> Result<Self, DriverError> {
        Ok(Self {
            type_name: expect(row, 0, "type_name")?,
            attr_name: expect(row, 1, "attr_name")?,
            attr_type: expect(row, 2, "attr_type_name")?,
            position: int(row, 3).unwrap_or(0),
        })
    }
}
