//! Catalog entities held by the schema cache.
//!
//! Name fields store Oracle's identifier case verbatim; lookups normalize
//! through `UPPER` at the index layer. The `*Json` types fix the wire shapes
//! returned by the tools, with deterministic field order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TableKind {
    #[serde(rename = "TABLE")]
    Table,
    #[serde(rename = "VIEW")]
    View,
    #[serde(rename = "MATERIALIZED_VIEW")]
    MaterializedView,
}

impl TableKind {
    pub fn from_object_type(object_type: &str) -> Option<Self> {
        match object_type {
            "TABLE" => Some(TableKind::Table),
            "VIEW" => Some(TableKind::View),
            "MATERIALIZED VIEW" => Some(TableKind::MaterializedView),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TableKind::Table => "TABLE",
            TableKind::View => "VIEW",
            TableKind::MaterializedView => "MATERIALIZED_VIEW",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnRecord {
    pub name: String,
    /// 1-based ordinal; dense within the owning table.
    pub position: u32,
    /// Canonical Oracle form, e.g. `NUMBER(10,2)`, `VARCHAR2(100 BYTE)`.
    pub data_type: String,
    pub nullable: bool,
    pub default_expr: Option<String>,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OnDelete {
    #[serde(rename = "NO_ACTION")]
    NoAction,
    #[serde(rename = "CASCADE")]
    Cascade,
    #[serde(rename = "SET_NULL")]
    SetNull,
}

impl OnDelete {
    pub fn from_delete_rule(rule: Option<&str>) -> Self {
        match rule {
            Some("CASCADE") => OnDelete::Cascade,
            Some("SET NULL") => OnDelete::SetNull,
            _ => OnDelete::NoAction,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OnDelete::NoAction => "NO_ACTION",
            OnDelete::Cascade => "CASCADE",
            OnDelete::SetNull => "SET_NULL",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForeignKeyRecord {
    pub name: String,
    pub local_columns: Vec<String>,
    pub target_schema: String,
    pub target_table: String,
    pub target_columns: Vec<String>,
    pub on_delete: OnDelete,
    pub deferrable: bool,
    pub enabled: bool,
    /// The referenced table lies outside the target schema; the edge is kept
    /// but will not resolve to a cached table.
    pub external: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckRecord {
    pub name: String,
    pub condition: String,
    pub enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortOrder {
    #[serde(rename = "ASC")]
    Asc,
    #[serde(rename = "DESC")]
    Desc,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexRecord {
    pub name: String,
    pub unique: bool,
    pub columns: Vec<(String, SortOrder)>,
    pub index_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableRecord {
    pub schema: String,
    pub name: String,
    pub kind: TableKind,
    pub columns: Vec<ColumnRecord>,
    pub primary_key: Option<Vec<String>>,
    pub unique_keys: Vec<Vec<String>>,
    pub foreign_keys: Vec<ForeignKeyRecord>,
    pub check_constraints: Vec<CheckRecord>,
    pub indexes: Vec<IndexRecord>,
    pub comment: Option<String>,
    pub last_ddl: Option<DateTime<Utc>>,
    /// False until constraints and indexes have been merged in; a build pass
    /// fills columns first and hydrates the rest in later stages.
    #[serde(default)]
    pub hydrated: bool,
}

impl TableRecord {
    pub fn column(&self, name: &str) -> Option<&ColumnRecord> {
        let upper = name.to_uppercase();
        self.columns.iter().find(|c| c.name.to_uppercase() == upper)
    }
}

/// Stored-object kinds tracked by the PL/SQL inventory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectKind {
    #[serde(rename = "PROCEDURE")]
    Procedure,
    #[serde(rename = "FUNCTION")]
    Function,
    #[serde(rename = "PACKAGE")]
    Package,
    #[serde(rename = "PACKAGE_BODY")]
    PackageBody,
    #[serde(rename = "TRIGGER")]
    Trigger,
    #[serde(rename = "TYPE")]
    Type,
    #[serde(rename = "TYPE_BODY")]
    TypeBody,
    #[serde(rename = "SEQUENCE")]
    Sequence,
    #[serde(rename = "SYNONYM")]
    Synonym,
    #[serde(rename = "VIEW")]
    View,
}

impl ObjectKind {
    /// Parse Oracle's `OBJECT_TYPE` spelling (`PACKAGE BODY`) or the wire
    /// spelling (`PACKAGE_BODY`).
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_uppercase().replace('_', " ").as_str() {
            "PROCEDURE" => Some(ObjectKind::Procedure),
            "FUNCTION" => Some(ObjectKind::Function),
            "PACKAGE" => Some(ObjectKind::Package),
            "PACKAGE BODY" => Some(ObjectKind::PackageBody),
            "TRIGGER" => Some(ObjectKind::Trigger),
            "TYPE" => Some(ObjectKind::Type),
            "TYPE BODY" => Some(ObjectKind::TypeBody),
            "SEQUENCE" => Some(ObjectKind::Sequence),
            "SYNONYM" => Some(ObjectKind::Synonym),
            "VIEW" => Some(ObjectKind::View),
            _ => None,
        }
    }

    /// Oracle's `OBJECT_TYPE` / `ALL_SOURCE.TYPE` spelling.
    pub fn oracle_name(&self) -> &'static str {
        match self {
            ObjectKind::Procedure => "PROCEDURE",
            ObjectKind::Function => "FUNCTION",
            ObjectKind::Package => "PACKAGE",
            ObjectKind::PackageBody => "PACKAGE BODY",
            ObjectKind::Trigger => "TRIGGER",
            ObjectKind::Type => "TYPE",
            ObjectKind::TypeBody => "TYPE BODY",
            ObjectKind::Sequence => "SEQUENCE",
            ObjectKind::Synonym => "SYNONYM",
            ObjectKind::View => "VIEW",
        }
    }

    /// Whether `ALL_SOURCE` carries text for this kind.
    pub fn has_source(&self) -> bool {
        !matches!(
            self,
            ObjectKind::Sequence | ObjectKind::Synonym | ObjectKind::View
        )
    }

    pub fn wire_name(&self) -> String {
        self.oracle_name().replace(' ', "_")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlsqlObject {
    pub schema: String,
    pub name: String,
    pub kind: ObjectKind,
    pub status: String,
    pub last_ddl: Option<DateTime<Utc>>,
    pub source_available: bool,
}

/// Object reference at dependency granularity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectRef {
    pub schema: String,
    pub name: String,
    pub kind: String,
}

impl ObjectRef {
    pub fn new(
        schema: impl Into<String>,
        name: impl Into<String>,
        kind: impl Into<String>,
    ) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
            kind: kind.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DependencyEdge {
    pub referrer: ObjectRef,
    pub referenced: ObjectRef,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeAttribute {
    pub name: String,
    pub data_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserDefinedType {
    pub schema: String,
    pub name: String,
    pub typecode: String,
    pub attributes: Vec<TypeAttribute>,
}

// ---------------------------------------------------------------------------
// Wire shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct ColumnJson {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
    pub nullable: bool,
    pub position: u32,
    pub default: Option<String>,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ForeignKeyRefJson {
    pub schema: String,
    pub table: String,
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ForeignKeyJson {
    pub name: String,
    pub columns: Vec<String>,
    #[serde(rename = "ref")]
    pub target: ForeignKeyRefJson,
    pub on_delete: &'static str,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub external: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct IndexJson {
    pub name: String,
    pub unique: bool,
    pub columns: Vec<(String, &'static str)>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TableRecordJson {
    pub schema: String,
    pub name: String,
    pub kind: &'static str,
    pub columns: Vec<ColumnJson>,
    pub primary_key: Option<Vec<String>>,
    pub foreign_keys: Vec<ForeignKeyJson>,
    pub indexes: Vec<IndexJson>,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckJson {
    pub name: String,
    pub condition: String,
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConstraintsJson {
    pub schema: String,
    pub table: String,
    pub primary_key: Option<Vec<String>>,
    pub unique_keys: Vec<Vec<String>>,
    pub foreign_keys: Vec<ForeignKeyJson>,
    pub check_constraints: Vec<CheckJson>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlsqlObjectJson {
    pub schema: String,
    pub name: String,
    pub kind: String,
    pub status: String,
    pub last_ddl: Option<DateTime<Utc>>,
    pub source_available: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ObjectRefJson {
    pub schema: String,
    pub name: String,
    pub kind: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RelatedTableJson {
    pub schema: String,
    pub name: String,
    pub via: String,
}

impl TableRecord {
    pub fn to_json(&self) -> TableRecordJson {
        TableRecordJson {
            schema: self.schema.clone(),
            name: self.name.clone(),
            kind: self.kind.as_str(),
            columns: self
                .columns
                .iter()
                .map(|c| ColumnJson {
                    name: c.name.clone(),
                    data_type: c.data_type.clone(),
                    nullable: c.nullable,
                    position: c.position,
                    default: c.default_expr.clone(),
                    comment: c.comment.clone(),
                })
                .collect(),
            primary_key: self.primary_key.clone(),
            foreign_keys: self.foreign_keys.iter().map(ForeignKeyRecord::to_json).collect(),
            indexes: self.indexes.iter().map(IndexRecord::to_json).collect(),
            comment: self.comment.clone(),
        }
    }

    pub fn constraints_json(&self) -> ConstraintsJson {
        ConstraintsJson {
            schema: self.schema.clone(),
            table: self.name.clone(),
            primary_key: self.primary_key.clone(),
            unique_keys: self.unique_keys.clone(),
            foreign_keys: self.foreign_keys.iter().map(ForeignKeyRecord::to_json).collect(),
            check_constraints: self
                .check_constraints
                .iter()
                .map(|c| CheckJson {
                    name: c.name.clone(),
                    condition: c.condition.clone(),
                    enabled: c.enabled,
                })
                .collect(),
        }
    }
}

impl ForeignKeyRecord {
    pub fn to_json(&self) -> ForeignKeyJson {
        ForeignKeyJson {
            name: self.name.clone(),
            columns: self.local_columns.clone(),
            target: ForeignKeyRefJson {
                schema: self.target_schema.clone(),
                table: self.target_table.clone(),
                columns: self.target_columns.clone(),
            },
            on_delete: self.on_delete.as_str(),
            external: self.external,
        }
    }
}

impl IndexRecord {
    pub fn to_json(&self) -> IndexJson {
        IndexJson {
            name: self.name.clone(),
            unique: self.unique,
            columns: self
                .columns
                .iter()
                .map(|(name, order)| {
                    (
                        name.clone(),
                        match order {
                            SortOrder::Asc => "ASC",
                            SortOrder::Desc => "DESC",
                        },
                    )
                })
                .collect(),
        }
    }
}

impl PlsqlObject {
    pub fn to_json(&self) -> PlsqlObjectJson {
        PlsqlObjectJson {
            schema: self.schema.clone(),
            name: self.name.clone(),
            kind: self.kind.wire_name(),
            status: self.status.clone(),
            last_ddl: self.last_ddl,
            source_available: self.source_available,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn employees() -> TableRecord {
        TableRecord {
            schema: "HR".into(),
            name: "EMPLOYEES".into(),
            kind: TableKind::Table,
            columns: vec![ColumnRecord {
                name: "EMP_ID".into(),
                position: 1,
                data_type: "NUMBER(10)".into(),
                nullable: false,
                default_expr: None,
                comment: None,
            }],
            primary_key: Some(vec!["EMP_ID".into()]),
            unique_keys: vec![],
            foreign_keys: vec![ForeignKeyRecord {
                name: "FK_DEPT".into(),
                local_columns: vec!["DEPT_ID".into()],
                target_schema: "HR".into(),
                target_table: "DEPARTMENTS".into(),
                target_columns: vec!["DEPT_ID".into()],
                on_delete: OnDelete::NoAction,
                deferrable: false,
                enabled: true,
                external: false,
            }],
            check_constraints: vec![],
            indexes: vec![],
            comment: None,
            last_ddl: None,
            hydrated: true,
        }
    }

    #[test]
    fn test_table_json_shape() {
        let json = serde_json::to_value(employees().to_json()).unwrap();
        assert_eq!(json["schema"], "HR");
        assert_eq!(json["kind"], "TABLE");
        assert_eq!(json["columns"][0]["type"], "NUMBER(10)");
        assert_eq!(json["columns"][0]["position"], 1);
        assert_eq!(json["primary_key"][0], "EMP_ID");
        assert_eq!(json["foreign_keys"][0]["ref"]["table"], "DEPARTMENTS");
        assert_eq!(json["foreign_keys"][0]["on_delete"], "NO_ACTION");
        // A resolvable edge does not carry the external marker.
        assert!(json["foreign_keys"][0].get("external").is_none());
    }

    #[test]
    fn test_external_fk_marked() {
        let mut table = employees();
        table.foreign_keys[0].external = true;
        let json = serde_json::to_value(table.to_json()).unwrap();
        assert_eq!(json["foreign_keys"][0]["external"], true);
    }

    #[test]
    fn test_object_kind_round_trip() {
        assert_eq!(ObjectKind::parse("PACKAGE BODY"), Some(ObjectKind::PackageBody));
        assert_eq!(ObjectKind::parse("package_body"), Some(ObjectKind::PackageBody));
        assert_eq!(ObjectKind::PackageBody.oracle_name(), "PACKAGE BODY");
        assert_eq!(ObjectKind::PackageBody.wire_name(), "PACKAGE_BODY");
        assert!(ObjectKind::parse("DIRECTORY").is_none());
    }

    #[test]
    fn test_source_availability() {
        assert!(ObjectKind::Procedure.has_source());
        assert!(!ObjectKind::Sequence.has_source());
        assert!(!ObjectKind::View.has_source());
    }

    #[test]
    fn test_on_delete_mapping() {
        assert_eq!(OnDelete::from_delete_rule(Some("CASCADE")), OnDelete::Cascade);
        assert_eq!(OnDelete::from_delete_rule(Some("SET NULL")), OnDelete::SetNull);
        assert_eq!(OnDelete::from_delete_rule(Some("NO ACTION")), OnDelete::NoAction);
        assert_eq!(OnDelete::from_delete_rule(None), OnDelete::NoAction);
    }

    #[test]
    fn test_column_lookup_case_insensitive() {
        let table = employees();
        assert!(table.column("emp_id").is_some());
        assert!(table.column("EMP_ID").is_some());
        assert!(table.column("missing").is_none());
    }
}
