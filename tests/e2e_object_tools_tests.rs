//! End-to-end coverage of stored-object, vendor-info and rebuild tools.

mod common;

use common::fixtures::hr_schema;
use common::harness;
use serde_json::json;
use tempfile::tempdir;

#[tokio::test]
async fn test_plsql_objects_listing() {
    let dir = tempdir().unwrap();
    let h = harness(hr_schema(), dir.path()).await;

    let objects = h.call_json("get_pl_sql_objects", json!({})).await;
    let names: Vec<&str> = objects
        .as_array()
        .unwrap()
        .iter()
        .map(|o| o["name"].as_str().unwrap())
        .collect();
    assert!(names.contains(&"PAYROLL"));
    assert!(names.contains(&"EMP_VIEW"));
}

#[tokio::test]
async fn test_plsql_objects_kind_filter() {
    let dir = tempdir().unwrap();
    let h = harness(hr_schema(), dir.path()).await;

    let objects = h
        .call_json("get_pl_sql_objects", json!({ "kinds": ["PACKAGE"] }))
        .await;
    let objects = objects.as_array().unwrap();
    assert_eq!(objects.len(), 1);
    assert_eq!(objects[0]["name"], "PAYROLL");
    assert_eq!(objects[0]["kind"], "PACKAGE");
    assert_eq!(objects[0]["status"], "VALID");
    assert_eq!(objects[0]["source_available"], true);
}

#[tokio::test]
async fn test_plsql_objects_pattern_filter() {
    let dir = tempdir().unwrap();
    let h = harness(hr_schema(), dir.path()).await;

    let objects = h
        .call_json("get_pl_sql_objects", json!({ "name_pattern": "PAY%" }))
        .await;
    assert_eq!(objects.as_array().unwrap().len(), 1);

    let objects = h
        .call_json("get_pl_sql_objects", json!({ "name_pattern": "ZZZ%" }))
        .await;
    assert!(objects.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_plsql_objects_rejects_unknown_kind() {
    let dir = tempdir().unwrap();
    let h = harness(hr_schema(), dir.path()).await;

    let message = h
        .call_expect_error("get_pl_sql_objects", json!({ "kinds": ["GADGET"] }))
        .await;
    assert!(message.starts_with("invalid_argument"), "{message}");
}

#[tokio::test]
async fn test_object_source_with_inferred_kind() {
    let dir = tempdir().unwrap();
    let h = harness(hr_schema(), dir.path()).await;

    let result = h
        .call_json("get_object_source", json!({ "name": "payroll" }))
        .await;
    let source = result["source"].as_str().unwrap();
    assert!(source.contains("PROCEDURE run_monthly"));
    assert_eq!(result["truncated"], false);
}

#[tokio::test]
async fn test_object_source_missing() {
    let dir = tempdir().unwrap();
    let h = harness(hr_schema(), dir.path()).await;

    let result = h
        .call_json(
            "get_object_source",
            json!({ "name": "ghost", "kind": "PROCEDURE" }),
        )
        .await;
    assert_eq!(result["error"], "not_found");
}

#[tokio::test]
async fn test_dependent_objects() {
    let dir = tempdir().unwrap();
    let h = harness(hr_schema(), dir.path()).await;

    let dependents = h
        .call_json("get_dependent_objects", json!({ "name": "employees" }))
        .await;
    let dependents = dependents.as_array().unwrap();
    assert_eq!(dependents.len(), 1);
    assert_eq!(dependents[0]["name"], "EMP_VIEW");
    assert_eq!(dependents[0]["kind"], "VIEW");

    // Kind filter that excludes the only dependent.
    let filtered = h
        .call_json(
            "get_dependent_objects",
            json!({ "name": "employees", "kind": "TRIGGER" }),
        )
        .await;
    assert!(filtered.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_user_defined_types() {
    let dir = tempdir().unwrap();
    let h = harness(hr_schema(), dir.path()).await;

    let types = h.call_json("get_user_defined_types", json!({})).await;
    let types = types.as_array().unwrap();
    assert_eq!(types.len(), 1);
    assert_eq!(types[0]["name"], "ADDRESS_TYPE");
    assert_eq!(types[0]["typecode"], "OBJECT");
    let attrs = types[0]["attributes"].as_array().unwrap();
    assert_eq!(attrs.len(), 2);
    assert_eq!(attrs[0]["name"], "STREET");

    let filtered = h
        .call_json("get_user_defined_types", json!({ "pattern": "NOPE%" }))
        .await;
    assert!(filtered.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_vendor_info() {
    let dir = tempdir().unwrap();
    let h = harness(hr_schema(), dir.path()).await;

    let info = h.call_json("get_database_vendor_info", json!({})).await;
    assert!(info["product"]
        .as_str()
        .unwrap()
        .starts_with("Oracle Database 19c"));
    assert_eq!(info["version"], "19.0.0.0.0");
    assert_eq!(info["schema"], "HR");
    assert_eq!(info["connection_mode"], "thin");
}

#[tokio::test]
async fn test_rebuild_is_idempotent_on_unchanged_catalog() {
    let dir = tempdir().unwrap();
    let h = harness(hr_schema(), dir.path()).await;

    let first = h.call_json("rebuild_schema_cache", json!({})).await;
    let second = h.call_json("rebuild_schema_cache", json!({})).await;

    assert_eq!(first["built"], true);
    assert_eq!(first["tables"], 8);
    assert_eq!(first["fingerprint"], second["fingerprint"]);
    assert_eq!(first["tables"], second["tables"]);
    assert_eq!(first["stages"].as_array().unwrap().len(), 4);
}
