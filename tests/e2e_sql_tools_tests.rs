//! End-to-end coverage of the gated SQL tools and cache invalidation.

mod common;

use common::fixtures::{add_email_column, hr_schema};
use common::harness;
use serde_json::json;
use tempfile::tempdir;

#[tokio::test]
async fn test_read_query_returns_rows() {
    let dir = tempdir().unwrap();
    let h = harness(hr_schema(), dir.path()).await;

    let result = h
        .call_json("read_query", json!({ "sql": "SELECT COUNT(*) FROM HR.EMPLOYEES" }))
        .await;
    assert_eq!(result["columns"], json!(["COUNT(*)"]));
    assert_eq!(result["rows"], json!([[3]]));
    assert_eq!(result["row_count"], 1);
}

#[tokio::test]
async fn test_read_query_rejects_dml() {
    let dir = tempdir().unwrap();
    let h = harness(hr_schema(), dir.path()).await;

    let before = h
        .call_json("read_query", json!({ "sql": "SELECT COUNT(*) FROM HR.EMPLOYEES" }))
        .await;

    let message = h
        .call_expect_error("read_query", json!({ "sql": "DELETE FROM HR.EMPLOYEES" }))
        .await;
    assert!(message.starts_with("disallowed_statement"), "{message}");

    // The statement never reached the driver and no rows changed.
    assert!(h.executed_statements().is_empty());
    let after = h
        .call_json("read_query", json!({ "sql": "SELECT COUNT(*) FROM HR.EMPLOYEES" }))
        .await;
    assert_eq!(before["rows"], after["rows"]);
}

#[tokio::test]
async fn test_ddl_gate_rejects_select() {
    let dir = tempdir().unwrap();
    let h = harness(hr_schema(), dir.path()).await;

    let message = h
        .call_expect_error("exec_ddl_sql", json!({ "sql": "SELECT 1 FROM DUAL" }))
        .await;
    assert!(message.starts_with("disallowed_statement"), "{message}");
    assert!(h.executed_statements().is_empty());
}

#[tokio::test]
async fn test_dml_gate_and_affected_count() {
    let dir = tempdir().unwrap();
    let h = harness(hr_schema(), dir.path()).await;

    let result = h
        .call_json(
            "exec_dml_sql",
            json!({
                "sql": "UPDATE hr.employees SET first_name = :1 WHERE emp_id = :2",
                "params": ["Ada", 1]
            }),
        )
        .await;
    assert_eq!(result["affected"], 1);
    assert_eq!(h.executed_statements().len(), 1);

    let message = h
        .call_expect_error("exec_dml_sql", json!({ "sql": "DROP TABLE hr.employees" }))
        .await;
    assert!(message.starts_with("disallowed_statement"), "{message}");
}

#[tokio::test]
async fn test_plsql_gate() {
    let dir = tempdir().unwrap();
    let h = harness(hr_schema(), dir.path()).await;

    let result = h
        .call_json(
            "exec_pro_sql",
            json!({ "block": "BEGIN payroll.run_monthly; END;" }),
        )
        .await;
    assert_eq!(result["ok"], true);

    let message = h
        .call_expect_error("exec_pro_sql", json!({ "block": "SELECT 1 FROM DUAL" }))
        .await;
    assert!(message.starts_with("disallowed_statement"), "{message}");
}

#[tokio::test]
async fn test_ddl_invalidates_altered_table() {
    let dir = tempdir().unwrap();
    let h = harness(hr_schema(), dir.path()).await;

    // Warm the entry first.
    let before = h
        .call_json("get_table_schema", json!({ "name": "employees" }))
        .await;
    assert_eq!(before["columns"].as_array().unwrap().len(), 3);

    let result = h
        .call_json(
            "exec_ddl_sql",
            json!({ "sql": "ALTER TABLE HR.EMPLOYEES ADD (EMAIL VARCHAR2(100))" }),
        )
        .await;
    assert_eq!(result["ok"], true);
    assert_eq!(h.executed_statements().len(), 1);

    // Reflect the DDL in the scripted catalog, as Oracle would have.
    add_email_column(&mut h.state.lock().unwrap());

    let after = h
        .call_json("get_table_schema", json!({ "name": "employees" }))
        .await;
    let columns: Vec<&str> = after["columns"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["name"].as_str().unwrap())
        .collect();
    assert_eq!(columns, ["EMP_ID", "FIRST_NAME", "DEPT_ID", "EMAIL"]);
    assert_eq!(after["columns"][3]["type"], "VARCHAR2(100 BYTE)");
}

#[tokio::test]
async fn test_unrelated_table_survives_targeted_invalidation() {
    let dir = tempdir().unwrap();
    let h = harness(hr_schema(), dir.path()).await;

    h.call_json("get_table_schema", json!({ "name": "departments" }))
        .await;
    h.call_json(
        "exec_ddl_sql",
        json!({ "sql": "ALTER TABLE HR.EMPLOYEES ADD (EMAIL VARCHAR2(100))" }),
    )
    .await;

    // DEPARTMENTS was not invalidated; its entry still answers.
    let table = h
        .call_json("get_table_schema", json!({ "name": "departments" }))
        .await;
    assert_eq!(table["name"], "DEPARTMENTS");
}

#[tokio::test]
async fn test_plsql_block_invalidates_whole_schema() {
    let dir = tempdir().unwrap();
    let h = harness(hr_schema(), dir.path()).await;

    h.call_json("get_table_schema", json!({ "name": "employees" }))
        .await;
    h.call_json(
        "exec_pro_sql",
        json!({ "block": "BEGIN EXECUTE IMMEDIATE 'ALTER TABLE employees ADD (email VARCHAR2(100))'; END;" }),
    )
    .await;

    add_email_column(&mut h.state.lock().unwrap());

    let after = h
        .call_json("get_table_schema", json!({ "name": "employees" }))
        .await;
    assert_eq!(after["columns"].as_array().unwrap().len(), 4);
}

#[tokio::test]
async fn test_dropped_table_disappears_after_invalidation() {
    let dir = tempdir().unwrap();
    let h = harness(hr_schema(), dir.path()).await;

    h.call_json("get_table_schema", json!({ "name": "old_customer" }))
        .await;
    h.call_json("exec_ddl_sql", json!({ "sql": "DROP TABLE old_customer" }))
        .await;

    {
        let mut state = h.state.lock().unwrap();
        state
            .inventory
            .retain(|row| row[0].as_str() != Some("OLD_CUSTOMER"));
        state
            .columns
            .retain(|row| row[0].as_str() != Some("OLD_CUSTOMER"));
    }

    let result = h
        .call_json("get_table_schema", json!({ "name": "old_customer" }))
        .await;
    assert_eq!(result["error"], "not_found");
}

#[tokio::test]
async fn test_fetch_stream_delivers_and_cancels() {
    use tokio_util::sync::CancellationToken;

    let dir = tempdir().unwrap();
    let h = harness(hr_schema(), dir.path()).await;

    let cancel = CancellationToken::new();
    let mut stream = h
        .ctx
        .connector
        .fetch_stream("SELECT COUNT(*) FROM HR.EMPLOYEES", vec![], cancel.clone())
        .await
        .unwrap();
    assert_eq!(stream.columns, vec!["COUNT(*)"]);
    let row = stream.rows.recv().await.expect("one row");
    assert_eq!(row.len(), 1);
    assert!(stream.rows.recv().await.is_none());

    // A cancelled stream stops delivering.
    let cancel = CancellationToken::new();
    cancel.cancel();
    let mut stream = h
        .ctx
        .connector
        .fetch_stream("SELECT COUNT(*) FROM HR.EMPLOYEES", vec![], cancel)
        .await
        .unwrap();
    assert!(stream.rows.recv().await.is_none());
}

#[tokio::test]
async fn test_bind_values_reject_nested_structures() {
    let dir = tempdir().unwrap();
    let h = harness(hr_schema(), dir.path()).await;

    let message = h
        .call_expect_error(
            "exec_dml_sql",
            json!({
                "sql": "UPDATE t SET x = :1",
                "params": [{ "nested": true }]
            }),
        )
        .await;
    assert!(message.starts_with("invalid_argument"), "{message}");
}
