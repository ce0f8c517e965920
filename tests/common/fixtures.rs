//! The HR fixture schema used by the end-to-end tests.

use chrono::{TimeZone, Utc};

use oracle_context_server::connector::driver::{Row, RowSet, SqlValue};

use super::{int, text, FixtureState};

fn ts() -> SqlValue {
    SqlValue::Timestamp(Utc.with_ymd_and_hms(2026, 1, 15, 9, 30, 0).unwrap())
}

fn null() -> SqlValue {
    SqlValue::Null
}

fn inventory_row(name: &str, object_type: &str) -> Row {
    vec![text(name), text(object_type), ts()]
}

#[allow(clippy::too_many_arguments)]
fn column_row(
    table: &str,
    name: &str,
    id: i64,
    data_type: &str,
    length: i64,
    precision: Option<i64>,
    scale: Option<i64>,
    nullable: bool,
) -> Row {
    vec![
        text(table),
        text(name),
        int(id),
        text(data_type),
        int(length),
        if data_type.starts_with("VARCHAR") {
            text("B")
        } else {
            null()
        },
        precision.map(int).unwrap_or_else(null),
        scale.map(int).unwrap_or_else(null),
        text(if nullable { "Y" } else { "N" }),
        null(),
    ]
}

fn constraint_row(
    table: &str,
    name: &str,
    constraint_type: &str,
    r_constraint: Option<&str>,
    delete_rule: Option<&str>,
) -> Row {
    vec![
        text(table),
        text(name),
        text(constraint_type),
        null(),
        if r_constraint.is_some() { text("HR") } else { null() },
        r_constraint.map(text).unwrap_or_else(null),
        delete_rule.map(text).unwrap_or_else(null),
        text("NOT DEFERRABLE"),
        text("ENABLED"),
    ]
}

fn cons_column_row(constraint: &str, table: &str, column: &str, position: i64) -> Row {
    vec![text(constraint), text(table), text(column), int(position)]
}

/// Simple one-ID-column table used by the search scenarios.
fn id_table(state: &mut FixtureState, name: &str, id_column: &str) {
    state.inventory.push(inventory_row(name, "TABLE"));
    state
        .columns
        .push(column_row(name, id_column, 1, "NUMBER", 22, Some(10), Some(0), false));
}

/// The catalog served by the fake driver:
///
/// - `HR.DEPARTMENTS(DEPT_ID PK, DEPT_NAME)`
/// - `HR.EMPLOYEES(EMP_ID PK, FIRST_NAME, DEPT_ID FK -> DEPARTMENTS)`
///   with index `IX_EMP_DEPT`
/// - `CUSTOMER`, `CUSTOMERS`, `CUSTOMER_ORDERS`, `OLD_CUSTOMER`
/// - `ORDERS` / `INVOICES`, both with a `CUSTOMER_ID` column
/// - package `PAYROLL` (with source), view `EMP_VIEW` depending on `EMPLOYEES`
/// - object type `ADDRESS_TYPE`
pub fn hr_schema() -> FixtureState {
    let mut state = FixtureState {
        max_ddl: "20260115093000".into(),
        object_count: 14,
        dml_affected: 1,
        ..FixtureState::default()
    };

    state.inventory.push(inventory_row("DEPARTMENTS", "TABLE"));
    state.columns.extend([
        column_row("DEPARTMENTS", "DEPT_ID", 1, "NUMBER", 22, Some(10), Some(0), false),
        column_row("DEPARTMENTS", "DEPT_NAME", 2, "VARCHAR2", 50, None, None, true),
    ]);
    state
        .tab_comments
        .push(vec![text("DEPARTMENTS"), text("Organizational units")]);

    state.inventory.push(inventory_row("EMPLOYEES", "TABLE"));
    state.columns.extend([
        column_row("EMPLOYEES", "EMP_ID", 1, "NUMBER", 22, Some(10), Some(0), false),
        column_row("EMPLOYEES", "FIRST_NAME", 2, "VARCHAR2", 50, None, None, true),
        column_row("EMPLOYEES", "DEPT_ID", 3, "NUMBER", 22, Some(10), Some(0), true),
    ]);
    state.col_comments.push(vec![
        text("EMPLOYEES"),
        text("EMP_ID"),
        text("Surrogate key"),
    ]);

    state.constraints.extend([
        constraint_row("DEPARTMENTS", "PK_DEPARTMENTS", "P", None, None),
        constraint_row("EMPLOYEES", "PK_EMPLOYEES", "P", None, None),
        constraint_row("EMPLOYEES", "FK_DEPT", "R", Some("PK_DEPARTMENTS"), Some("NO ACTION")),
    ]);
    state.cons_columns.extend([
        cons_column_row("PK_DEPARTMENTS", "DEPARTMENTS", "DEPT_ID", 1),
        cons_column_row("PK_EMPLOYEES", "EMPLOYEES", "EMP_ID", 1),
        cons_column_row("FK_DEPT", "EMPLOYEES", "DEPT_ID", 1),
    ]);

    state.indexes.push(vec![
        text("EMPLOYEES"),
        text("IX_EMP_DEPT"),
        text("NONUNIQUE"),
        text("NORMAL"),
    ]);
    state.ind_columns.push(vec![
        text("IX_EMP_DEPT"),
        text("EMPLOYEES"),
        text("DEPT_ID"),
        int(1),
        text("ASC"),
    ]);

    id_table(&mut state, "CUSTOMER", "CUSTOMER_PK");
    id_table(&mut state, "CUSTOMERS", "CUSTOMER_PK");
    id_table(&mut state, "CUSTOMER_ORDERS", "ORDER_PK");
    id_table(&mut state, "OLD_CUSTOMER", "CUSTOMER_PK");

    state.inventory.push(inventory_row("ORDERS", "TABLE"));
    state.columns.extend([
        column_row("ORDERS", "ORDER_ID", 1, "NUMBER", 22, Some(10), Some(0), false),
        column_row("ORDERS", "CUSTOMER_ID", 2, "NUMBER", 22, None, None, true),
    ]);
    state.inventory.push(inventory_row("INVOICES", "TABLE"));
    state.columns.extend([
        column_row("INVOICES", "INVOICE_ID", 1, "NUMBER", 22, Some(10), Some(0), false),
        column_row("INVOICES", "CUSTOMER_ID", 2, "NUMBER", 22, None, None, true),
    ]);

    state.plsql.extend([
        vec![text("PAYROLL"), text("PACKAGE"), text("VALID"), ts()],
        vec![text("EMP_VIEW"), text("VIEW"), text("VALID"), ts()],
    ]);
    state.sources.insert(
        ("PAYROLL".into(), "PACKAGE".into()),
        vec![
            "PACKAGE payroll AS\n".into(),
            "  PROCEDURE run_monthly;\n".into(),
            "END payroll;\n".into(),
        ],
    );

    state.dependencies.push(vec![
        text("HR"),
        text("EMP_VIEW"),
        text("VIEW"),
        text("HR"),
        text("EMPLOYEES"),
        text("TABLE"),
    ]);

    state.types.push(vec![text("ADDRESS_TYPE"), text("OBJECT")]);
    state.type_attrs.extend([
        vec![text("ADDRESS_TYPE"), text("STREET"), text("VARCHAR2"), int(1)],
        vec![text("ADDRESS_TYPE"), text("CITY"), text("VARCHAR2"), int(2)],
    ]);

    state.select_results.insert(
        "SELECT COUNT(*) FROM HR.EMPLOYEES".into(),
        RowSet {
            columns: vec!["COUNT(*)".into()],
            rows: vec![vec![int(3)]],
        },
    );

    state
}

/// Apply the catalog effect of
/// `ALTER TABLE HR.EMPLOYEES ADD (EMAIL VARCHAR2(100))`.
pub fn add_email_column(state: &mut FixtureState) {
    state
        .columns
        .push(column_row("EMPLOYEES", "EMAIL", 4, "VARCHAR2", 100, None, None, true));
    state.max_ddl = "20260115101500".into();
}
