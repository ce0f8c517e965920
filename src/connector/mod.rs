//! L1: pooled Oracle session access.
//!
//! The [`Connector`] owns the session pool and exposes the execution
//! primitives (`fetch_all`, `fetch_stream`, `execute` with its statement-kind
//! gate, `session_info`) plus the parameterized catalog queries the schema
//! cache builds from. It connects eagerly at startup and never falls back
//! silently.

pub mod catalog_sql;
pub mod driver;
pub mod gate;
pub mod oracle_driver;
pub mod pool;

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::{Result, ServiceError};
use catalog_sql::{
    ColumnRow, ConstraintColumnRow, ConstraintRow, DependencyRow, IndexColumnRow, IndexRow,
    InventoryRow, ObjectRow, TypeAttrRow,
};
use driver::{Driver, DriverError, Row, RowSet, SqlValue};
use gate::StatementKind;
use pool::{service_error, PoolConfig, SessionPool};

pub use driver::{DriverSession, SqlValue as Value};
pub use oracle_driver::{ConnectParams, ConnectionMode, OracleDriver};

/// Session facts relevant to identifier comparison and dialect selection.
#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub product: String,
    pub version: String,
    pub banner: Vec<String>,
    pub schema: String,
    pub username: String,
    pub connection_mode: &'static str,
    pub nls: Vec<(String, String)>,
}

/// A finite, cancellable sequence of rows.
pub struct RowStream {
    pub columns: Vec<String>,
    pub rows: mpsc::Receiver<Row>,
}

pub struct Connector {
    pool: SessionPool,
    mode: &'static str,
    target_schema: String,
    session_user: String,
}

impl Connector {
    /// Open the pool and verify the database is reachable. The first session
    /// is established here; an unreachable database fails startup.
    pub async fn connect(
        driver: Arc<dyn Driver>,
        pool_config: PoolConfig,
        target_schema: Option<String>,
    ) -> Result<Self> {
        let mode = driver.mode();
        let pool = SessionPool::new(driver, pool_config);
        let session_user = pool
            .run(|s| Ok::<_, DriverError>(s.username()))
            .await?;
        let target_schema = target_schema
            .filter(|s| !s.trim().is_empty())
            .map(|s| s.trim().to_uppercase())
            .unwrap_or_else(|| session_user.clone());
        info!(mode, schema = %target_schema, "connected to oracle");
        Ok(Self {
            pool,
            mode,
            target_schema,
            session_user,
        })
    }

    /// The schema all catalog filters bind as `OWNER`.
    pub fn target_schema(&self) -> &str {
        &self.target_schema
    }

    pub async fn fetch_all(&self, sql: &str, binds: Vec<SqlValue>) -> Result<RowSet> {
        let sql = sql.to_string();
        self.pool.run(move |s| s.query(&sql, &binds)).await
    }

    /// Materialize the result on a pooled session, then hand rows out through
    /// a bounded channel. Cancelling (or dropping the receiver) stops
    /// delivery; the session is released as soon as the fetch completes.
    pub async fn fetch_stream(
        &self,
        sql: &str,
        binds: Vec<SqlValue>,
        cancel: CancellationToken,
    ) -> Result<RowStream> {
        let rowset = self.fetch_all(sql, binds).await?;
        let columns = rowset.columns;
        let (tx, rx) = mpsc::channel(64);
        tokio::spawn(async move {
            for row in rowset.rows {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    sent = tx.send(row) => {
                        if sent.is_err() {
                            break;
                        }
                    }
                }
            }
        });
        Ok(RowStream { columns, rows: rx })
    }

    /// Execute a statement after checking it against the kind gate. Returns
    /// the affected row count (0 for DDL and PL/SQL blocks).
    pub async fn execute(
        &self,
        sql: &str,
        binds: Vec<SqlValue>,
        kind: StatementKind,
    ) -> Result<u64> {
        gate::enforce(kind, sql)?;
        let sql = sql.to_string();
        self.pool.run(move |s| s.execute(&sql, &binds)).await
    }

    pub async fn session_info(&self) -> Result<SessionInfo> {
        let banner_rows = self.fetch_all(catalog_sql::VERSION_BANNER, vec![]).await?;
        let banner: Vec<String> = banner_rows
            .rows
            .iter()
            .filter_map(|r| r.first().and_then(|v| v.as_str()).map(str::to_string))
            .collect();
        let product = banner.first().cloned().unwrap_or_else(|| "Oracle".into());
        let version = extract_version(&product);

        let nls = self
            .fetch_all(catalog_sql::NLS_SESSION, vec![])
            .await
            .map(|rs| {
                rs.rows
                    .iter()
                    .filter_map(|r| {
                        Some((
                            r.first()?.as_str()?.to_string(),
                            r.get(1)?.as_str()?.to_string(),
                        ))
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(SessionInfo {
            product,
            version,
            banner,
            schema: self.target_schema.clone(),
            username: self.session_user.clone(),
            connection_mode: self.mode,
            nls,
        })
    }

    // ------------------------------------------------------------------
    // Catalog queries (all filtered by the bound target schema)
    // ------------------------------------------------------------------

    /// Generation marker for the fingerprint: newest `LAST_DDL_TIME` plus
    /// object count.
    pub async fn catalog_generation(&self) -> Result<String> {
        let rows = self
            .fetch_all(catalog_sql::CATALOG_GENERATION, vec![self.owner()])
            .await?;
        let row = rows
            .rows
            .first()
            .ok_or_else(|| ServiceError::Internal("generation query returned no row".into()))?;
        let max_ddl = row
            .first()
            .and_then(|v| v.as_str())
            .unwrap_or("none")
            .to_string();
        let count = row.get(1).and_then(|v| v.as_i64()).unwrap_or(0);
        Ok(format!("{max_ddl}:{count}"))
    }

    pub async fn table_inventory(&self, table: Option<&str>) -> Result<Vec<InventoryRow>> {
        match table {
            Some(name) => {
                self.fetch_mapped(
                    catalog_sql::TABLE_INVENTORY_ONE,
                    vec![self.owner(), name.into()],
                    InventoryRow::from_row,
                )
                .await
            }
            None => {
                self.fetch_mapped(
                    catalog_sql::TABLE_INVENTORY,
                    vec![self.owner()],
                    InventoryRow::from_row,
                )
                .await
            }
        }
    }

    pub async fn columns(&self, table: Option<&str>) -> Result<Vec<ColumnRow>> {
        match table {
            Some(name) => {
                self.fetch_mapped(
                    catalog_sql::COLUMNS_ONE,
                    vec![self.owner(), name.into()],
                    ColumnRow::from_row,
                )
                .await
            }
            None => {
                self.fetch_mapped(catalog_sql::COLUMNS, vec![self.owner()], ColumnRow::from_row)
                    .await
            }
        }
    }

    pub async fn table_comments(&self, table: Option<&str>) -> Result<Vec<(String, String)>> {
        let rows = match table {
            Some(name) => {
                self.fetch_all(
                    catalog_sql::TABLE_COMMENTS_ONE,
                    vec![self.owner(), name.into()],
                )
                .await?
            }
            None => {
                self.fetch_all(catalog_sql::TABLE_COMMENTS, vec![self.owner()])
                    .await?
            }
        };
        Ok(rows
            .rows
            .iter()
            .filter_map(|r| {
                Some((
                    r.first()?.as_str()?.to_string(),
                    r.get(1)?.as_str()?.to_string(),
                ))
            })
            .collect())
    }

    pub async fn column_comments(
        &self,
        table: Option<&str>,
    ) -> Result<Vec<(String, String, String)>> {
        let rows = match table {
            Some(name) => {
                self.fetch_all(
                    catalog_sql::COLUMN_COMMENTS_ONE,
                    vec![self.owner(), name.into()],
                )
                .await?
            }
            None => {
                self.fetch_all(catalog_sql::COLUMN_COMMENTS, vec![self.owner()])
                    .await?
            }
        };
        Ok(rows
            .rows
            .iter()
            .filter_map(|r| {
                Some((
                    r.first()?.as_str()?.to_string(),
                    r.get(1)?.as_str()?.to_string(),
                    r.get(2)?.as_str()?.to_string(),
                ))
            })
            .collect())
    }

    pub async fn constraints(&self, table: Option<&str>) -> Result<Vec<ConstraintRow>> {
        match table {
            Some(name) => {
                self.fetch_mapped(
                    catalog_sql::CONSTRAINTS_ONE,
                    vec![self.owner(), name.into()],
                    ConstraintRow::from_row,
                )
                .await
            }
            None => {
                self.fetch_mapped(
                    catalog_sql::CONSTRAINTS,
                    vec![self.owner()],
                    ConstraintRow::from_row,
                )
                .await
            }
        }
    }

    /// Resolve a constraint by `(owner, name)`; used to chase foreign keys
    /// whose referenced constraint may live outside the target schema.
    pub async fn constraint_by_name(
        &self,
        owner: &str,
        name: &str,
    ) -> Result<Option<ConstraintRow>> {
        let rows = self
            .fetch_mapped(
                catalog_sql::CONSTRAINT_BY_NAME,
                vec![owner.into(), name.into()],
                ConstraintRow::from_row,
            )
            .await?;
        Ok(rows.into_iter().next())
    }

    pub async fn constraint_columns(
        &self,
        table: Option<&str>,
    ) -> Result<Vec<ConstraintColumnRow>> {
        match table {
            Some(name) => {
                self.fetch_mapped(
                    catalog_sql::CONSTRAINT_COLUMNS_ONE,
                    vec![self.owner(), name.into()],
                    ConstraintColumnRow::from_row,
                )
                .await
            }
            None => {
                self.fetch_mapped(
                    catalog_sql::CONSTRAINT_COLUMNS,
                    vec![self.owner()],
                    ConstraintColumnRow::from_row,
                )
                .await
            }
        }
    }

    pub async fn constraint_columns_for(
        &self,
        owner: &str,
        constraint: &str,
    ) -> Result<Vec<ConstraintColumnRow>> {
        self.fetch_mapped(
            catalog_sql::CONSTRAINT_COLUMNS_FOR,
            vec![owner.into(), constraint.into()],
            ConstraintColumnRow::from_row,
        )
        .await
    }

    pub async fn indexes(&self, table: Option<&str>) -> Result<Vec<IndexRow>> {
        match table {
            Some(name) => {
                self.fetch_mapped(
                    catalog_sql::INDEXES_ONE,
                    vec![self.owner(), name.into()],
                    IndexRow::from_row,
                )
                .await
            }
            None => {
                self.fetch_mapped(catalog_sql::INDEXES, vec![self.owner()], IndexRow::from_row)
                    .await
            }
        }
    }

    pub async fn index_columns(&self, table: Option<&str>) -> Result<Vec<IndexColumnRow>> {
        match table {
            Some(name) => {
                self.fetch_mapped(
                    catalog_sql::INDEX_COLUMNS_ONE,
                    vec![self.owner(), name.into()],
                    IndexColumnRow::from_row,
                )
                .await
            }
            None => {
                self.fetch_mapped(
                    catalog_sql::INDEX_COLUMNS,
                    vec![self.owner()],
                    IndexColumnRow::from_row,
                )
                .await
            }
        }
    }

    pub async fn plsql_objects(&self) -> Result<Vec<ObjectRow>> {
        self.fetch_mapped(
            catalog_sql::PLSQL_OBJECTS,
            vec![self.owner()],
            ObjectRow::from_row,
        )
        .await
    }

    /// Source lines of a stored object, in order.
    pub async fn object_source(&self, name: &str, kind: &str) -> Result<Vec<String>> {
        let rows = self
            .fetch_all(
                catalog_sql::OBJECT_SOURCE,
                vec![self.owner(), name.into(), kind.into()],
            )
            .await?;
        Ok(rows
            .rows
            .iter()
            .map(|r| {
                r.first()
                    .and_then(|v| v.as_str())
                    .unwrap_or("")
                    .to_string()
            })
            .collect())
    }

    /// `(owner, name, type)` of every object depending on the given one.
    pub async fn dependents_of(&self, name: &str) -> Result<Vec<(String, String, String)>> {
        let rows = self
            .fetch_all(catalog_sql::DEPENDENTS_OF, vec![self.owner(), name.into()])
            .await?;
        Ok(rows
            .rows
            .iter()
            .filter_map(|r| {
                Some((
                    r.first()?.as_str()?.to_string(),
                    r.get(1)?.as_str()?.to_string(),
                    r.get(2)?.as_str()?.to_string(),
                ))
            })
            .collect())
    }

    pub async fn dependencies(&self) -> Result<Vec<DependencyRow>> {
        self.fetch_mapped(
            catalog_sql::DEPENDENCIES,
            vec![self.owner()],
            DependencyRow::from_row,
        )
        .await
    }

    /// `(type_name, typecode)` pairs of user-defined types.
    pub async fn types(&self) -> Result<Vec<(String, String)>> {
        let rows = self.fetch_all(catalog_sql::TYPES, vec![self.owner()]).await?;
        Ok(rows
            .rows
            .iter()
            .filter_map(|r| {
                Some((
                    r.first()?.as_str()?.to_string(),
                    r.get(1)?.as_str()?.to_string(),
                ))
            })
            .collect())
    }

    pub async fn type_attrs(&self) -> Result<Vec<TypeAttrRow>> {
        self.fetch_mapped(
            catalog_sql::TYPE_ATTRS,
            vec![self.owner()],
            TypeAttrRow::from_row,
        )
        .await
    }

    fn owner(&self) -> SqlValue {
        SqlValue::Text(self.target_schema.clone())
    }

    async fn fetch_mapped<T, F>(
        &self,
        sql: &'static str,
        binds: Vec<SqlValue>,
        parse: F,
    ) -> Result<Vec<T>>
    where
        F: Fn(&Row) -> std::result::Result<T, DriverError>,
    {
        let rows = self.fetch_all(sql, binds).await?;
        rows.rows
            .iter()
            .map(|r| parse(r).map_err(service_error))
            .collect()
    }
}

fn extract_version(banner: &str) -> String {
    banner
        .split_whitespace()
        .find(|tok| {
            tok.chars().next().is_some_and(|c| c.is_ascii_digit()) && tok.contains('.')
        })
        .unwrap_or("unknown")
        .trim_end_matches(&[',', ';'][..])
        .to_string()
}
