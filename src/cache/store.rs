//! Schema cache orchestration.
//!
//! Owns the in-memory index and its disk snapshots. Reads take a short read
//! lock; a miss releases the lock, runs the targeted catalog queries through
//! the connector, then merges under a write lock and schedules an async
//! persist. Full rebuilds assemble stage by stage, committing a snapshot
//! after each stage so readers always see either the prior or the next
//! complete state.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Instant;

use tracing::{debug, info, warn};

use super::fingerprint::CatalogFingerprint;
use super::index::{normalize_ident, split_qualified, Pattern, SchemaIndex};
use super::models::{
    CheckRecord, ColumnRecord, DependencyEdge, ForeignKeyRecord, IndexRecord, ObjectKind,
    ObjectRef, OnDelete, PlsqlObject, SortOrder, TableKind, TableRecord, TypeAttribute,
    UserDefinedType,
};
use super::persist;
use crate::connector::catalog_sql::{
    ColumnRow, ConstraintColumnRow, ConstraintRow, IndexColumnRow, IndexRow, InventoryRow,
};
use crate::connector::Connector;
use crate::error::{Result, ServiceError};

/// Hard ceiling on list answers.
pub const MAX_LIMIT: usize = 500;
/// Default when the caller does not pass a limit.
pub const DEFAULT_LIMIT: usize = 50;
/// `get_object_source` response cap.
pub const MAX_SOURCE_BYTES: usize = 1024 * 1024;

#[derive(Debug, Clone, serde::Serialize)]
pub struct BuildStats {
    pub built: bool,
    pub duration_ms: u64,
    pub tables: usize,
    pub fingerprint: String,
    pub stages: Vec<StageStats>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct StageStats {
    pub stage: &'static str,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct HitStats {
    pub hits: u64,
    pub misses: u64,
}

struct CacheState {
    index: SchemaIndex,
    fingerprint: CatalogFingerprint,
}

pub struct SchemaCache {
    connector: Arc<Connector>,
    cache_dir: PathBuf,
    state: RwLock<CacheState>,
    /// Serializes rebuilds and targeted merges against each other.
    build_lock: tokio::sync::Mutex<()>,
    /// Serializes disk writes within this process.
    persist_lock: Arc<tokio::sync::Mutex<()>>,
    sources: Mutex<HashMap<(String, String), Arc<String>>>,
    stats: Mutex<HitStats>,
}

impl SchemaCache {
    /// Load the snapshot matching the live catalog's fingerprint, or run a
    /// full build when none matches.
    pub async fn open(connector: Arc<Connector>, cache_dir: PathBuf) -> Result<Arc<Self>> {
        let fingerprint = Self::current_fingerprint(&connector).await?;
        let loaded = persist::load(&cache_dir, &fingerprint)?;

        let cache = Arc::new(Self {
            connector,
            cache_dir,
            state: RwLock::new(CacheState {
                index: loaded.clone().unwrap_or_default(),
                fingerprint,
            }),
            build_lock: tokio::sync::Mutex::new(()),
            persist_lock: Arc::new(tokio::sync::Mutex::new(())),
            sources: Mutex::new(HashMap::new()),
            stats: Mutex::new(HitStats::default()),
        });

        match loaded {
            Some(index) => {
                info!(tables = index.table_count(), "schema cache loaded from disk");
            }
            None => {
                info!("no usable cache snapshot, building schema index");
                cache.rebuild().await?;
            }
        }
        Ok(cache)
    }

    async fn current_fingerprint(connector: &Connector) -> Result<CatalogFingerprint> {
        let info = connector.session_info().await?;
        let generation = connector.catalog_generation().await?;
        Ok(CatalogFingerprint::compute(
            &info.version,
            connector.target_schema(),
            &generation,
        ))
    }

    pub fn fingerprint_hex(&self) -> String {
        self.read_state(|s| s.fingerprint.hex())
    }

    pub fn table_count(&self) -> usize {
        self.read_state(|s| s.index.table_count())
    }

    pub fn hit_stats(&self) -> HitStats {
        self.stats.lock().expect("stats lock").clone()
    }

    fn read_state<T>(&self, f: impl FnOnce(&CacheState) -> T) -> T {
        f(&self.state.read().expect("cache lock poisoned"))
    }

    fn write_state<T>(&self, f: impl FnOnce(&mut CacheState) -> T) -> T {
        f(&mut self.state.write().expect("cache lock poisoned"))
    }

    fn record_hit(&self, hit: bool) {
        let mut stats = self.stats.lock().expect("stats lock");
        if hit {
            stats.hits += 1;
        } else {
            stats.misses += 1;
        }
    }

    /// Resolve an optionally qualified name against the target schema.
    /// Cross-schema lookups answer `NotFound` under the conservative
    /// privilege reading.
    fn resolve_name(&self, raw: &str) -> Result<String> {
        if raw.trim().is_empty() {
            return Err(ServiceError::InvalidArgument("empty object name".into()));
        }
        let (schema, name) = split_qualified(raw);
        if let Some(schema) = schema {
            if schema != self.connector.target_schema() {
                return Err(ServiceError::NotFound(format!(
                    "{schema}.{name} (outside target schema)"
                )));
            }
        }
        Ok(name)
    }

    // ------------------------------------------------------------------
    // Lookups
    // ------------------------------------------------------------------

    pub async fn get_table(&self, raw_name: &str) -> Result<TableRecord> {
        let key = self.resolve_name(raw_name)?;

        let cached = self.read_state(|s| {
            s.index
                .get(&key)
                .filter(|t| t.hydrated && !s.index.is_stale(&key))
                .cloned()
        });
        if let Some(record) = cached {
            self.record_hit(true);
            return Ok(record);
        }
        self.record_hit(false);

        match self.load_one(&key).await {
            Ok(Some(record)) => Ok(record),
            Ok(None) => {
                // The catalog no longer knows this name; drop any stale entry.
                self.write_state(|s| s.index.remove_table(&key));
                Err(ServiceError::NotFound(format!("table {key}")))
            }
            Err(err) if err.is_recoverable() => {
                debug!("retrying targeted load after recoverable error: {err}");
                match self.load_one(&key).await? {
                    Some(record) => Ok(record),
                    None => Err(ServiceError::NotFound(format!("table {key}"))),
                }
            }
            Err(err) => Err(err),
        }
    }

    /// Batched lookup; output order follows input order.
    pub async fn get_tables(&self, names: &[String]) -> Vec<(String, Result<TableRecord>)> {
        let mut out = Vec::with_capacity(names.len());
        for name in names {
            out.push((name.clone(), self.get_table(name).await));
        }
        out
    }

    pub async fn search_tables(
        &self,
        pattern: &str,
        limit: Option<usize>,
    ) -> Result<Vec<TableRecord>> {
        let limit = effective_limit(limit)?;
        let pattern = Pattern::parse(pattern)?;
        let names = self.read_state(|s| s.index.search_table_names(&pattern, limit));
        let records = self.read_state(|s| {
            names
                .iter()
                .filter_map(|n| s.index.get(n).cloned())
                .collect::<Vec<_>>()
        });
        Ok(records)
    }

    pub async fn search_columns(
        &self,
        fragment: &str,
        limit: Option<usize>,
    ) -> Result<Vec<(String, String, String, String)>> {
        let limit = effective_limit(limit)?;
        let pattern = Pattern::parse(fragment)?;
        let schema = self.connector.target_schema().to_string();
        let hits = self.read_state(|s| s.index.search_columns(&pattern, limit));
        Ok(hits
            .into_iter()
            .map(|(table, column, data_type)| (schema.clone(), table, column, data_type))
            .collect())
    }

    pub async fn get_constraints(&self, raw_name: &str) -> Result<super::models::ConstraintsJson> {
        Ok(self.get_table(raw_name).await?.constraints_json())
    }

    pub async fn get_indexes(&self, raw_name: &str) -> Result<Vec<IndexRecord>> {
        Ok(self.get_table(raw_name).await?.indexes)
    }

    pub async fn get_related_tables(
        &self,
        raw_name: &str,
    ) -> Result<(Vec<(String, String)>, Vec<(String, String)>)> {
        // Hydrate first so the outgoing edges are present.
        let record = self.get_table(raw_name).await?;
        let key = record.name.to_uppercase();
        Ok(self
            .read_state(|s| s.index.related_tables(&key))
            .unwrap_or_default())
    }

    pub async fn get_plsql_objects(
        &self,
        name_pattern: Option<&str>,
        kinds: &[ObjectKind],
    ) -> Result<Vec<PlsqlObject>> {
        self.ensure_plsql_loaded().await?;
        let pattern = match name_pattern {
            Some(p) if !p.trim().is_empty() => Some(Pattern::parse(p)?),
            _ => None,
        };
        Ok(self.read_state(|s| {
            s.index
                .plsql()
                .iter()
                .filter(|obj| kinds.is_empty() || kinds.contains(&obj.kind))
                .filter(|obj| {
                    pattern
                        .as_ref()
                        .map(|p| p.matches(&obj.name.to_uppercase()))
                        .unwrap_or(true)
                })
                .cloned()
                .collect()
        }))
    }

    /// Source text of a stored object, capped at [`MAX_SOURCE_BYTES`].
    /// Returns `(source, truncated)`.
    pub async fn get_object_source(
        &self,
        raw_name: &str,
        kind: Option<ObjectKind>,
    ) -> Result<(Arc<String>, bool)> {
        let name = self.resolve_name(raw_name)?;
        let kind = match kind {
            Some(kind) => kind,
            None => {
                self.ensure_plsql_loaded().await?;
                self.read_state(|s| {
                    s.index
                        .plsql()
                        .iter()
                        .find(|o| o.name.to_uppercase() == name && o.kind.has_source())
                        .map(|o| o.kind)
                })
                .ok_or_else(|| ServiceError::NotFound(format!("source of {name}")))?
            }
        };
        if !kind.has_source() {
            return Err(ServiceError::InvalidArgument(format!(
                "{} objects have no stored source",
                kind.wire_name()
            )));
        }

        let cache_key = (name.clone(), kind.wire_name());
        if let Some(cached) = self
            .sources
            .lock()
            .expect("sources lock")
            .get(&cache_key)
            .cloned()
        {
            let truncated = cached.len() >= MAX_SOURCE_BYTES;
            return Ok((cached, truncated));
        }

        let lines = self
            .connector
            .object_source(&name, kind.oracle_name())
            .await?;
        if lines.is_empty() {
            return Err(ServiceError::NotFound(format!(
                "source of {} {name}",
                kind.wire_name()
            )));
        }
        let mut source = String::new();
        let mut truncated = false;
        for line in lines {
            if source.len() + line.len() > MAX_SOURCE_BYTES {
                let room = MAX_SOURCE_BYTES - source.len();
                let mut cut = room;
                while cut > 0 && !line.is_char_boundary(cut) {
                    cut -= 1;
                }
                source.push_str(&line[..cut]);
                truncated = true;
                break;
            }
            source.push_str(&line);
        }
        let source = Arc::new(source);
        self.sources
            .lock()
            .expect("sources lock")
            .insert(cache_key, source.clone());
        Ok((source, truncated))
    }

    pub async fn get_dependents(
        &self,
        raw_name: &str,
        kind: Option<&str>,
    ) -> Result<Vec<ObjectRef>> {
        let name = self.resolve_name(raw_name)?;
        let cached = self.read_state(|s| s.index.dependents_of(&name));
        let refs = match cached {
            Some(refs) => refs,
            None => {
                let rows = self.connector.dependents_of(&name).await?;
                let refs: Vec<ObjectRef> = rows
                    .into_iter()
                    .map(|(owner, obj, obj_type)| ObjectRef::new(owner, obj, obj_type))
                    .collect();
                self.write_state(|s| s.index.cache_dependents(name.clone(), refs.clone()));
                self.schedule_persist();
                refs
            }
        };
        Ok(match kind {
            Some(kind) => {
                let kind = kind.to_uppercase().replace('_', " ");
                refs.into_iter()
                    .filter(|r| r.kind.to_uppercase() == kind)
                    .collect()
            }
            None => refs,
        })
    }

    pub async fn get_user_defined_types(
        &self,
        pattern: Option<&str>,
    ) -> Result<Vec<UserDefinedType>> {
        self.ensure_udts_loaded().await?;
        let pattern = match pattern {
            Some(p) if !p.trim().is_empty() => Some(Pattern::parse(p)?),
            _ => None,
        };
        Ok(self.read_state(|s| {
            s.index
                .udts()
                .iter()
                .filter(|t| {
                    pattern
                        .as_ref()
                        .map(|p| p.matches(&t.name.to_uppercase()))
                        .unwrap_or(true)
                })
                .cloned()
                .collect()
        }))
    }

    // ------------------------------------------------------------------
    // Invalidation
    // ------------------------------------------------------------------

    /// Mark one object stale; the next read refreshes it from the catalog.
    pub fn invalidate(&self, object: &ObjectRef) {
        let name = normalize_ident(&object.name);
        let kind = object.kind.to_uppercase();
        self.sources
            .lock()
            .expect("sources lock")
            .retain(|(cached_name, _), _| cached_name != &name);
        self.write_state(|s| match kind.as_str() {
            "TABLE" | "VIEW" | "MATERIALIZED VIEW" | "MATERIALIZED_VIEW" => {
                if s.index.get(&name).is_some() {
                    s.index.mark_stale(&name);
                } else {
                    // An unknown table name may be a CREATE we have not seen.
                    s.index.plsql_loaded = false;
                }
            }
            "" => s.index.mark_all_stale(),
            _ => {
                s.index.plsql_loaded = false;
                s.index.udts_loaded = false;
            }
        });
        debug!(name = %name, kind = %kind, "cache entry invalidated");
    }

    /// Conservative whole-schema invalidation, used when a DDL statement's
    /// target cannot be parsed or a PL/SQL block may have altered anything.
    pub fn invalidate_all(&self) {
        self.sources.lock().expect("sources lock").clear();
        self.write_state(|s| s.index.mark_all_stale());
        debug!("whole schema marked stale");
    }

    // ------------------------------------------------------------------
    // Build
    // ------------------------------------------------------------------

    /// Full staged sweep. Readers keep the prior snapshot until each stage
    /// commits; the final state carries the fingerprint computed up front.
    pub async fn rebuild(&self) -> Result<BuildStats> {
        let _guard = self.build_lock.lock().await;
        let started = Instant::now();
        let mut stages = Vec::new();

        let fingerprint = Self::current_fingerprint(&self.connector).await?;

        // Stage 1: tables, columns, comments.
        let stage_start = Instant::now();
        let inventory = self.connector.table_inventory(None).await?;
        let columns = self.connector.columns(None).await?;
        let table_comments = self.connector.table_comments(None).await?;
        let column_comments = self.connector.column_comments(None).await?;
        let mut records = assemble_base(
            self.connector.target_schema(),
            &inventory,
            &columns,
            &table_comments,
            &column_comments,
        );
        let survivors: HashSet<String> = records.keys().cloned().collect();
        self.write_state(|s| {
            s.fingerprint = fingerprint.clone();
            s.index.retain_tables(&survivors);
            for record in records.values() {
                s.index.insert_table(record.clone());
            }
        });
        self.persist_now().await;
        stages.push(StageStats {
            stage: "tables",
            duration_ms: stage_start.elapsed().as_millis() as u64,
        });

        // Stage 2: constraints and indexes.
        let stage_start = Instant::now();
        let constraints = self.connector.constraints(None).await?;
        let constraint_columns = self.connector.constraint_columns(None).await?;
        let foreign = self
            .resolve_foreign_keys(&constraints, &constraint_columns)
            .await?;
        let indexes = self.connector.indexes(None).await?;
        let index_columns = self.connector.index_columns(None).await?;
        apply_constraints(&mut records, &constraints, &constraint_columns, &foreign);
        apply_indexes(&mut records, &indexes, &index_columns);
        for record in records.values_mut() {
            record.hydrated = true;
        }
        self.write_state(|s| {
            for record in records.values() {
                s.index.insert_table(record.clone());
            }
        });
        self.persist_now().await;
        stages.push(StageStats {
            stage: "constraints",
            duration_ms: stage_start.elapsed().as_millis() as u64,
        });

        // Stage 3: dependencies.
        let stage_start = Instant::now();
        let edges: Vec<DependencyEdge> = self
            .connector
            .dependencies()
            .await?
            .into_iter()
            .map(|d| DependencyEdge {
                referrer: ObjectRef::new(d.owner, d.name, d.object_type),
                referenced: ObjectRef::new(d.referenced_owner, d.referenced_name, d.referenced_type),
            })
            .collect();
        self.write_state(|s| s.index.set_edges(edges));
        self.persist_now().await;
        stages.push(StageStats {
            stage: "dependencies",
            duration_ms: stage_start.elapsed().as_millis() as u64,
        });

        // Stage 4: PL/SQL inventory and user-defined types.
        let stage_start = Instant::now();
        let plsql = self.fetch_plsql().await?;
        let udts = self.fetch_udts().await?;
        self.write_state(|s| {
            s.index.set_plsql(plsql);
            s.index.set_udts(udts);
        });
        self.persist_now().await;
        stages.push(StageStats {
            stage: "plsql",
            duration_ms: stage_start.elapsed().as_millis() as u64,
        });

        let stats = BuildStats {
            built: true,
            duration_ms: started.elapsed().as_millis() as u64,
            tables: self.table_count(),
            fingerprint: fingerprint.hex(),
            stages,
        };
        info!(
            tables = stats.tables,
            duration_ms = stats.duration_ms,
            "schema cache rebuilt"
        );
        Ok(stats)
    }

    /// Targeted single-table refresh: 4-6 narrow catalog queries, then a
    /// merge under the write lock. Never triggers a full build.
    async fn load_one(&self, key: &str) -> Result<Option<TableRecord>> {
        let _guard = self.build_lock.lock().await;

        let inventory = self.connector.table_inventory(Some(key)).await?;
        if inventory.is_empty() {
            return Ok(None);
        }
        let columns = self.connector.columns(Some(key)).await?;
        let table_comments = self.connector.table_comments(Some(key)).await?;
        let column_comments = self.connector.column_comments(Some(key)).await?;
        let constraints = self.connector.constraints(Some(key)).await?;
        let constraint_columns = self.connector.constraint_columns(Some(key)).await?;
        let indexes = self.connector.indexes(Some(key)).await?;
        let index_columns = self.connector.index_columns(Some(key)).await?;

        let mut records = assemble_base(
            self.connector.target_schema(),
            &inventory,
            &columns,
            &table_comments,
            &column_comments,
        );
        let foreign = self
            .resolve_foreign_keys(&constraints, &constraint_columns)
            .await?;
        apply_constraints(&mut records, &constraints, &constraint_columns, &foreign);
        apply_indexes(&mut records, &indexes, &index_columns);

        let Some(mut record) = records.remove(key) else {
            return Ok(None);
        };
        record.hydrated = true;
        self.write_state(|s| s.index.insert_table(record.clone()));
        self.schedule_persist();
        Ok(Some(record))
    }

    async fn ensure_plsql_loaded(&self) -> Result<()> {
        if self.read_state(|s| s.index.plsql_loaded) {
            return Ok(());
        }
        let objects = self.fetch_plsql().await?;
        self.write_state(|s| s.index.set_plsql(objects));
        self.schedule_persist();
        Ok(())
    }

    async fn ensure_udts_loaded(&self) -> Result<()> {
        if self.read_state(|s| s.index.udts_loaded) {
            return Ok(());
        }
        let udts = self.fetch_udts().await?;
        self.write_state(|s| s.index.set_udts(udts));
        self.schedule_persist();
        Ok(())
    }

    async fn fetch_plsql(&self) -> Result<Vec<PlsqlObject>> {
        let schema = self.connector.target_schema().to_string();
        Ok(self
            .connector
            .plsql_objects()
            .await?
            .into_iter()
            .filter_map(|row| {
                let kind = ObjectKind::parse(&row.object_type)?;
                Some(PlsqlObject {
                    schema: schema.clone(),
                    name: row.name,
                    kind,
                    status: row.status,
                    last_ddl: row.last_ddl,
                    source_available: kind.has_source(),
                })
            })
            .collect())
    }

    async fn fetch_udts(&self) -> Result<Vec<UserDefinedType>> {
        let schema = self.connector.target_schema().to_string();
        let types = self.connector.types().await?;
        let attrs = self.connector.type_attrs().await?;
        let mut by_type: HashMap<String, Vec<TypeAttribute>> = HashMap::new();
        for attr in attrs {
            by_type
                .entry(attr.type_name.clone())
                .or_default()
                .push(TypeAttribute {
                    name: attr.attr_name,
                    data_type: attr.attr_type,
                });
        }
        Ok(types
            .into_iter()
            .map(|(name, typecode)| {
                let attributes = by_type.remove(&name).unwrap_or_default();
                UserDefinedType {
                    schema: schema.clone(),
                    name,
                    typecode,
                    attributes,
                }
            })
            .collect())
    }

    /// Resolve FK targets: the referenced constraint's table and ordered
    /// columns. Targets outside the schema are chased with two extra queries
    /// and flagged external; unresolvable edges are kept, never dropped.
    async fn resolve_foreign_keys(
        &self,
        constraints: &[ConstraintRow],
        constraint_columns: &[ConstraintColumnRow],
    ) -> Result<HashMap<String, (String, String, Vec<String>, bool)>> {
        let schema = self.connector.target_schema().to_string();
        let mut local_tables: HashMap<&str, &str> = HashMap::new();
        for row in constraints {
            local_tables.insert(&row.name, &row.table);
        }
        let mut local_columns: HashMap<&str, Vec<(i64, &str)>> = HashMap::new();
        for row in constraint_columns {
            local_columns
                .entry(&row.constraint)
                .or_default()
                .push((row.position, &row.column));
        }

        let mut resolved = HashMap::new();
        for row in constraints {
            if row.constraint_type != "R" {
                continue;
            }
            let Some(r_constraint) = &row.r_constraint else {
                continue;
            };
            let r_owner = row.r_owner.clone().unwrap_or_else(|| schema.clone());
            let external = r_owner != schema;

            if !external {
                if let Some(table) = local_tables.get(r_constraint.as_str()) {
                    let mut cols = local_columns
                        .get(r_constraint.as_str())
                        .cloned()
                        .unwrap_or_default();
                    cols.sort_by_key(|(pos, _)| *pos);
                    resolved.insert(
                        row.name.clone(),
                        (
                            r_owner,
                            (*table).to_string(),
                            cols.into_iter().map(|(_, c)| c.to_string()).collect(),
                            false,
                        ),
                    );
                    continue;
                }
            }

            // Cross-schema (or not in this batch): chase the referenced
            // constraint directly.
            let target = self
                .connector
                .constraint_by_name(&r_owner, r_constraint)
                .await?;
            match target {
                Some(target_row) => {
                    let cols = self
                        .connector
                        .constraint_columns_for(&r_owner, r_constraint)
                        .await?;
                    let mut cols: Vec<(i64, String)> =
                        cols.into_iter().map(|c| (c.position, c.column)).collect();
                    cols.sort_by_key(|(pos, _)| *pos);
                    resolved.insert(
                        row.name.clone(),
                        (
                            r_owner,
                            target_row.table,
                            cols.into_iter().map(|(_, c)| c).collect(),
                            external,
                        ),
                    );
                }
                None => {
                    // Dictionary not visible for that owner; keep the edge
                    // with what the local row tells us.
                    warn!(
                        constraint = %row.name,
                        referenced = %r_constraint,
                        "foreign key target not resolvable, keeping external edge"
                    );
                    resolved.insert(
                        row.name.clone(),
                        (r_owner, r_constraint.clone(), Vec::new(), true),
                    );
                }
            }
        }
        Ok(resolved)
    }

    // ------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------

    fn snapshot(&self) -> (CatalogFingerprint, SchemaIndex) {
        self.read_state(|s| (s.fingerprint.clone(), s.index.clone()))
    }

    async fn persist_now(&self) {
        let (fingerprint, index) = self.snapshot();
        let dir = self.cache_dir.clone();
        let lock = self.persist_lock.clone();
        let _guard = lock.lock().await;
        let result =
            tokio::task::spawn_blocking(move || persist::save(&dir, &fingerprint, &index)).await;
        match result {
            Ok(Ok(_)) => {}
            Ok(Err(err)) => warn!("cache persist failed: {err}"),
            Err(err) => warn!("cache persist task failed: {err}"),
        }
    }

    /// Fire-and-forget disk persist of the current snapshot.
    fn schedule_persist(&self) {
        let (fingerprint, index) = self.snapshot();
        let dir = self.cache_dir.clone();
        let lock = self.persist_lock.clone();
        tokio::spawn(async move {
            let _guard = lock.lock().await;
            let outcome =
                tokio::task::spawn_blocking(move || persist::save(&dir, &fingerprint, &index))
                    .await;
            match outcome {
                Ok(Ok(_)) => {}
                Ok(Err(err)) => warn!("async cache persist failed: {err}"),
                Err(err) => warn!("async cache persist task failed: {err}"),
            }
        });
    }

    /// Compare the live catalog generation with the cached fingerprint;
    /// marks everything stale when they diverge. Used by the optional
    /// periodic probe.
    pub async fn probe_generation(&self) -> Result<bool> {
        let fingerprint = Self::current_fingerprint(&self.connector).await?;
        let changed = self.read_state(|s| s.fingerprint != fingerprint);
        if changed {
            // Keep the old fingerprint: persists continue into the old
            // snapshot and the next startup (or rebuild) adopts the new one.
            info!("catalog generation moved, marking cache stale");
            self.invalidate_all();
        }
        Ok(changed)
    }
}

fn effective_limit(limit: Option<usize>) -> Result<usize> {
    match limit {
        None => Ok(DEFAULT_LIMIT),
        Some(0) => Err(ServiceError::InvalidArgument("limit must be positive".into())),
        Some(n) => Ok(n.min(MAX_LIMIT)),
    }
}

// ---------------------------------------------------------------------------
// Assembly from raw catalog rows
// ---------------------------------------------------------------------------

fn assemble_base(
    schema: &str,
    inventory: &[InventoryRow],
    columns: &[ColumnRow],
    table_comments: &[(String, String)],
    column_comments: &[(String, String, String)],
) -> HashMap<String, TableRecord> {
    let mut comments: HashMap<&str, &str> = HashMap::new();
    for (table, comment) in table_comments {
        comments.insert(table, comment);
    }
    let mut col_comments: HashMap<(&str, &str), &str> = HashMap::new();
    for (table, column, comment) in column_comments {
        col_comments.insert((table, column), comment);
    }
    let mut by_table: HashMap<&str, Vec<&ColumnRow>> = HashMap::new();
    for row in columns {
        by_table.entry(&row.table).or_default().push(row);
    }

    let mut records = HashMap::new();
    for item in inventory {
        let Some(kind) = TableKind::from_object_type(&item.object_type) else {
            continue;
        };
        let mut cols: Vec<&ColumnRow> = by_table.remove(item.name.as_str()).unwrap_or_default();
        cols.sort_by_key(|c| c.position);
        let columns: Vec<ColumnRecord> = cols
            .into_iter()
            .enumerate()
            .map(|(i, c)| ColumnRecord {
                name: c.name.clone(),
                // Dense 1-based ordinals even if the dictionary reports gaps
                // (dropped columns leave holes in COLUMN_ID).
                position: i as u32 + 1,
                data_type: c.canonical_type(),
                nullable: c.nullable,
                default_expr: c.default_expr.clone(),
                comment: col_comments
                    .get(&(item.name.as_str(), c.name.as_str()))
                    .map(|s| s.to_string()),
            })
            .collect();
        records.insert(
            item.name.to_uppercase(),
            TableRecord {
                schema: schema.to_string(),
                name: item.name.clone(),
                kind,
                columns,
                primary_key: None,
                unique_keys: Vec::new(),
                foreign_keys: Vec::new(),
                check_constraints: Vec::new(),
                indexes: Vec::new(),
                comment: comments.get(item.name.as_str()).map(|s| s.to_string()),
                last_ddl: item.last_ddl,
                hydrated: false,
            },
        );
    }
    records
}

fn apply_constraints(
    records: &mut HashMap<String, TableRecord>,
    constraints: &[ConstraintRow],
    constraint_columns: &[ConstraintColumnRow],
    foreign: &HashMap<String, (String, String, Vec<String>, bool)>,
) {
    let mut columns_of: HashMap<&str, Vec<(i64, &str)>> = HashMap::new();
    for row in constraint_columns {
        columns_of
            .entry(&row.constraint)
            .or_default()
            .push((row.position, &row.column));
    }
    let ordered_columns = |name: &str| -> Vec<String> {
        let mut cols = columns_of.get(name).cloned().unwrap_or_default();
        cols.sort_by_key(|(pos, _)| *pos);
        cols.into_iter().map(|(_, c)| c.to_string()).collect()
    };

    for record in records.values_mut() {
        record.primary_key = None;
        record.unique_keys.clear();
        record.foreign_keys.clear();
        record.check_constraints.clear();
    }

    let mut sorted: Vec<&ConstraintRow> = constraints.iter().collect();
    sorted.sort_by(|a, b| a.name.cmp(&b.name));
    for row in sorted {
        let Some(record) = records.get_mut(&row.table.to_uppercase()) else {
            continue;
        };
        match row.constraint_type.as_str() {
            "P" => record.primary_key = Some(ordered_columns(&row.name)),
            "U" => record.unique_keys.push(ordered_columns(&row.name)),
            "C" => {
                if let Some(condition) = &row.search_condition {
                    record.check_constraints.push(CheckRecord {
                        name: row.name.clone(),
                        condition: condition.clone(),
                        enabled: row.enabled,
                    });
                }
            }
            "R" => {
                let Some((target_schema, target_table, target_columns, external)) =
                    foreign.get(&row.name)
                else {
                    continue;
                };
                record.foreign_keys.push(ForeignKeyRecord {
                    name: row.name.clone(),
                    local_columns: ordered_columns(&row.name),
                    target_schema: target_schema.clone(),
                    target_table: target_table.clone(),
                    target_columns: target_columns.clone(),
                    on_delete: OnDelete::from_delete_rule(row.delete_rule.as_deref()),
                    deferrable: row.deferrable,
                    enabled: row.enabled,
                    external: *external,
                });
            }
            _ => {}
        }
    }
}

fn apply_indexes(
    records: &mut HashMap<String, TableRecord>,
    indexes: &[IndexRow],
    index_columns: &[IndexColumnRow],
) {
    let mut columns_of: HashMap<&str, Vec<(i64, &str, bool)>> = HashMap::new();
    for row in index_columns {
        columns_of
            .entry(&row.index)
            .or_default()
            .push((row.position, &row.column, row.descending));
    }

    for record in records.values_mut() {
        record.indexes.clear();
    }

    let mut sorted: Vec<&IndexRow> = indexes.iter().collect();
    sorted.sort_by(|a, b| a.name.cmp(&b.name));
    for row in sorted {
        let Some(record) = records.get_mut(&row.table.to_uppercase()) else {
            continue;
        };
        let mut cols = columns_of.get(row.name.as_str()).cloned().unwrap_or_default();
        cols.sort_by_key(|(pos, _, _)| *pos);
        record.indexes.push(IndexRecord {
            name: row.name.clone(),
            unique: row.unique,
            columns: cols
                .into_iter()
                .map(|(_, name, desc)| {
                    (
                        name.to_string(),
                        if desc { SortOrder::Desc } else { SortOrder::Asc },
                    )
                })
                .collect(),
            index_type: row.index_type.clone(),
        });
    }
}
