//! On-disk cache format.
//!
//! One file per `(connection target, schema)` pair at
//! `${CACHE_DIR}/<digest>.idx`. Layout, little-endian throughout:
//!
//! ```text
//! magic "SCIX" | version u16 | fingerprint digest [32] | section count u16
//! ( section id u16 | length u64 | bytes )*
//! ```
//!
//! Section bytes are a stream of `u32`-length-prefixed JSON records. Unknown
//! section ids are skipped so newer writers stay readable. Writes go through
//! a temp file plus rename; readers therefore only ever observe a complete
//! snapshot. A corrupt file is treated as absent, never as a fatal error.

use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, warn};

use super::fingerprint::CatalogFingerprint;
use super::index::SchemaIndex;
use super::models::{
    CheckRecord, ColumnRecord, DependencyEdge, ForeignKeyRecord, IndexRecord, PlsqlObject,
    TableKind, TableRecord, UserDefinedType,
};
use crate::error::{Result, ServiceError};

const MAGIC: &[u8; 4] = b"SCIX";
const FORMAT_VERSION: u16 = 1;

const SECTION_META: u16 = 1;
const SECTION_TABLES: u16 = 2;
const SECTION_COLUMNS: u16 = 3;
const SECTION_CONSTRAINTS: u16 = 4;
const SECTION_INDEXES: u16 = 5;
const SECTION_DEPS: u16 = 6;
const SECTION_PLSQL: u16 = 7;
const SECTION_UDTS: u16 = 8;
const SECTION_NAME_INDEX: u16 = 9;
const SECTION_COLUMN_INDEX: u16 = 10;

/// How long a foreign lock file may sit before it is considered stale.
const LOCK_STALE_AFTER_SECS: u64 = 60;

#[derive(Debug, Serialize, Deserialize)]
struct MetaRecord {
    schema: String,
    oracle_version: String,
    generation: String,
    saved_at: DateTime<Utc>,
    table_count: usize,
    plsql_loaded: bool,
    udts_loaded: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct TableHeaderRecord {
    schema: String,
    name: String,
    kind: TableKind,
    primary_key: Option<Vec<String>>,
    unique_keys: Vec<Vec<String>>,
    comment: Option<String>,
    last_ddl: Option<DateTime<Utc>>,
    hydrated: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct ColumnsRecord {
    table: String,
    columns: Vec<ColumnRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ConstraintsRecord {
    table: String,
    foreign_keys: Vec<ForeignKeyRecord>,
    check_constraints: Vec<CheckRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
struct IndexesRecord {
    table: String,
    indexes: Vec<IndexRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
struct NameIndexRecord {
    names: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ColumnIndexRecord {
    column: String,
    tables: Vec<String>,
}

fn io_err(context: &str, err: std::io::Error) -> ServiceError {
    ServiceError::Internal(format!("{context}: {err}"))
}

fn corrupt(msg: impl Into<String>) -> ServiceError {
    ServiceError::CacheCorrupt(msg.into())
}

// ---------------------------------------------------------------------------
// Section encoding
// ---------------------------------------------------------------------------

fn push_record<T: Serialize>(buf: &mut Vec<u8>, record: &T) -> Result<()> {
    let json = serde_json::to_vec(record)
        .map_err(|e| ServiceError::Internal(format!("serialize cache record: {e}")))?;
    buf.extend_from_slice(&(json.len() as u32).to_le_bytes());
    buf.extend_from_slice(&json);
    Ok(())
}

fn read_records<T: DeserializeOwned>(mut bytes: &[u8]) -> Result<Vec<T>> {
    let mut out = Vec::new();
    while !bytes.is_empty() {
        if bytes.len() < 4 {
            return Err(corrupt("truncated record length"));
        }
        let len = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
        bytes = &bytes[4..];
        if bytes.len() < len {
            return Err(corrupt("truncated record body"));
        }
        let record = serde_json::from_slice(&bytes[..len])
            .map_err(|e| corrupt(format!("bad record json: {e}")))?;
        out.push(record);
        bytes = &bytes[len..];
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Save
// ---------------------------------------------------------------------------

/// Serialize the index and atomically replace the cache file for this
/// fingerprint. Returns the final path.
pub fn save(
    dir: &Path,
    fingerprint: &CatalogFingerprint,
    index: &SchemaIndex,
) -> Result<PathBuf> {
    fs::create_dir_all(dir).map_err(|e| io_err("create cache dir", e))?;
    let final_path = dir.join(fingerprint.file_name());
    let _lock = AdvisoryLock::acquire(&final_path.with_extension("lock"));

    let mut sections: Vec<(u16, Vec<u8>)> = Vec::new();

    let mut meta = Vec::new();
    push_record(
        &mut meta,
        &MetaRecord {
            schema: fingerprint.schema.clone(),
            oracle_version: fingerprint.oracle_version.clone(),
            generation: fingerprint.generation.clone(),
            saved_at: Utc::now(),
            table_count: index.table_count(),
            plsql_loaded: index.plsql_loaded,
            udts_loaded: index.udts_loaded,
        },
    )?;
    sections.push((SECTION_META, meta));

    let mut tables = Vec::new();
    let mut columns = Vec::new();
    let mut constraints = Vec::new();
    let mut indexes = Vec::new();
    let mut ordered: Vec<&TableRecord> = index.tables().collect();
    ordered.sort_by(|a, b| a.name.cmp(&b.name));
    for record in ordered {
        push_record(
            &mut tables,
            &TableHeaderRecord {
                schema: record.schema.clone(),
                name: record.name.clone(),
                kind: record.kind,
                primary_key: record.primary_key.clone(),
                unique_keys: record.unique_keys.clone(),
                comment: record.comment.clone(),
                last_ddl: record.last_ddl,
                hydrated: record.hydrated,
            },
        )?;
        push_record(
            &mut columns,
            &ColumnsRecord {
                table: record.name.clone(),
                columns: record.columns.clone(),
            },
        )?;
        push_record(
            &mut constraints,
            &ConstraintsRecord {
                table: record.name.clone(),
                foreign_keys: record.foreign_keys.clone(),
                check_constraints: record.check_constraints.clone(),
            },
        )?;
        push_record(
            &mut indexes,
            &IndexesRecord {
                table: record.name.clone(),
                indexes: record.indexes.clone(),
            },
        )?;
    }
    sections.push((SECTION_TABLES, tables));
    sections.push((SECTION_COLUMNS, columns));
    sections.push((SECTION_CONSTRAINTS, constraints));
    sections.push((SECTION_INDEXES, indexes));

    let mut deps = Vec::new();
    for edge in index.edges() {
        push_record(&mut deps, edge)?;
    }
    sections.push((SECTION_DEPS, deps));

    let mut plsql = Vec::new();
    for object in index.plsql() {
        push_record(&mut plsql, object)?;
    }
    sections.push((SECTION_PLSQL, plsql));

    let mut udts = Vec::new();
    for udt in index.udts() {
        push_record(&mut udts, udt)?;
    }
    sections.push((SECTION_UDTS, udts));

    let mut names = Vec::new();
    push_record(
        &mut names,
        &NameIndexRecord {
            names: index.names().to_vec(),
        },
    )?;
    sections.push((SECTION_NAME_INDEX, names));

    let mut column_index = Vec::new();
    for (column, tables) in index.column_index() {
        push_record(
            &mut column_index,
            &ColumnIndexRecord {
                column: column.clone(),
                tables: tables.iter().cloned().collect(),
            },
        )?;
    }
    sections.push((SECTION_COLUMN_INDEX, column_index));

    let tmp_path = dir.join(format!(".{}.tmp-{}", fingerprint.hex(), std::process::id()));
    {
        let mut file = File::create(&tmp_path).map_err(|e| io_err("create temp cache file", e))?;
        file.write_all(MAGIC).map_err(|e| io_err("write cache", e))?;
        file.write_all(&FORMAT_VERSION.to_le_bytes())
            .map_err(|e| io_err("write cache", e))?;
        file.write_all(fingerprint.digest())
            .map_err(|e| io_err("write cache", e))?;
        file.write_all(&(sections.len() as u16).to_le_bytes())
            .map_err(|e| io_err("write cache", e))?;
        for (id, bytes) in &sections {
            file.write_all(&id.to_le_bytes())
                .map_err(|e| io_err("write cache", e))?;
            file.write_all(&(bytes.len() as u64).to_le_bytes())
                .map_err(|e| io_err("write cache", e))?;
            file.write_all(bytes).map_err(|e| io_err("write cache", e))?;
        }
        file.sync_all().map_err(|e| io_err("sync cache", e))?;
    }
    fs::rename(&tmp_path, &final_path).map_err(|e| io_err("rename cache file", e))?;
    debug!(path = %final_path.display(), "cache snapshot persisted");
    Ok(final_path)
}

// ---------------------------------------------------------------------------
// Load
// ---------------------------------------------------------------------------

/// Load the snapshot for `fingerprint`, or `None` when the file is absent,
/// names a different fingerprint, or is corrupt (corrupt files are discarded
/// and logged, never fatal).
pub fn load(dir: &Path, fingerprint: &CatalogFingerprint) -> Result<Option<SchemaIndex>> {
    let path = dir.join(fingerprint.file_name());
    if !path.exists() {
        return Ok(None);
    }
    match read_file(&path, fingerprint) {
        Ok(index) => Ok(Some(index)),
        Err(ServiceError::CacheCorrupt(msg)) => {
            warn!(path = %path.display(), "discarding corrupt cache file: {msg}");
            let _ = fs::remove_file(&path);
            Ok(None)
        }
        Err(other) => Err(other),
    }
}

fn read_file(path: &Path, fingerprint: &CatalogFingerprint) -> Result<SchemaIndex> {
    let mut bytes = Vec::new();
    File::open(path)
        .and_then(|mut f| f.read_to_end(&mut bytes))
        .map_err(|e| io_err("read cache file", e))?;

    if bytes.len() < 4 + 2 + 32 + 2 {
        return Err(corrupt("file shorter than header"));
    }
    if &bytes[..4] != MAGIC {
        return Err(corrupt("bad magic"));
    }
    let version = u16::from_le_bytes([bytes[4], bytes[5]]);
    if version != FORMAT_VERSION {
        return Err(corrupt(format!("unsupported version {version}")));
    }
    if &bytes[6..38] != fingerprint.digest() {
        // A different catalog generation wrote this file name; rebuild.
        return Err(corrupt("fingerprint mismatch"));
    }
    let section_count = u16::from_le_bytes([bytes[38], bytes[39]]) as usize;

    let mut cursor = 40usize;
    let mut headers: Vec<TableHeaderRecord> = Vec::new();
    let mut columns: Vec<ColumnsRecord> = Vec::new();
    let mut constraints: Vec<ConstraintsRecord> = Vec::new();
    let mut index_lists: Vec<IndexesRecord> = Vec::new();
    let mut edges: Vec<DependencyEdge> = Vec::new();
    let mut plsql: Vec<PlsqlObject> = Vec::new();
    let mut udts: Vec<UserDefinedType> = Vec::new();
    let mut meta: Option<MetaRecord> = None;

    for _ in 0..section_count {
        if bytes.len() < cursor + 10 {
            return Err(corrupt("truncated section header"));
        }
        let id = u16::from_le_bytes([bytes[cursor], bytes[cursor + 1]]);
        let len = u64::from_le_bytes(
            bytes[cursor + 2..cursor + 10]
                .try_into()
                .expect("slice length checked"),
        ) as usize;
        cursor += 10;
        if bytes.len() < cursor + len {
            return Err(corrupt("truncated section body"));
        }
        let body = &bytes[cursor..cursor + len];
        cursor += len;

        match id {
            SECTION_META => meta = read_records::<MetaRecord>(body)?.into_iter().next(),
            SECTION_TABLES => headers = read_records(body)?,
            SECTION_COLUMNS => columns = read_records(body)?,
            SECTION_CONSTRAINTS => constraints = read_records(body)?,
            SECTION_INDEXES => index_lists = read_records(body)?,
            SECTION_DEPS => edges = read_records(body)?,
            SECTION_PLSQL => plsql = read_records(body)?,
            SECTION_UDTS => udts = read_records(body)?,
            // The derived indexes are rebuilt from the tables sections; the
            // records are still validated so corruption is caught.
            SECTION_NAME_INDEX => {
                let _: Vec<NameIndexRecord> = read_records(body)?;
            }
            SECTION_COLUMN_INDEX => {
                let _: Vec<ColumnIndexRecord> = read_records(body)?;
            }
            unknown => {
                debug!(section = unknown, "skipping unknown cache section");
            }
        }
    }

    let meta = meta.ok_or_else(|| corrupt("missing meta section"))?;

    let mut assembled = SchemaIndex::default();
    let mut seen = HashSet::new();
    for header in headers {
        let key = header.name.to_uppercase();
        if !seen.insert(key.clone()) {
            return Err(corrupt(format!("duplicate table record {key}")));
        }
        let cols = columns
            .iter()
            .find(|c| c.table == header.name)
            .map(|c| c.columns.clone())
            .unwrap_or_default();
        let cons = constraints.iter().find(|c| c.table == header.name);
        let idxs = index_lists
            .iter()
            .find(|i| i.table == header.name)
            .map(|i| i.indexes.clone())
            .unwrap_or_default();
        assembled.insert_table(TableRecord {
            schema: header.schema,
            name: header.name,
            kind: header.kind,
            columns: cols,
            primary_key: header.primary_key,
            unique_keys: header.unique_keys,
            foreign_keys: cons.map(|c| c.foreign_keys.clone()).unwrap_or_default(),
            check_constraints: cons
                .map(|c| c.check_constraints.clone())
                .unwrap_or_default(),
            indexes: idxs,
            comment: header.comment,
            last_ddl: header.last_ddl,
            hydrated: header.hydrated,
        });
    }
    assembled.set_edges(edges);
    if meta.plsql_loaded {
        assembled.set_plsql(plsql);
    }
    if meta.udts_loaded {
        assembled.set_udts(udts);
    }
    Ok(assembled)
}

// ---------------------------------------------------------------------------
// Advisory lock
// ---------------------------------------------------------------------------

/// Best-effort cross-process write lock: a sibling `.lock` file created with
/// create-new semantics. A stale lock is taken over; failure to lock only
/// logs, in-process writers are already serialized by the store.
struct AdvisoryLock {
    path: Option<PathBuf>,
}

impl AdvisoryLock {
    fn acquire(path: &Path) -> Self {
        for attempt in 0..2 {
            match OpenOptions::new().write(true).create_new(true).open(path) {
                Ok(mut file) => {
                    let _ = write!(file, "{}", std::process::id());
                    return Self {
                        path: Some(path.to_path_buf()),
                    };
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists && attempt == 0 => {
                    let stale = fs::metadata(path)
                        .and_then(|m| m.modified())
                        .ok()
                        .and_then(|t| t.elapsed().ok())
                        .map(|age| age.as_secs() > LOCK_STALE_AFTER_SECS)
                        .unwrap_or(true);
                    if stale {
                        let _ = fs::remove_file(path);
                        continue;
                    }
                    warn!(path = %path.display(), "cache lock held elsewhere, writing anyway");
                    return Self { path: None };
                }
                Err(_) => return Self { path: None },
            }
        }
        Self { path: None }
    }
}

impl Drop for AdvisoryLock {
    fn drop(&mut self) {
        if let Some(path) = &self.path {
            let _ = fs::remove_file(path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::models::{ColumnRecord, ObjectKind, ObjectRef, OnDelete};
    use tempfile::tempdir;

    fn fingerprint() -> CatalogFingerprint {
        CatalogFingerprint::compute("19.0.0.0.0", "HR", "20260101120000:42")
    }

    fn sample_index() -> SchemaIndex {
        let mut index = SchemaIndex::default();
        index.insert_table(TableRecord {
            schema: "HR".into(),
            name: "DEPARTMENTS".into(),
            kind: TableKind::Table,
            columns: vec![ColumnRecord {
                name: "DEPT_ID".into(),
                position: 1,
                data_type: "NUMBER(10)".into(),
                nullable: false,
                default_expr: None,
                comment: None,
            }],
            primary_key: Some(vec!["DEPT_ID".into()]),
            unique_keys: vec![],
            foreign_keys: vec![],
            check_constraints: vec![],
            indexes: vec![],
            comment: Some("Org units".into()),
            last_ddl: None,
            hydrated: true,
        });
        index.insert_table(TableRecord {
            schema: "HR".into(),
            name: "EMPLOYEES".into(),
            kind: TableKind::Table,
            columns: vec![
                ColumnRecord {
                    name: "EMP_ID".into(),
                    position: 1,
                    data_type: "NUMBER(10)".into(),
                    nullable: false,
                    default_expr: None,
                    comment: None,
                },
                ColumnRecord {
                    name: "DEPT_ID".into(),
                    position: 2,
                    data_type: "NUMBER(10)".into(),
                    nullable: true,
                    default_expr: None,
                    comment: None,
                },
            ],
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
            indexes: vec![IndexRecord {
                name: "IX_EMP_DEPT".into(),
                unique: false,
                columns: vec![("DEPT_ID".into(), crate::cache::models::SortOrder::Asc)],
                index_type: "NORMAL".into(),
            }],
            comment: None,
            last_ddl: None,
            hydrated: true,
        });
        index.set_edges(vec![DependencyEdge {
            referrer: ObjectRef::new("HR", "EMP_VIEW", "VIEW"),
            referenced: ObjectRef::new("HR", "EMPLOYEES", "TABLE"),
        }]);
        index.set_plsql(vec![PlsqlObject {
            schema: "HR".into(),
            name: "PAYROLL".into(),
            kind: ObjectKind::Package,
            status: "VALID".into(),
            last_ddl: None,
            source_available: true,
        }]);
        index.set_udts(vec![]);
        index
    }

    fn assert_index_round_trips(original: &SchemaIndex, loaded: &SchemaIndex) {
        assert_eq!(loaded.table_count(), original.table_count());
        assert_eq!(loaded.names(), original.names());
        for record in original.tables() {
            let restored = loaded.get(&record.name.to_uppercase()).unwrap();
            assert_eq!(restored, record);
        }
        assert_eq!(loaded.edges(), original.edges());
        assert_eq!(loaded.plsql(), original.plsql());
        assert_eq!(loaded.plsql_loaded, original.plsql_loaded);
        assert_eq!(loaded.udts_loaded, original.udts_loaded);
    }

    #[test]
    fn test_round_trip() {
        let dir = tempdir().unwrap();
        let fp = fingerprint();
        let index = sample_index();

        save(dir.path(), &fp, &index).unwrap();
        let loaded = load(dir.path(), &fp).unwrap().expect("snapshot present");
        assert_index_round_trips(&index, &loaded);
    }

    #[test]
    fn test_missing_file_is_none() {
        let dir = tempdir().unwrap();
        assert!(load(dir.path(), &fingerprint()).unwrap().is_none());
    }

    #[test]
    fn test_corrupt_magic_discarded() {
        let dir = tempdir().unwrap();
        let fp = fingerprint();
        let path = save(dir.path(), &fp, &sample_index()).unwrap();
        fs::write(&path, b"NOPE").unwrap();
        assert!(load(dir.path(), &fp).unwrap().is_none());
        // Discarded on load.
        assert!(!path.exists());
    }

    #[test]
    fn test_truncated_file_discarded() {
        let dir = tempdir().unwrap();
        let fp = fingerprint();
        let path = save(dir.path(), &fp, &sample_index()).unwrap();
        let bytes = fs::read(&path).unwrap();
        fs::write(&path, &bytes[..bytes.len() / 2]).unwrap();
        assert!(load(dir.path(), &fp).unwrap().is_none());
    }

    #[test]
    fn test_fingerprint_mismatch_discarded() {
        let dir = tempdir().unwrap();
        let fp = fingerprint();
        let other = CatalogFingerprint::compute("19.0.0.0.0", "HR", "different");
        let path = save(dir.path(), &fp, &sample_index()).unwrap();
        // Pretend the old generation's bytes landed under the new name.
        fs::rename(&path, dir.path().join(other.file_name())).unwrap();
        assert!(load(dir.path(), &other).unwrap().is_none());
    }

    #[test]
    fn test_interrupted_write_leaves_previous_snapshot() {
        let dir = tempdir().unwrap();
        let fp = fingerprint();
        let index = sample_index();
        save(dir.path(), &fp, &index).unwrap();

        // A crashed writer leaves only a temp file behind; the snapshot under
        // the final name must stay intact.
        fs::write(dir.path().join(format!(".{}.tmp-9999", fp.hex())), b"partial").unwrap();
        let loaded = load(dir.path(), &fp).unwrap().expect("snapshot survives");
        assert_index_round_trips(&index, &loaded);
    }

    #[test]
    fn test_unknown_section_skipped() {
        let dir = tempdir().unwrap();
        let fp = fingerprint();
        let path = save(dir.path(), &fp, &sample_index()).unwrap();

        // Append a section with an unknown id and patch the section count.
        let mut bytes = fs::read(&path).unwrap();
        let count = u16::from_le_bytes([bytes[38], bytes[39]]);
        bytes[38..40].copy_from_slice(&(count + 1).to_le_bytes());
        bytes.extend_from_slice(&99u16.to_le_bytes());
        bytes.extend_from_slice(&4u64.to_le_bytes());
        bytes.extend_from_slice(b"zzzz");
        fs::write(&path, bytes).unwrap();

        assert!(load(dir.path(), &fp).unwrap().is_some());
    }

    #[test]
    fn test_lock_file_removed_after_save() {
        let dir = tempdir().unwrap();
        let fp = fingerprint();
        save(dir.path(), &fp, &sample_index()).unwrap();
        assert!(!dir
            .path()
            .join(fp.file_name())
            .with_extension("lock")
            .exists());
    }
}
