//! In-memory catalog index.
//!
//! Holds the table map plus the secondary structures that make pattern and
//! column search sub-second at 10^4+ tables: a sorted name array for
//! prefix/substring scans, a column → tables map, and dependency adjacency.
//! All lookups normalize identifiers through `UPPER` unless the caller quotes
//! them; stored names keep Oracle's case verbatim.

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::cache::models::{
    DependencyEdge, ObjectRef, PlsqlObject, TableRecord, UserDefinedType,
};
use crate::error::{Result, ServiceError};

/// Normalize an identifier: quoted identifiers keep their exact case, bare
/// ones fold to upper.
pub fn normalize_ident(name: &str) -> String {
    let trimmed = name.trim();
    if let Some(inner) = trimmed
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
    {
        inner.to_string()
    } else {
        trimmed.to_uppercase()
    }
}

/// Split an optionally schema-qualified name into `(schema, name)`.
pub fn split_qualified(name: &str) -> (Option<String>, String) {
    let trimmed = name.trim();
    // A dot inside a quoted identifier is part of the name.
    if trimmed.starts_with('"') {
        if let Some(end) = trimmed[1..].find('"') {
            let rest = &trimmed[end + 2..];
            if let Some(stripped) = rest.strip_prefix('.') {
                return (
                    Some(normalize_ident(&trimmed[..end + 2])),
                    normalize_ident(stripped),
                );
            }
        }
        return (None, normalize_ident(trimmed));
    }
    match trimmed.split_once('.') {
        Some((schema, rest)) => (Some(normalize_ident(schema)), normalize_ident(rest)),
        None => (None, normalize_ident(trimmed)),
    }
}

/// Result ordering tier for pattern matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum MatchTier {
    Exact,
    Prefix,
    Substring,
}

/// A search pattern: a glob when it contains `%`, otherwise a
/// case-insensitive substring.
#[derive(Debug, Clone)]
pub struct Pattern {
    raw: String,
    segments: Option<Vec<String>>,
    /// The pattern with wildcards stripped; drives tier assignment.
    core: String,
}

impl Pattern {
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim().to_uppercase();
        if trimmed.is_empty() {
            return Err(ServiceError::InvalidArgument("empty pattern".into()));
        }
        // A bare "%" matches everything; only the empty string is rejected.
        let core: String = trimmed.replace('%', "");
        let segments = if trimmed.contains('%') {
            Some(trimmed.split('%').map(str::to_string).collect())
        } else {
            None
        };
        Ok(Self {
            raw: trimmed,
            segments,
            core,
        })
    }

    pub fn matches(&self, upper_name: &str) -> bool {
        match &self.segments {
            None => upper_name.contains(self.raw.as_str()),
            Some(segments) => glob_match(upper_name, segments),
        }
    }

    fn tier(&self, upper_name: &str) -> MatchTier {
        if !self.core.is_empty() {
            if upper_name == self.core {
                return MatchTier::Exact;
            }
            if upper_name.starts_with(self.core.as_str()) {
                return MatchTier::Prefix;
            }
        }
        MatchTier::Substring
    }
}

/// `%`-wildcard glob over the segments produced by splitting on `%`.
fn glob_match(name: &str, segments: &[String]) -> bool {
    let Some((first, rest)) = segments.split_first() else {
        return name.is_empty();
    };
    if !name.starts_with(first.as_str()) {
        return false;
    }
    let Some((last, middle)) = rest.split_last() else {
        // No '%' at all: the whole pattern is one segment.
        return name == first.as_str();
    };
    let mut pos = first.len();
    for seg in middle {
        if seg.is_empty() {
            continue;
        }
        match name[pos..].find(seg.as_str()) {
            Some(found) => pos = pos + found + seg.len(),
            None => return false,
        }
    }
    let tail = &name[pos..];
    tail.len() >= last.len() && tail.ends_with(last.as_str())
}

/// The assembled in-memory index. Cheap to clone for persistence snapshots.
#[derive(Debug, Clone, Default)]
pub struct SchemaIndex {
    tables: HashMap<String, TableRecord>,
    sorted_names: Vec<String>,
    by_column: HashMap<String, BTreeSet<String>>,
    /// target table → (referrer table, joined local columns)
    incoming_fks: HashMap<String, Vec<(String, String)>>,
    edges: Vec<DependencyEdge>,
    dependents: HashMap<String, Vec<ObjectRef>>,
    dependents_cached: HashSet<String>,
    plsql: Vec<PlsqlObject>,
    pub plsql_loaded: bool,
    udts: Vec<UserDefinedType>,
    pub udts_loaded: bool,
    stale: HashSet<String>,
}

impl SchemaIndex {
    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    pub fn get(&self, upper_name: &str) -> Option<&TableRecord> {
        self.tables.get(upper_name)
    }

    pub fn names(&self) -> &[String] {
        &self.sorted_names
    }

    pub fn tables(&self) -> impl Iterator<Item = &TableRecord> {
        self.tables.values()
    }

    pub fn insert_table(&mut self, record: TableRecord) {
        let key = record.name.to_uppercase();
        self.remove_table(&key);
        for column in &record.columns {
            self.by_column
                .entry(column.name.to_uppercase())
                .or_default()
                .insert(key.clone());
        }
        for fk in &record.foreign_keys {
            if !fk.external {
                self.incoming_fks
                    .entry(fk.target_table.to_uppercase())
                    .or_default()
                    .push((key.clone(), fk.local_columns.join(",")));
            }
        }
        if let Err(pos) = self.sorted_names.binary_search(&key) {
            self.sorted_names.insert(pos, key.clone());
        }
        self.stale.remove(&key);
        self.tables.insert(key, record);
    }

    pub fn remove_table(&mut self, upper_name: &str) {
        let Some(old) = self.tables.remove(upper_name) else {
            return;
        };
        for column in &old.columns {
            let col_key = column.name.to_uppercase();
            if let Some(set) = self.by_column.get_mut(&col_key) {
                set.remove(upper_name);
                if set.is_empty() {
                    self.by_column.remove(&col_key);
                }
            }
        }
        for entry in self.incoming_fks.values_mut() {
            entry.retain(|(referrer, _)| referrer != upper_name);
        }
        self.incoming_fks.retain(|_, v| !v.is_empty());
        if let Ok(pos) = self.sorted_names.binary_search(&upper_name.to_string()) {
            self.sorted_names.remove(pos);
        }
        self.stale.remove(upper_name);
    }

    /// Drop tables absent from `survivors` (a full sweep's inventory).
    pub fn retain_tables(&mut self, survivors: &HashSet<String>) {
        let gone: Vec<String> = self
            .tables
            .keys()
            .filter(|k| !survivors.contains(*k))
            .cloned()
            .collect();
        for key in gone {
            self.remove_table(&key);
        }
    }

    pub fn mark_stale(&mut self, upper_name: &str) {
        if self.tables.contains_key(upper_name) {
            self.stale.insert(upper_name.to_string());
        }
    }

    pub fn mark_all_stale(&mut self) {
        self.stale.extend(self.sorted_names.iter().cloned());
        self.dependents.clear();
        self.dependents_cached.clear();
        self.plsql_loaded = false;
        self.udts_loaded = false;
    }

    pub fn is_stale(&self, upper_name: &str) -> bool {
        self.stale.contains(upper_name)
    }

    // ------------------------------------------------------------------
    // Search
    // ------------------------------------------------------------------

    /// Table names matching `pattern`, deduplicated and ordered exact →
    /// prefix → substring, lexicographic within each tier.
    pub fn search_table_names(&self, pattern: &Pattern, limit: usize) -> Vec<String> {
        let mut tiers: [Vec<&String>; 3] = [Vec::new(), Vec::new(), Vec::new()];
        for name in &self.sorted_names {
            if pattern.matches(name) {
                let slot = match pattern.tier(name) {
                    MatchTier::Exact => 0,
                    MatchTier::Prefix => 1,
                    MatchTier::Substring => 2,
                };
                tiers[slot].push(name);
            }
        }
        tiers
            .iter()
            .flatten()
            .take(limit)
            .map(|n| (*n).clone())
            .collect()
    }

    /// `(table, column, data_type)` rows whose column name matches, ordered
    /// by tier then table name.
    pub fn search_columns(&self, pattern: &Pattern, limit: usize) -> Vec<(String, String, String)> {
        let mut matched: Vec<(MatchTier, &String)> = self
            .by_column
            .keys()
            .filter(|col| pattern.matches(col))
            .map(|col| (pattern.tier(col), col))
            .collect();
        matched.sort();

        let mut out = Vec::new();
        for (_tier, col_key) in matched {
            let Some(tables) = self.by_column.get(col_key) else {
                continue;
            };
            for table_key in tables {
                let Some(record) = self.tables.get(table_key) else {
                    continue;
                };
                let Some(column) = record.column(col_key) else {
                    continue;
                };
                out.push((
                    record.name.clone(),
                    column.name.clone(),
                    column.data_type.clone(),
                ));
                if out.len() >= limit {
                    return out;
                }
            }
        }
        out
    }

    /// Tables containing a column with this exact (normalized) name.
    pub fn tables_with_column(&self, upper_column: &str) -> Vec<String> {
        self.by_column
            .get(upper_column)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// One-hop foreign-key neighbors: `(outgoing, incoming)` as
    /// `(table, via-columns)` pairs.
    pub fn related_tables(
        &self,
        upper_name: &str,
    ) -> Option<(Vec<(String, String)>, Vec<(String, String)>)> {
        let record = self.tables.get(upper_name)?;
        let outgoing = record
            .foreign_keys
            .iter()
            .map(|fk| (fk.target_table.clone(), fk.local_columns.join(",")))
            .collect();
        let mut incoming: Vec<(String, String)> = self
            .incoming_fks
            .get(upper_name)
            .cloned()
            .unwrap_or_default();
        incoming.sort();
        incoming.dedup();
        Some((outgoing, incoming))
    }

    // ------------------------------------------------------------------
    // Dependencies
    // ------------------------------------------------------------------

    pub fn set_edges(&mut self, edges: Vec<DependencyEdge>) {
        self.dependents.clear();
        self.dependents_cached.clear();
        for edge in &edges {
            self.dependents
                .entry(edge.referenced.name.to_uppercase())
                .or_default()
                .push(edge.referrer.clone());
        }
        for key in self.dependents.keys() {
            self.dependents_cached.insert(key.clone());
        }
        self.edges = edges;
    }

    pub fn edges(&self) -> &[DependencyEdge] {
        &self.edges
    }

    /// Cached dependents of an object, if that object's dependents were ever
    /// loaded. `None` means "not known", an empty vec means "known empty".
    pub fn dependents_of(&self, upper_name: &str) -> Option<Vec<ObjectRef>> {
        if self.dependents_cached.contains(upper_name) {
            Some(self.dependents.get(upper_name).cloned().unwrap_or_default())
        } else {
            None
        }
    }

    pub fn cache_dependents(&mut self, upper_name: String, referrers: Vec<ObjectRef>) {
        for referrer in &referrers {
            let edge = DependencyEdge {
                referrer: referrer.clone(),
                referenced: ObjectRef::new("", upper_name.clone(), ""),
            };
            if !self.edges.contains(&edge) {
                self.edges.push(edge);
            }
        }
        self.dependents.insert(upper_name.clone(), referrers);
        self.dependents_cached.insert(upper_name);
    }

    // ------------------------------------------------------------------
    // PL/SQL inventory & user-defined types
    // ------------------------------------------------------------------

    pub fn set_plsql(&mut self, objects: Vec<PlsqlObject>) {
        self.plsql = objects;
        self.plsql_loaded = true;
    }

    pub fn plsql(&self) -> &[PlsqlObject] {
        &self.plsql
    }

    pub fn set_udts(&mut self, udts: Vec<UserDefinedType>) {
        self.udts = udts;
        self.udts_loaded = true;
    }

    pub fn column_index(&self) -> impl Iterator<Item = (&String, &BTreeSet<String>)> {
        self.by_column.iter()
    }

    pub fn udts(&self) -> &[UserDefinedType] {
        &self.udts
    }
}
