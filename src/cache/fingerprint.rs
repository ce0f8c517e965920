//! Catalog fingerprints.
//!
//! A fingerprint binds a cache snapshot to `(oracle version, target schema,
//! catalog generation)`. The generation string is derived from
//! `MAX(LAST_DDL_TIME)` and the object count, so any DDL in the schema moves
//! the fingerprint forward. The digest names the cache file on disk.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogFingerprint {
    pub oracle_version: String,
    pub schema: String,
    pub generation: String,
    digest: [u8; 32],
}

impl CatalogFingerprint {
    pub fn compute(oracle_version: &str, schema: &str, generation: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(oracle_version.as_bytes());
        hasher.update([0u8]);
        hasher.update(schema.to_uppercase().as_bytes());
        hasher.update([0u8]);
        hasher.update(generation.as_bytes());
        Self {
            oracle_version: oracle_version.to_string(),
            schema: schema.to_uppercase(),
            generation: generation.to_string(),
            digest: hasher.finalize().into(),
        }
    }

    pub fn digest(&self) -> &[u8; 32] {
        &self.digest
    }

    pub fn hex(&self) -> String {
        self.digest.iter().map(|b| format!("{b:02x}")).collect()
    }

    /// Cache file name under `CACHE_DIR`.
    pub fn file_name(&self) -> String {
        format!("{}.idx", self.hex())
    }
}
