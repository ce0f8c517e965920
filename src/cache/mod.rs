//! L2: the persistent, versioned schema index.

pub mod fingerprint;
pub mod index;
pub mod models;
pub mod persist;
pub mod store;

pub use fingerprint::CatalogFingerprint;
pub use index::{normalize_ident, split_qualified, Pattern, SchemaIndex};
pub use store::{BuildStats, SchemaCache, DEFAULT_LIMIT, MAX_LIMIT, MAX_SOURCE_BYTES};
