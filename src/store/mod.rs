//! Document store interfaces and built-in stores.
//!
//! Ownership model:
//! - `Store` is the builder-facing capability interface (query, distinct,
//!   index, upsert, remove). Builders hold stores behind `Arc<dyn Store>`.
//! - `MemoryStore` keeps documents in insertion order in memory.
//! - `FileStore` persists documents in an append-only key/value file.
//!
//! Every store returns query results in insertion order. Candidate tie-breaks
//! downstream depend on that ordering.

use serde_json::Value;

use crate::errors::BuildError;

/// Query criteria and document helpers.
pub mod criteria;
/// File-backed persistent store.
pub mod file;
/// In-memory store.
pub mod memory;

pub use criteria::{Condition, Criteria, Document};
pub use file::FileStore;
pub use memory::MemoryStore;

/// Document collection consumed by builders.
///
/// Implementations must be safe to share across worker threads; builders never
/// hold a store-level lock across calls.
pub trait Store: Send + Sync {
    /// Human-readable store name used in logs and errors.
    fn name(&self) -> &str;

    /// Name of the primary identifier field.
    fn key(&self) -> &str;

    /// Return documents matching `criteria`, optionally projected to `projection`.
    fn query(
        &self,
        criteria: &Criteria,
        projection: Option<&[&str]>,
    ) -> Result<Vec<Document>, BuildError>;

    /// Return the first document matching `criteria`.
    fn query_one(&self, criteria: &Criteria) -> Result<Option<Document>, BuildError> {
        Ok(self.query(criteria, None)?.into_iter().next())
    }

    /// Unique values of `field` over documents matching `criteria`.
    ///
    /// Array values are flattened. Values keep first-seen order.
    fn distinct(&self, field: &str, criteria: &Criteria) -> Result<Vec<Value>, BuildError> {
        let docs = self.query(criteria, None)?;
        Ok(distinct_values(&docs, field))
    }

    /// Request an index on `field`. Returns `true` when the index was new.
    fn ensure_index(&self, field: &str) -> Result<bool, BuildError>;

    /// Upsert `docs` keyed by the composite `key_fields`. Returns the number written.
    fn update(&self, docs: Vec<Document>, key_fields: &[&str]) -> Result<usize, BuildError>;

    /// Remove every document matching `criteria`. Returns the number removed.
    fn remove_docs(&self, criteria: &Criteria) -> Result<usize, BuildError>;

    /// Count documents matching `criteria`.
    fn count(&self, criteria: &Criteria) -> Result<usize, BuildError> {
        Ok(self.query(criteria, None)?.len())
    }
}

pub(crate) fn distinct_values(docs: &[Document], field: &str) -> Vec<Value> {
    let mut seen = indexmap::IndexMap::new();
    for doc in docs {
        let Some(value) = criteria::lookup(doc, field) else {
            continue;
        };
        match value {
            Value::Array(items) => {
                for item in items {
                    seen.entry(item.to_string()).or_insert_with(|| item.clone());
                }
            }
            other => {
                seen.entry(other.to_string())
                    .or_insert_with(|| other.clone());
            }
        }
    }
    seen.into_values().collect()
}

/// Composite key string for `doc`, or an error naming the missing field.
pub(crate) fn composite_key(
    store: &str,
    doc: &Document,
    key_fields: &[&str],
    separator: char,
) -> Result<String, BuildError> {
    if key_fields.is_empty() {
        return Err(BuildError::Store(format!(
            "store '{store}' update requires at least one key field"
        )));
    }
    let mut parts = Vec::with_capacity(key_fields.len());
    for field in key_fields {
        let value = criteria::lookup(doc, field).ok_or_else(|| {
            BuildError::Store(format!(
                "store '{store}' update document missing key field '{field}'"
            ))
        })?;
        parts.push(value.to_string());
    }
    Ok(parts.join(&separator.to_string()))
}
