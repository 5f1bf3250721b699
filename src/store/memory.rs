use indexmap::IndexSet;
use std::sync::RwLock;

use crate::constants::file_store::SLOT_SEPARATOR;
use crate::errors::BuildError;
use crate::store::criteria::{self, Criteria, Document};
use crate::store::{Store, composite_key};

/// In-memory document store for tests, demos, and small datasets.
///
/// Documents are kept in insertion order; upserts replace matching documents in place.
pub struct MemoryStore {
    name: String,
    key: String,
    docs: RwLock<Vec<Document>>,
    indexes: RwLock<IndexSet<String>>,
}

impl MemoryStore {
    /// Create an empty store named `name` whose primary identifier field is `key`.
    pub fn new(name: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key: key.into(),
            docs: RwLock::new(Vec::new()),
            indexes: RwLock::new(IndexSet::new()),
        }
    }

    /// Create a store pre-populated with `docs` (kept in the given order).
    pub fn with_documents(
        name: impl Into<String>,
        key: impl Into<String>,
        docs: Vec<Document>,
    ) -> Self {
        let store = Self::new(name, key);
        if let Ok(mut guard) = store.docs.write() {
            *guard = docs;
        }
        store
    }

    /// Fields with a requested index, in request order.
    pub fn indexes(&self) -> Vec<String> {
        self.indexes
            .read()
            .map(|guard| guard.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of stored documents.
    pub fn len(&self) -> usize {
        self.docs.read().map(|guard| guard.len()).unwrap_or(0)
    }

    /// Returns `true` when the store holds no documents.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn poisoned(&self) -> BuildError {
        BuildError::Store(format!("store '{}' lock poisoned", self.name))
    }
}

impl Store for MemoryStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn key(&self) -> &str {
        &self.key
    }

    fn query(
        &self,
        criteria: &Criteria,
        projection: Option<&[&str]>,
    ) -> Result<Vec<Document>, BuildError> {
        let guard = self.docs.read().map_err(|_| self.poisoned())?;
        Ok(guard
            .iter()
            .filter(|doc| criteria.matches(doc))
            .map(|doc| match projection {
                Some(fields) => criteria::project(doc, fields),
                None => doc.clone(),
            })
            .collect())
    }

    fn ensure_index(&self, field: &str) -> Result<bool, BuildError> {
        let mut guard = self.indexes.write().map_err(|_| self.poisoned())?;
        Ok(guard.insert(field.to_string()))
    }

    fn update(&self, docs: Vec<Document>, key_fields: &[&str]) -> Result<usize, BuildError> {
        // Validate every key before mutating so a bad batch writes nothing.
        let keyed = docs
            .into_iter()
            .map(|doc| {
                composite_key(&self.name, &doc, key_fields, SLOT_SEPARATOR).map(|key| (key, doc))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let mut guard = self.docs.write().map_err(|_| self.poisoned())?;
        let written = keyed.len();
        for (key, doc) in keyed {
            let existing = guard.iter().position(|stored| {
                composite_key(&self.name, stored, key_fields, SLOT_SEPARATOR)
                    .is_ok_and(|stored_key| stored_key == key)
            });
            match existing {
                Some(pos) => guard[pos] = doc,
                None => guard.push(doc),
            }
        }
        Ok(written)
    }

    fn remove_docs(&self, criteria: &Criteria) -> Result<usize, BuildError> {
        let mut guard = self.docs.write().map_err(|_| self.poisoned())?;
        let before = guard.len();
        guard.retain(|doc| !criteria.matches(doc));
        Ok(before - guard.len())
    }
}
