use simd_r_drive::storage_engine::DataStore;
use simd_r_drive::storage_engine::traits::{DataStoreReader, DataStoreWriter};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use crate::constants::file_store::{
    BITCODE_PREFIX, DEFAULT_STORE_DIR, DOC_PREFIX, DOC_RECORD_VERSION, DOC_TOMBSTONE,
    INDEXES_KEY, META_KEY, SLOT_SEPARATOR, SLOTS_KEY, STORE_FILE_EXTENSION, STORE_VERSION,
};
use crate::errors::BuildError;
use crate::store::criteria::{self, Criteria, Document};
use crate::store::{Store, composite_key};

#[derive(Clone, Debug, bitcode::Encode, bitcode::Decode)]
/// Versioned metadata header stored in file-backed document stores.
struct StoreMeta {
    version: u8,
    key: String,
}

/// Insertion-ordered list of live document slots.
#[derive(Clone, Debug, Default, bitcode::Encode, bitcode::Decode)]
struct PersistedSlots {
    slots: Vec<String>,
}

/// Advisory index fields requested on the store.
#[derive(Clone, Debug, Default, bitcode::Encode, bitcode::Decode)]
struct PersistedIndexes {
    fields: Vec<String>,
}

/// File-backed document store for persistent runs.
///
/// Documents live in an append-only key/value file. Each document occupies a
/// slot named after its composite upsert key (or its primary key when written
/// without one); removal writes a tombstone and drops the slot from the
/// persisted slot list, which preserves insertion order across reopen.
pub struct FileStore {
    name: String,
    key: String,
    path: PathBuf,
    store: DataStore,
    slots: RwLock<Vec<String>>,
    indexes: RwLock<Vec<String>>,
}

impl fmt::Debug for FileStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileStore")
            .field("name", &self.name)
            .field("key", &self.key)
            .field("path", &self.path)
            .finish()
    }
}

impl FileStore {
    /// Open (or create) a file-backed store at `path` with primary key field `key`.
    ///
    /// Passing a directory places the store file at `<dir>/<name>.bin`.
    pub fn open<P: Into<PathBuf>>(
        path: P,
        name: impl Into<String>,
        key: impl Into<String>,
    ) -> Result<Self, BuildError> {
        let name = name.into();
        let key = key.into();
        let path = coerce_store_path(path.into(), &name);
        ensure_parent_dir(&path)?;
        let store = DataStore::open(path.as_path()).map_err(|err| BuildError::StoreUnavailable {
            store: name.clone(),
            reason: format!("failed opening {}: {err}", path.display()),
        })?;
        let slots = match read_bytes(&store, SLOTS_KEY)? {
            Some(bytes) => decode_slots(&bytes)?.slots,
            None => Vec::new(),
        };
        let indexes = match read_bytes(&store, INDEXES_KEY)? {
            Some(bytes) => decode_indexes(&bytes)?.fields,
            None => Vec::new(),
        };
        let store = Self {
            name,
            key,
            path,
            store,
            slots: RwLock::new(slots),
            indexes: RwLock::new(indexes),
        };
        store.verify_metadata()?;
        Ok(store)
    }

    /// Default store file path for `name` under the crate's default store directory.
    pub fn default_path(name: &str) -> PathBuf {
        Self::default_path_in_dir(DEFAULT_STORE_DIR, name)
    }

    /// Default store file path for `name` inside a custom directory.
    pub fn default_path_in_dir<P: AsRef<Path>>(dir: P, name: &str) -> PathBuf {
        dir.as_ref()
            .join(format!("{name}.{STORE_FILE_EXTENSION}"))
    }

    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Fields with a requested index, in request order.
    pub fn indexes(&self) -> Vec<String> {
        self.indexes
            .read()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    fn verify_metadata(&self) -> Result<(), BuildError> {
        match read_bytes(&self.store, META_KEY)? {
            Some(bytes) => {
                let meta = decode_store_meta(&bytes)?;
                if meta.version != STORE_VERSION {
                    return Err(BuildError::Store(format!(
                        "file store version mismatch (expected {}, found {})",
                        STORE_VERSION, meta.version
                    )));
                }
                if meta.key != self.key {
                    return Err(BuildError::Store(format!(
                        "file store key mismatch (expected '{}', found '{}')",
                        self.key, meta.key
                    )));
                }
            }
            None => {
                let meta = StoreMeta {
                    version: STORE_VERSION,
                    key: self.key.clone(),
                };
                write_bytes(&self.store, META_KEY, &encode_store_meta(&meta))?;
            }
        }
        Ok(())
    }

    fn read_doc(&self, slot: &str) -> Result<Option<Document>, BuildError> {
        match read_bytes(&self.store, &doc_key(slot))? {
            Some(bytes) => decode_doc(&bytes),
            None => Ok(None),
        }
    }

    fn write_doc(&self, slot: &str, doc: &Document) -> Result<(), BuildError> {
        write_bytes(&self.store, &doc_key(slot), &encode_doc(doc)?)
    }

    fn persist_slots(&self, slots: &[String]) -> Result<(), BuildError> {
        let payload = encode_slots(&PersistedSlots {
            slots: slots.to_vec(),
        });
        write_bytes(&self.store, SLOTS_KEY, &payload)
    }

    fn poisoned(&self) -> BuildError {
        BuildError::Store(format!("store '{}' lock poisoned", self.name))
    }
}

impl Store for FileStore {
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
        let slots = self.slots.read().map_err(|_| self.poisoned())?;
        let mut out = Vec::new();
        for slot in slots.iter() {
            let Some(doc) = self.read_doc(slot)? else {
                continue;
            };
            if criteria.matches(&doc) {
                out.push(match projection {
                    Some(fields) => criteria::project(&doc, fields),
                    None => doc,
                });
            }
        }
        Ok(out)
    }

    fn ensure_index(&self, field: &str) -> Result<bool, BuildError> {
        let mut guard = self.indexes.write().map_err(|_| self.poisoned())?;
        if guard.iter().any(|existing| existing == field) {
            return Ok(false);
        }
        guard.push(field.to_string());
        let payload = encode_indexes(&PersistedIndexes {
            fields: guard.clone(),
        });
        write_bytes(&self.store, INDEXES_KEY, &payload)?;
        Ok(true)
    }

    fn update(&self, docs: Vec<Document>, key_fields: &[&str]) -> Result<usize, BuildError> {
        let keyed = docs
            .into_iter()
            .map(|doc| {
                composite_key(&self.name, &doc, key_fields, SLOT_SEPARATOR).map(|key| (key, doc))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let mut slots = self.slots.write().map_err(|_| self.poisoned())?;
        let written = keyed.len();
        let mut grew = false;
        for (slot, doc) in keyed {
            self.write_doc(&slot, &doc)?;
            if !slots.contains(&slot) {
                slots.push(slot);
                grew = true;
            }
        }
        if grew {
            self.persist_slots(&slots)?;
        }
        Ok(written)
    }

    fn remove_docs(&self, criteria: &Criteria) -> Result<usize, BuildError> {
        let mut slots = self.slots.write().map_err(|_| self.poisoned())?;
        let mut kept = Vec::with_capacity(slots.len());
        let mut removed = 0usize;
        for slot in slots.iter() {
            match self.read_doc(slot)? {
                Some(doc) if criteria.matches(&doc) => {
                    write_bytes(&self.store, &doc_key(slot), &[DOC_TOMBSTONE])?;
                    removed += 1;
                }
                Some(_) => kept.push(slot.clone()),
                None => {}
            }
        }
        if removed > 0 {
            self.persist_slots(&kept)?;
            *slots = kept;
        }
        Ok(removed)
    }
}

fn doc_key(slot: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(DOC_PREFIX.len() + slot.len());
    key.extend_from_slice(DOC_PREFIX);
    key.extend_from_slice(slot.as_bytes());
    key
}

fn encode_doc(doc: &Document) -> Result<Vec<u8>, BuildError> {
    let payload = serde_json::to_vec(doc)?;
    let mut buf = Vec::with_capacity(1 + payload.len());
    buf.push(DOC_RECORD_VERSION);
    buf.extend_from_slice(&payload);
    Ok(buf)
}

fn decode_doc(bytes: &[u8]) -> Result<Option<Document>, BuildError> {
    if bytes.is_empty() || bytes[0] == DOC_TOMBSTONE {
        return Ok(None);
    }
    if bytes[0] != DOC_RECORD_VERSION {
        return Err(BuildError::Store(
            "document record version mismatch".into(),
        ));
    }
    serde_json::from_slice(&bytes[1..])
        .map(Some)
        .map_err(|err| BuildError::Store(format!("corrupt document record: {err}")))
}

fn encode_store_meta(meta: &StoreMeta) -> Vec<u8> {
    encode_bitcode_payload(&bitcode::encode(meta))
}

fn decode_store_meta(bytes: &[u8]) -> Result<StoreMeta, BuildError> {
    let raw = decode_bitcode_payload(bytes)?;
    bitcode::decode(&raw).map_err(|err| {
        BuildError::Store(format!("failed to decode file store metadata: {err}"))
    })
}

fn encode_slots(slots: &PersistedSlots) -> Vec<u8> {
    encode_bitcode_payload(&bitcode::encode(slots))
}

fn decode_slots(bytes: &[u8]) -> Result<PersistedSlots, BuildError> {
    let raw = decode_bitcode_payload(bytes)?;
    bitcode::decode(&raw)
        .map_err(|err| BuildError::Store(format!("corrupt slot list record: {err}")))
}

fn encode_indexes(indexes: &PersistedIndexes) -> Vec<u8> {
    encode_bitcode_payload(&bitcode::encode(indexes))
}

fn decode_indexes(bytes: &[u8]) -> Result<PersistedIndexes, BuildError> {
    let raw = decode_bitcode_payload(bytes)?;
    bitcode::decode(&raw)
        .map_err(|err| BuildError::Store(format!("corrupt index list record: {err}")))
}

fn encode_bitcode_payload(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(1 + bytes.len());
    out.push(BITCODE_PREFIX);
    out.extend_from_slice(bytes);
    out
}

fn decode_bitcode_payload(bytes: &[u8]) -> Result<Vec<u8>, BuildError> {
    if bytes.first().copied() != Some(BITCODE_PREFIX) {
        return Err(BuildError::Store(
            "bitcode payload missing expected prefix".into(),
        ));
    }
    Ok(bytes[1..].to_vec())
}

fn read_bytes(store: &DataStore, key: &[u8]) -> Result<Option<Vec<u8>>, BuildError> {
    store
        .read(key)
        .map_err(map_store_err)?
        .map(|entry| Ok(entry.as_ref().to_vec()))
        .transpose()
}

fn write_bytes(store: &DataStore, key: &[u8], payload: &[u8]) -> Result<(), BuildError> {
    store.write(key, payload).map_err(map_store_err)?;
    Ok(())
}

fn coerce_store_path(path: PathBuf, name: &str) -> PathBuf {
    if path.is_dir() {
        return FileStore::default_path_in_dir(path, name);
    }
    path
}

fn ensure_parent_dir(path: &Path) -> Result<(), BuildError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

fn map_store_err(err: io::Error) -> BuildError {
    BuildError::Store(err.to_string())
}
