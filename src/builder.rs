//! Incremental property builder.
//!
//! One run has three phases:
//! - discovery: pending formulas are those with at least one non-deprecated
//!   molecule whose id is not yet present in the target store;
//! - transform: per molecule, ground-state entries accepted by the property
//!   kind are ranked per solvent, and the best entry whose task resolves is
//!   turned into a derived document;
//! - load: documents are stamped with the run timestamp, previous documents
//!   of the touched molecules are removed, and the batch is upserted by
//!   `(molecule_id, solvent)`.
//!
//! Chunks produced by `prechunk` cover disjoint formulas, so they can be run
//! concurrently. Two runs over the same formula must not overlap; the
//! remove-then-upsert load is only safe with a single writer per molecule.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use rayon::prelude::*;
use serde_json::Value;
use std::collections::{BTreeSet, HashSet};
use std::sync::{Arc, RwLock};
use tracing::{debug, info, warn};

use crate::config::BuilderConfig;
use crate::constants::builder::{MOLECULE_INDEXES, TARGET_KEY_FIELDS, TASK_INDEXES};
use crate::constants::fields;
use crate::data::{MoleculeDoc, MoleculeEntry, TaskDocument, TaskRef};
use crate::errors::BuildError;
use crate::metrics::RunSummary;
use crate::properties::{DerivedDocument, PropertyKind};
use crate::selection::{RankingKey, rank_by_subcategory};
use crate::store::{Criteria, Document, Store};
use crate::types::{GroupKey, SolventTag};

/// Resolves a molecule entry's task id to the full task record.
pub trait TaskLookup {
    /// Return the task for `task_id` within `formula`, or `None` on a miss.
    fn find_task(
        &self,
        task_id: &TaskRef,
        formula: &str,
    ) -> Result<Option<TaskDocument>, BuildError>;
}

impl<F> TaskLookup for F
where
    F: Fn(&TaskRef, &str) -> Result<Option<TaskDocument>, BuildError>,
{
    fn find_task(
        &self,
        task_id: &TaskRef,
        formula: &str,
    ) -> Result<Option<TaskDocument>, BuildError> {
        self(task_id, formula)
    }
}

/// `TaskLookup` over a task store.
///
/// Tries the id in its stored encoding first, then the alternate encoding
/// (integer ids stored as text and the reverse). Only tasks that kept their
/// raw input (`orig`) qualify.
pub struct StoreTaskLookup<'a> {
    tasks: &'a dyn Store,
}

impl<'a> StoreTaskLookup<'a> {
    /// Look tasks up in `tasks`.
    pub fn new(tasks: &'a dyn Store) -> Self {
        Self { tasks }
    }
}

impl TaskLookup for StoreTaskLookup<'_> {
    fn find_task(
        &self,
        task_id: &TaskRef,
        formula: &str,
    ) -> Result<Option<TaskDocument>, BuildError> {
        let attempts = std::iter::once(task_id.clone()).chain(task_id.alternate());
        for candidate in attempts {
            let criteria = Criteria::new()
                .eq(fields::TASK_ID, candidate.to_value())
                .eq(fields::FORMULA_ALPHABETICAL, formula)
                .exists(fields::ORIG, true);
            if let Some(doc) = self.tasks.query_one(&criteria)? {
                return TaskDocument::from_document(&doc).map(Some);
            }
        }
        Ok(None)
    }
}

/// All molecule documents sharing one pending formula.
#[derive(Clone, Debug, PartialEq)]
pub struct WorkGroup {
    /// Group key shared by every molecule in the group.
    pub formula: GroupKey,
    /// Raw molecule documents.
    pub molecules: Vec<Document>,
}

/// Finite, lazily-fetched sequence of pending work groups.
///
/// Molecule documents are queried when a group is reached. `restart` rewinds
/// to the first group without recomputing the pending set; calling
/// `IncrementalBuilder::get_items` again recomputes it.
pub struct WorkItems<'a, K: PropertyKind> {
    builder: &'a IncrementalBuilder<K>,
    formulas: Vec<GroupKey>,
    next: usize,
}

impl<K: PropertyKind> WorkItems<'_, K> {
    /// Pending formulas in processing order.
    pub fn formulas(&self) -> &[GroupKey] {
        &self.formulas
    }

    /// Formula of the most recently yielded group.
    pub fn last_formula(&self) -> Option<&GroupKey> {
        self.next.checked_sub(1).and_then(|idx| self.formulas.get(idx))
    }

    /// Rewind to the first pending group.
    pub fn restart(&mut self) {
        self.next = 0;
    }
}

impl<K: PropertyKind> Iterator for WorkItems<'_, K> {
    type Item = Result<WorkGroup, BuildError>;

    fn next(&mut self) -> Option<Self::Item> {
        let formula = self.formulas.get(self.next)?.clone();
        self.next += 1;
        Some(self.builder.fetch_group(formula))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.formulas.len().saturating_sub(self.next);
        (remaining, Some(remaining))
    }
}

impl<K: PropertyKind> ExactSizeIterator for WorkItems<'_, K> {}

/// Split `pending` into at most `number_splits` disjoint batches covering it.
///
/// Batches hold `ceil(|pending| / number_splits)` formulas (the last may be
/// shorter). An empty pending set yields no batches.
pub fn chunk_pending(
    pending: &BTreeSet<GroupKey>,
    number_splits: usize,
) -> Result<Vec<Vec<GroupKey>>, BuildError> {
    if number_splits == 0 {
        return Err(BuildError::Configuration(
            "number of splits must be greater than zero".to_string(),
        ));
    }
    if pending.is_empty() {
        return Ok(Vec::new());
    }
    let size = pending.len().div_ceil(number_splits);
    let ordered: Vec<GroupKey> = pending.iter().cloned().collect();
    Ok(ordered.chunks(size).map(<[GroupKey]>::to_vec).collect())
}

/// Incremental builder for one derived property kind.
pub struct IncrementalBuilder<K: PropertyKind> {
    kind: K,
    tasks: Arc<dyn Store>,
    molecules: Arc<dyn Store>,
    target: Arc<dyn Store>,
    config: BuilderConfig,
    pinned_timestamp: Option<DateTime<Utc>>,
    build_timestamp: RwLock<Option<DateTime<Utc>>>,
}

impl<K: PropertyKind> IncrementalBuilder<K> {
    /// Create a builder reading `tasks` and `molecules` and writing `target`.
    pub fn new(
        kind: K,
        tasks: Arc<dyn Store>,
        molecules: Arc<dyn Store>,
        target: Arc<dyn Store>,
        config: BuilderConfig,
    ) -> Result<Self, BuildError> {
        config.validate()?;
        Ok(Self {
            kind,
            tasks,
            molecules,
            target,
            config,
            pinned_timestamp: None,
            build_timestamp: RwLock::new(None),
        })
    }

    /// Property kind driven by this builder.
    pub fn kind(&self) -> &K {
        &self.kind
    }

    /// Active configuration.
    pub fn config(&self) -> &BuilderConfig {
        &self.config
    }

    /// Timestamp of the current run, once discovery has started one.
    pub fn build_timestamp(&self) -> Option<DateTime<Utc>> {
        self.build_timestamp.read().ok().and_then(|guard| *guard)
    }

    /// Request the indexes the builder queries on.
    pub fn ensure_indexes(&self) -> Result<(), BuildError> {
        for field in TASK_INDEXES {
            self.tasks.ensure_index(field)?;
        }
        for field in MOLECULE_INDEXES {
            self.molecules.ensure_index(field)?;
        }
        for field in self.kind.target_indexes() {
            self.target.ensure_index(field)?;
        }
        Ok(())
    }

    /// Formulas with at least one molecule not yet present in the target store.
    pub fn discover(&self) -> Result<BTreeSet<GroupKey>, BuildError> {
        let name = self.kind.property_name();
        let molecule_key = self.molecules.key().to_string();
        info!("[propforge:{name}] finding documents to process");
        let all_mols = self.molecules.query(
            &self.config.base_query(),
            Some(&[molecule_key.as_str(), fields::FORMULA_ALPHABETICAL]),
        )?;
        let done: HashSet<String> = self
            .target
            .distinct(fields::MOLECULE_ID, &Criteria::new())?
            .iter()
            .map(value_key)
            .collect();

        let mut pending_molecules = 0usize;
        let mut pending = BTreeSet::new();
        for mol in &all_mols {
            let Some(id) = mol.get(&molecule_key) else {
                continue;
            };
            if done.contains(&value_key(id)) {
                continue;
            }
            pending_molecules += 1;
            if let Some(formula) = mol.get(fields::FORMULA_ALPHABETICAL) {
                pending.insert(value_key(formula));
            }
        }
        info!("[propforge:{name}] found {pending_molecules} unprocessed documents");
        info!(
            "[propforge:{name}] found {} unprocessed formulas",
            pending.len()
        );
        Ok(pending)
    }

    /// Independent criteria filters for distributed execution.
    ///
    /// Each filter restricts one worker to a disjoint batch of pending formulas.
    pub fn prechunk(&self, number_splits: usize) -> Result<Vec<Criteria>, BuildError> {
        let pending = self.discover()?;
        let chunks = chunk_pending(&pending, number_splits)?;
        Ok(chunks
            .into_iter()
            .map(|chunk| Criteria::new().is_in(fields::FORMULA_ALPHABETICAL, chunk))
            .collect())
    }

    /// Start a run: ensure indexes, capture the run timestamp, and discover pending groups.
    pub fn get_items(&self) -> Result<WorkItems<'_, K>, BuildError> {
        let name = self.kind.property_name();
        info!("[propforge:{name}] builder started");
        self.ensure_indexes()?;
        let stamp = self.start_run()?;
        debug!("[propforge:{name}] build timestamp {}", stamp.to_rfc3339());
        let formulas: Vec<GroupKey> = self.discover()?.into_iter().collect();
        Ok(WorkItems {
            builder: self,
            formulas,
            next: 0,
        })
    }

    /// Validate a group's molecule documents and build its derived documents.
    ///
    /// A validation failure fails the whole group.
    pub fn process_item(&self, molecules: &[Document]) -> Result<Vec<Document>, BuildError> {
        let mols = molecules
            .iter()
            .map(MoleculeDoc::from_document)
            .collect::<Result<Vec<_>, _>>()?;
        let lookup = StoreTaskLookup::new(self.tasks.as_ref());
        self.transform(&mols, &lookup)?
            .iter()
            .map(DerivedDocument::to_document)
            .collect()
    }

    /// Build derived documents for validated molecules using `lookup` for task records.
    pub fn transform(
        &self,
        molecules: &[MoleculeDoc],
        lookup: &dyn TaskLookup,
    ) -> Result<Vec<K::Doc>, BuildError> {
        let name = self.kind.property_name();
        let Some(first) = molecules.first() else {
            return Ok(Vec::new());
        };
        let formula = &first.formula_alphabetical;
        let ids: Vec<&str> = molecules.iter().map(|m| m.molecule_id.as_str()).collect();
        info!("[propforge:{name}] processing {formula} : {ids:?}");

        let mut docs = Vec::new();
        for mol in molecules {
            let ranked = rank_by_subcategory(
                mol.ground_state_entries(),
                |entry: &&MoleculeEntry| self.kind.accepts(entry),
                |entry: &&MoleculeEntry| entry.solvent.clone(),
                |entry: &&MoleculeEntry| RankingKey::for_entry(entry, &self.config.settings),
            );
            for (solvent, candidates) in ranked {
                match self.build_best(mol, &solvent, candidates, lookup)? {
                    Some(doc) => docs.push(doc),
                    None => debug!(
                        "[propforge:{name}] no {name} document for {} in {solvent}",
                        mol.molecule_id
                    ),
                }
            }
        }
        debug!(
            "[propforge:{name}] produced {} documents for {formula}",
            docs.len()
        );
        Ok(docs)
    }

    /// Walk ranked candidates until one resolves to a task that yields a document.
    fn build_best(
        &self,
        mol: &MoleculeDoc,
        solvent: &SolventTag,
        candidates: Vec<&MoleculeEntry>,
        lookup: &dyn TaskLookup,
    ) -> Result<Option<K::Doc>, BuildError> {
        let name = self.kind.property_name();
        for entry in candidates {
            let Some(task) = lookup.find_task(&entry.task_id, &mol.formula_alphabetical)? else {
                debug!(
                    "[propforge:{name}] task {} for {} not found; trying next candidate",
                    entry.task_id, mol.molecule_id
                );
                continue;
            };
            if &task.solvent != solvent {
                warn!(
                    "[propforge:{name}] task {} solvent '{}' disagrees with entry solvent \
                     '{solvent}'; skipping",
                    entry.task_id, task.solvent
                );
                continue;
            }
            if let Some(doc) = self.kind.build(&task, &mol.molecule_id)? {
                return Ok(Some(doc));
            }
        }
        Ok(None)
    }

    /// Stamp, replace, and upsert a batch of processed groups into the target store.
    ///
    /// Returns the number of documents written.
    pub fn update_targets(&self, items: Vec<Vec<Document>>) -> Result<usize, BuildError> {
        let name = self.kind.property_name();
        let mut docs: Vec<Document> = items.into_iter().flatten().collect();
        if docs.is_empty() {
            info!("[propforge:{name}] no items to update");
            return Ok(0);
        }

        let stamp = match self.build_timestamp() {
            Some(stamp) => stamp,
            None => self.start_run()?,
        };
        let stamp = serde_json::to_value(stamp)?;
        let mut molecule_ids: IndexMap<String, Value> = IndexMap::new();
        for doc in &mut docs {
            for field in TARGET_KEY_FIELDS {
                if !doc.contains_key(field) {
                    return Err(BuildError::Store(format!(
                        "derived document missing key field '{field}'"
                    )));
                }
            }
            if let Some(id) = doc.get(fields::MOLECULE_ID) {
                molecule_ids
                    .entry(value_key(id))
                    .or_insert_with(|| id.clone());
            }
            doc.insert(fields::BUILD_TIMESTAMP.to_string(), stamp.clone());
        }

        info!("[propforge:{name}] updating {} {name} documents", docs.len());
        let removed = self.target.remove_docs(
            &Criteria::new().is_in(fields::MOLECULE_ID, molecule_ids.into_values()),
        )?;
        debug!("[propforge:{name}] removed {removed} superseded documents");
        self.target.update(docs, &TARGET_KEY_FIELDS)
    }

    /// One full run: discover, transform each group, and commit in batches.
    ///
    /// A failing group is logged and recorded; the run continues with the next one.
    pub fn run(&self) -> Result<RunSummary, BuildError> {
        let name = self.kind.property_name();
        let mut items = self.get_items()?;
        let mut summary = RunSummary {
            build_timestamp: self.build_timestamp(),
            pending_groups: items.len(),
            ..RunSummary::default()
        };
        let mut batch: Vec<(GroupKey, Vec<Document>)> = Vec::new();

        while let Some(item) = items.next() {
            let formula = items.last_formula().cloned().unwrap_or_default();
            let processed = item.and_then(|group| self.process_item(&group.molecules));
            match processed {
                Ok(docs) => {
                    let solvents: Vec<SolventTag> = docs
                        .iter()
                        .filter_map(|doc| doc.get(fields::SOLVENT))
                        .map(value_key)
                        .collect();
                    summary.record_group(solvents.iter());
                    batch.push((formula, docs));
                }
                Err(err) => {
                    warn!("[propforge:{name}] group '{formula}' failed: {err}");
                    summary.record_failure(formula, err.to_string());
                }
            }
            if batch.len() >= self.config.commit_batch_size {
                self.commit(std::mem::take(&mut batch), &mut summary);
            }
        }
        self.commit(batch, &mut summary);

        info!(
            "[propforge:{name}] run finished: pending={} processed={} failed={} written={}",
            summary.pending_groups,
            summary.processed_groups,
            summary.failed_groups.len(),
            summary.documents_written
        );
        Ok(summary)
    }

    /// Commit one batch; a failed commit is recorded against every group in it.
    fn commit(&self, batch: Vec<(GroupKey, Vec<Document>)>, summary: &mut RunSummary) {
        let name = self.kind.property_name();
        let (formulas, docs): (Vec<GroupKey>, Vec<Vec<Document>>) = batch.into_iter().unzip();
        match self.update_targets(docs) {
            Ok(written) => summary.documents_written += written,
            Err(err) => {
                warn!(
                    "[propforge:{name}] commit of {} groups failed: {err}",
                    formulas.len()
                );
                for formula in formulas {
                    summary.record_failure(formula, format!("commit failed: {err}"));
                }
            }
        }
    }

    fn fetch_group(&self, formula: GroupKey) -> Result<WorkGroup, BuildError> {
        let criteria = self
            .config
            .base_query()
            .eq(fields::FORMULA_ALPHABETICAL, formula.clone());
        let molecules = self.molecules.query(&criteria, None)?;
        Ok(WorkGroup { formula, molecules })
    }

    fn start_run(&self) -> Result<DateTime<Utc>, BuildError> {
        let stamp = self.pinned_timestamp.unwrap_or_else(Utc::now);
        let mut guard = self
            .build_timestamp
            .write()
            .map_err(|_| BuildError::Store("build timestamp lock poisoned".into()))?;
        *guard = Some(stamp);
        Ok(stamp)
    }
}

impl<K: PropertyKind + Clone> IncrementalBuilder<K> {
    /// A builder restricted to one prechunk filter, sharing stores and run timestamp.
    pub fn for_chunk(&self, chunk: &Criteria) -> Self {
        Self {
            kind: self.kind.clone(),
            tasks: Arc::clone(&self.tasks),
            molecules: Arc::clone(&self.molecules),
            target: Arc::clone(&self.target),
            config: self.config.narrowed(chunk),
            pinned_timestamp: self.build_timestamp().or(self.pinned_timestamp),
            build_timestamp: RwLock::new(None),
        }
    }

    /// Prechunk into `number_splits` disjoint filters and run them in parallel.
    ///
    /// Chunks share one build timestamp. A chunk whose run fails is recorded
    /// as a failed group labelled with its filter; the other chunks still commit.
    pub fn run_partitioned(&self, number_splits: usize) -> Result<RunSummary, BuildError> {
        let name = self.kind.property_name();
        self.ensure_indexes()?;
        let chunks = self.prechunk(number_splits)?;
        let stamp = self.start_run()?;
        info!(
            "[propforge:{name}] running {} chunks in parallel",
            chunks.len()
        );

        let results: Vec<(Criteria, Result<RunSummary, BuildError>)> = chunks
            .into_par_iter()
            .map(|chunk| {
                let outcome = self.for_chunk(&chunk).run();
                (chunk, outcome)
            })
            .collect();

        let mut summary = RunSummary {
            build_timestamp: Some(stamp),
            ..RunSummary::default()
        };
        for (chunk, outcome) in results {
            match outcome {
                Ok(chunk_summary) => summary.merge(chunk_summary),
                Err(err) => {
                    let label = chunk.to_json().to_string();
                    warn!("[propforge:{name}] chunk {label} failed: {err}");
                    summary.record_failure(label, err.to_string());
                }
            }
        }
        Ok(summary)
    }
}

/// Comparable string form of a stored value (strings unquoted).
fn value_key(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
