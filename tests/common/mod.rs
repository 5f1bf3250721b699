#![allow(dead_code)]

use std::sync::Arc;

use propforge::{BuilderConfig, Document, IncrementalBuilder, MemoryStore, PropertyKind, Store};
use serde_json::{Value, json};

pub const VACUUM_LOT: &str = "wB97M-V/def2-TZVPPD/VACUUM";
pub const WATER_LOT: &str = "wB97X-V/def2-TZVPPD/SMD(SOLVENT=WATER)";
pub const WEAK_LOT: &str = "PBE/6-31g*/VACUUM";

pub fn document(value: Value) -> Document {
    value.as_object().cloned().unwrap()
}

/// Molecule entry carrying both NBO and frequency sub-results.
pub fn entry(task_id: i64, solvent: &str, lot: &str, energy: f64) -> Value {
    json!({
        "task_id": task_id,
        "charge": 0,
        "spin_multiplicity": 1,
        "level_of_theory": lot,
        "solvent": solvent,
        "energy": energy,
        "output": { "nbo": { "present": true }, "frequencies": [1600.0] },
        "orig": { "rem": { "run_nbo6": true } }
    })
}

/// Molecule entry with no sub-results at all.
pub fn bare_entry(task_id: i64, solvent: &str, lot: &str, energy: f64) -> Value {
    json!({
        "task_id": task_id,
        "charge": 0,
        "spin_multiplicity": 1,
        "level_of_theory": lot,
        "solvent": solvent,
        "energy": energy
    })
}

pub fn molecule(id: &str, formula: &str, entries: Vec<Value>) -> Document {
    document(json!({
        "molecule_id": id,
        "formula_alphabetical": formula,
        "charge": 0,
        "spin_multiplicity": 1,
        "deprecated": false,
        "entries": entries
    }))
}

pub fn task(task_id: i64, formula: &str, solvent: &str, lot: &str) -> Document {
    document(json!({
        "task_id": task_id,
        "formula_alphabetical": formula,
        "charge": 0,
        "spin_multiplicity": 1,
        "level_of_theory": lot,
        "solvent": solvent,
        "output": {
            "final_energy": -1.0,
            "nbo": {
                "natural_populations": [
                    { "atom_index": 0, "atom": "O", "core_electrons": 2.0,
                      "valence_electrons": 6.9, "rydberg_electrons": 0.01,
                      "total_electrons": 8.91 }
                ]
            },
            "frequencies": [1600.0],
            "frequency_modes": [[[0.0, 0.0, 0.1]]],
            "ir_intensities": [12.5],
            "ir_activities": [true]
        },
        "orig": { "rem": { "run_nbo6": true } }
    }))
}

pub struct Fixture {
    pub tasks: Arc<MemoryStore>,
    pub molecules: Arc<MemoryStore>,
    pub target: Arc<MemoryStore>,
}

impl Fixture {
    pub fn new(molecules: Vec<Document>, tasks: Vec<Document>) -> Self {
        Self {
            tasks: Arc::new(MemoryStore::with_documents("tasks", "task_id", tasks)),
            molecules: Arc::new(MemoryStore::with_documents(
                "molecules",
                "molecule_id",
                molecules,
            )),
            target: Arc::new(MemoryStore::new("target", "property_id")),
        }
    }

    pub fn builder<K: PropertyKind>(&self, kind: K) -> IncrementalBuilder<K> {
        self.builder_with(kind, BuilderConfig::default())
    }

    pub fn builder_with<K: PropertyKind>(
        &self,
        kind: K,
        config: BuilderConfig,
    ) -> IncrementalBuilder<K> {
        IncrementalBuilder::new(
            kind,
            self.tasks.clone(),
            self.molecules.clone(),
            self.target.clone(),
            config,
        )
        .unwrap()
    }
}

/// Target documents with the build stamp removed, for before/after comparisons.
pub fn unstamped(store: &dyn Store) -> Vec<Document> {
    store
        .query(&propforge::Criteria::new(), None)
        .unwrap()
        .into_iter()
        .map(|mut doc| {
            doc.remove("_bt");
            doc
        })
        .collect()
}
