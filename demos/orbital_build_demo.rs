use std::error::Error;
use std::sync::Arc;

use propforge::{
    BuilderConfig, Criteria, Document, IncrementalBuilder, MemoryStore, OrbitalKind, Store,
};
use serde_json::{Value, json};

fn document(value: Value) -> Document {
    match value {
        Value::Object(map) => map,
        _ => Document::new(),
    }
}

fn entry(task_id: i64, solvent: &str, lot: &str, energy: f64) -> Value {
    json!({
        "task_id": task_id,
        "charge": 0,
        "spin_multiplicity": 1,
        "level_of_theory": lot,
        "solvent": solvent,
        "energy": energy,
        "output": { "nbo": { "summary": true } },
        "orig": { "rem": { "run_nbo6": true } }
    })
}

fn task(task_id: i64, formula: &str, solvent: &str, lot: &str, energy: f64) -> Document {
    document(json!({
        "task_id": task_id,
        "formula_alphabetical": formula,
        "charge": 0,
        "spin_multiplicity": 1,
        "level_of_theory": lot,
        "solvent": solvent,
        "output": {
            "final_energy": energy,
            "nbo": {
                "natural_populations": [
                    { "atom_index": 0, "atom": "O", "core_electrons": 2.0,
                      "valence_electrons": 6.9, "rydberg_electrons": 0.01,
                      "total_electrons": 8.91 }
                ],
                "interactions": [
                    { "donor_index": 1, "acceptor_index": 2, "perturbation_energy": 3.5 }
                ]
            }
        },
        "orig": { "rem": { "run_nbo6": true } }
    }))
}

fn main() -> Result<(), Box<dyn Error>> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();

    let tz = "wB97X-V/def2-TZVPPD/VACUUM";
    let smd = "wB97X-V/def2-TZVPPD/SMD(SOLVENT=WATER)";
    let svp = "B3LYP/def2-SVPD/VACUUM";

    let tasks = Arc::new(MemoryStore::with_documents(
        "tasks",
        "task_id",
        vec![
            task(1, "H2 O1", "NONE", tz, -76.41),
            task(2, "H2 O1", "NONE", svp, -76.50),
            task(3, "H2 O1", "SOLVENT=WATER", smd, -76.43),
            task(4, "C1 O2", "NONE", tz, -188.60),
        ],
    ));
    let molecules = Arc::new(MemoryStore::with_documents(
        "molecules",
        "molecule_id",
        vec![
            document(json!({
                "molecule_id": "water-0-1",
                "formula_alphabetical": "H2 O1",
                "charge": 0,
                "spin_multiplicity": 1,
                "deprecated": false,
                "entries": [
                    entry(1, "NONE", tz, -76.41),
                    entry(2, "NONE", svp, -76.50),
                    entry(3, "SOLVENT=WATER", smd, -76.43)
                ]
            })),
            document(json!({
                "molecule_id": "co2-0-1",
                "formula_alphabetical": "C1 O2",
                "charge": 0,
                "spin_multiplicity": 1,
                "deprecated": false,
                "entries": [entry(4, "NONE", tz, -188.60)]
            })),
        ],
    ));
    let target = Arc::new(MemoryStore::new("orbitals", "property_id"));

    let builder = IncrementalBuilder::new(
        OrbitalKind,
        tasks,
        molecules,
        target.clone(),
        BuilderConfig::default(),
    )?;

    println!("=== chunk filters (2 workers) ===");
    for chunk in builder.prechunk(2)? {
        println!("{}", chunk.to_json());
    }

    let first = builder.run()?;
    println!(
        "first run : pending={} written={}",
        first.pending_groups, first.documents_written
    );
    for doc in target.query(&Criteria::new(), Some(&["property_id", "task_id", "lot_solvent"]))? {
        println!("  {}", Value::Object(doc));
    }

    let second = builder.run()?;
    println!(
        "second run: pending={} written={}",
        second.pending_groups, second.documents_written
    );
    Ok(())
}
