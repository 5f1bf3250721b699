use std::collections::BTreeSet;

use propforge::{
    BuilderConfig, Criteria, IncrementalBuilder, OrbitalKind, Store, VibrationKind, chunk_pending,
};
use serde_json::json;

mod common;
use common::*;

fn docs_for(store: &dyn Store, molecule_id: &str) -> Vec<propforge::Document> {
    store
        .query(&Criteria::new().eq("molecule_id", molecule_id), None)
        .unwrap()
}

#[test]
fn tied_candidates_resolve_to_first_entry_per_solvent() {
    let fixture = Fixture::new(
        vec![molecule(
            "m1",
            "H2 O1",
            vec![
                entry(1, "SOLVENT=WATER", WATER_LOT, -5.0),
                entry(2, "SOLVENT=WATER", WATER_LOT, -5.0),
                entry(3, "NONE", VACUUM_LOT, -3.0),
            ],
        )],
        vec![
            task(1, "H2 O1", "SOLVENT=WATER", WATER_LOT),
            task(2, "H2 O1", "SOLVENT=WATER", WATER_LOT),
            task(3, "H2 O1", "NONE", VACUUM_LOT),
        ],
    );
    let summary = fixture.builder(OrbitalKind).run().unwrap();
    assert_eq!(summary.documents_written, 2);

    let docs = docs_for(fixture.target.as_ref(), "m1");
    assert_eq!(docs.len(), 2);
    let water = docs
        .iter()
        .find(|doc| doc["solvent"] == "SOLVENT=WATER")
        .unwrap();
    let vacuum = docs.iter().find(|doc| doc["solvent"] == "NONE").unwrap();
    assert_eq!(water["task_id"], json!(1));
    assert_eq!(vacuum["task_id"], json!(3));
    assert_eq!(summary.per_solvent["SOLVENT=WATER"], 1);
}

#[test]
fn new_winner_replaces_prior_document_for_the_molecule() {
    let fixture = Fixture::new(
        vec![
            molecule("m1", "H2 O1", vec![entry(10, "NONE", WEAK_LOT, -1.0)]),
            molecule("m2", "H2 O1", vec![entry(20, "NONE", WEAK_LOT, -1.0)]),
        ],
        vec![
            task(10, "H2 O1", "NONE", WEAK_LOT),
            task(11, "H2 O1", "NONE", VACUUM_LOT),
            task(20, "H2 O1", "NONE", WEAK_LOT),
        ],
    );
    fixture
        .target
        .update(
            vec![
                document(json!({
                    "property_id": "m1-orbitals-NONE",
                    "molecule_id": "m1",
                    "solvent": "NONE",
                    "task_id": 10
                })),
                document(json!({
                    "property_id": "m1-orbitals-SOLVENT=THF",
                    "molecule_id": "m1",
                    "solvent": "SOLVENT=THF",
                    "task_id": 9
                })),
            ],
            &["molecule_id", "solvent"],
        )
        .unwrap();

    // m1 gained a better entry; m2 is new, so the shared formula is pending again.
    fixture
        .molecules
        .update(
            vec![molecule(
                "m1",
                "H2 O1",
                vec![
                    entry(10, "NONE", WEAK_LOT, -1.0),
                    entry(11, "NONE", VACUUM_LOT, -0.5),
                ],
            )],
            &["molecule_id"],
        )
        .unwrap();

    fixture.builder(OrbitalKind).run().unwrap();

    let m1 = docs_for(fixture.target.as_ref(), "m1");
    assert_eq!(m1.len(), 1);
    assert_eq!(m1[0]["task_id"], json!(11));
    assert_eq!(m1[0]["property_id"], json!("m1-orbitals-NONE"));
    assert!(
        fixture
            .target
            .query_one(&Criteria::new().eq("property_id", "m1-orbitals-SOLVENT=THF"))
            .unwrap()
            .is_none()
    );
    assert_eq!(docs_for(fixture.target.as_ref(), "m2").len(), 1);
}

#[test]
fn group_without_required_sub_result_stays_pending() {
    let fixture = Fixture::new(
        vec![molecule(
            "m1",
            "Li1 F1",
            vec![bare_entry(5, "NONE", VACUUM_LOT, -107.0)],
        )],
        vec![task(5, "F1 Li1", "NONE", VACUUM_LOT)],
    );
    let builder = fixture.builder(OrbitalKind);
    let summary = builder.run().unwrap();
    assert_eq!(summary.processed_groups, 1);
    assert_eq!(summary.empty_groups, 1);
    assert_eq!(summary.documents_written, 0);
    assert!(fixture.target.is_empty());
    assert_eq!(
        builder.discover().unwrap(),
        BTreeSet::from(["Li1 F1".to_string()])
    );

    let again = builder.run().unwrap();
    assert_eq!(again.pending_groups, 1);
}

#[test]
fn rerunning_over_unchanged_inputs_is_a_no_op() {
    let fixture = Fixture::new(
        vec![
            molecule("m1", "H2 O1", vec![entry(1, "NONE", VACUUM_LOT, -76.0)]),
            molecule(
                "m2",
                "C1 O2",
                vec![
                    entry(2, "NONE", VACUUM_LOT, -188.0),
                    entry(3, "SOLVENT=WATER", WATER_LOT, -188.1),
                ],
            ),
        ],
        vec![
            task(1, "H2 O1", "NONE", VACUUM_LOT),
            task(2, "C1 O2", "NONE", VACUUM_LOT),
            task(3, "C1 O2", "SOLVENT=WATER", WATER_LOT),
        ],
    );
    let builder = fixture.builder(VibrationKind);
    let first = builder.run().unwrap();
    assert_eq!(first.documents_written, 3);
    let before = unstamped(fixture.target.as_ref());

    let second = builder.run().unwrap();
    assert_eq!(second.pending_groups, 0);
    assert_eq!(second.documents_written, 0);
    assert_eq!(unstamped(fixture.target.as_ref()), before);

    // A fresh builder over the same stores also finds nothing to do.
    let third = fixture.builder(VibrationKind).run().unwrap();
    assert_eq!(third.pending_groups, 0);
    assert_eq!(unstamped(fixture.target.as_ref()), before);
}

#[test]
fn at_most_one_document_per_molecule_and_solvent() {
    let fixture = Fixture::new(
        vec![
            molecule(
                "m1",
                "H2 O1",
                vec![
                    entry(1, "NONE", WEAK_LOT, -1.0),
                    entry(2, "NONE", VACUUM_LOT, -1.0),
                    entry(3, "NONE", VACUUM_LOT, -2.0),
                    entry(4, "SOLVENT=WATER", WATER_LOT, -1.0),
                ],
            ),
            molecule(
                "m2",
                "H2 O1",
                vec![
                    entry(5, "NONE", VACUUM_LOT, -1.0),
                    entry(6, "NONE", VACUUM_LOT, -1.0),
                ],
            ),
        ],
        (1..=6)
            .map(|id| {
                let solvent = if id == 4 { "SOLVENT=WATER" } else { "NONE" };
                let lot = if id == 4 { WATER_LOT } else { VACUUM_LOT };
                task(id, "H2 O1", solvent, lot)
            })
            .collect(),
    );
    let builder = fixture.builder(OrbitalKind);
    builder.run().unwrap();
    builder
        .update_targets(vec![
            builder
                .process_item(&fixture.molecules.query(&Criteria::new(), None).unwrap())
                .unwrap(),
        ])
        .unwrap();

    let docs = fixture.target.query(&Criteria::new(), None).unwrap();
    let mut keys = BTreeSet::new();
    for doc in &docs {
        let key = (doc["molecule_id"].to_string(), doc["solvent"].to_string());
        assert!(keys.insert(key), "duplicate key in {doc:?}");
    }
    assert_eq!(docs.len(), 3);
    let m1_vacuum = docs
        .iter()
        .find(|doc| doc["molecule_id"] == "m1" && doc["solvent"] == "NONE")
        .unwrap();
    assert_eq!(m1_vacuum["task_id"], json!(3));
}

#[test]
fn pending_set_matches_molecules_missing_from_target() {
    let mut deprecated = molecule("m4", "Na1 Cl1", vec![entry(4, "NONE", VACUUM_LOT, -1.0)]);
    deprecated.insert("deprecated".to_string(), json!(true));
    let fixture = Fixture::new(
        vec![
            molecule("m1", "H2 O1", vec![entry(1, "NONE", VACUUM_LOT, -1.0)]),
            molecule("m2", "H2 O1", Vec::new()),
            molecule("m3", "C1 O2", vec![entry(3, "NONE", VACUUM_LOT, -1.0)]),
            deprecated,
        ],
        vec![
            task(1, "H2 O1", "NONE", VACUUM_LOT),
            task(3, "C1 O2", "NONE", VACUUM_LOT),
        ],
    );
    fixture
        .target
        .update(
            vec![
                document(json!({ "molecule_id": "m1", "solvent": "NONE" })),
                document(json!({ "molecule_id": "m3", "solvent": "NONE" })),
            ],
            &["molecule_id", "solvent"],
        )
        .unwrap();

    let builder = fixture.builder(OrbitalKind);
    let pending = builder.discover().unwrap();
    assert_eq!(pending, BTreeSet::from(["H2 O1".to_string()]));

    let items: Vec<_> = builder
        .get_items()
        .unwrap()
        .map(|item| item.unwrap())
        .collect();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].molecules.len(), 2);
}

#[test]
fn prechunk_filters_cover_pending_formulas_exactly_once() {
    let formulas: Vec<String> = (1..=11).map(|n| format!("C{n} H{}", 2 * n + 2)).collect();
    let molecules = formulas
        .iter()
        .enumerate()
        .map(|(idx, formula)| molecule(&format!("m{idx}"), formula, Vec::new()))
        .collect();
    let fixture = Fixture::new(molecules, Vec::new());
    let builder = fixture.builder(OrbitalKind);
    let pending = builder.discover().unwrap();
    assert_eq!(pending.len(), formulas.len());

    for splits in 1..=13 {
        let filters = builder.prechunk(splits).unwrap();
        assert!(filters.len() <= splits);
        let mut covered = BTreeSet::new();
        for filter in &filters {
            let items: Vec<_> = builder
                .for_chunk(filter)
                .get_items()
                .unwrap()
                .formulas()
                .to_vec();
            for formula in items {
                assert!(covered.insert(formula), "formula in two chunks ({splits} splits)");
            }
        }
        assert_eq!(covered, pending, "{splits} splits");
        assert_eq!(
            chunk_pending(&pending, splits).unwrap().len(),
            filters.len()
        );
    }
    assert!(builder.prechunk(0).is_err());
}

#[test]
fn partitioned_run_matches_sequential_run() {
    let molecules: Vec<_> = (0..6)
        .map(|idx| {
            molecule(
                &format!("m{idx}"),
                &format!("C{} O2", idx + 1),
                vec![entry(idx, "NONE", VACUUM_LOT, -1.0)],
            )
        })
        .collect();
    let tasks: Vec<_> = (0..6)
        .map(|idx| task(idx, &format!("C{} O2", idx + 1), "NONE", VACUUM_LOT))
        .collect();

    let sequential = Fixture::new(molecules.clone(), tasks.clone());
    sequential.builder(OrbitalKind).run().unwrap();

    let partitioned = Fixture::new(molecules, tasks);
    let builder = partitioned.builder(OrbitalKind);
    let summary = builder.run_partitioned(4).unwrap();
    assert_eq!(summary.pending_groups, 6);
    assert_eq!(summary.documents_written, 6);
    assert!(summary.is_clean());

    let stamps: BTreeSet<String> = partitioned
        .target
        .distinct("_bt", &Criteria::new())
        .unwrap()
        .iter()
        .map(|value| value.to_string())
        .collect();
    assert_eq!(stamps.len(), 1);

    let mut left = unstamped(sequential.target.as_ref());
    let mut right = unstamped(partitioned.target.as_ref());
    left.sort_by_key(|doc| doc["property_id"].to_string());
    right.sort_by_key(|doc| doc["property_id"].to_string());
    assert_eq!(left, right);
}

#[test]
fn configured_query_narrows_the_build() {
    let fixture = Fixture::new(
        vec![
            molecule("m1", "H2 O1", vec![entry(1, "NONE", VACUUM_LOT, -1.0)]),
            molecule("m2", "C1 O2", vec![entry(2, "NONE", VACUUM_LOT, -1.0)]),
        ],
        vec![
            task(1, "H2 O1", "NONE", VACUUM_LOT),
            task(2, "C1 O2", "NONE", VACUUM_LOT),
        ],
    );
    let config = BuilderConfig::from_json_str(
        r#"{ "query": { "formula_alphabetical": { "$in": ["C1 O2"] } }, "commit_batch_size": 1 }"#,
    )
    .unwrap();
    let builder: IncrementalBuilder<OrbitalKind> = fixture.builder_with(OrbitalKind, config);
    let summary = builder.run().unwrap();
    assert_eq!(summary.pending_groups, 1);
    assert_eq!(fixture.target.len(), 1);
    assert_eq!(docs_for(fixture.target.as_ref(), "m2").len(), 1);
}

#[test]
fn compact_formulas_build_when_both_stores_agree() {
    let fixture = Fixture::new(
        vec![molecule("m1", "H2O", vec![entry(1, "NONE", VACUUM_LOT, -76.0)])],
        vec![task(1, "H2O", "NONE", VACUUM_LOT)],
    );
    let builder = fixture.builder(OrbitalKind);
    let summary = builder.run().unwrap();
    assert_eq!(summary.documents_written, 1);
    assert_eq!(summary.empty_groups, 0);
    assert!(builder.discover().unwrap().is_empty());
    assert_eq!(docs_for(fixture.target.as_ref(), "m1").len(), 1);
}
