#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

/// Command-line runners shared by the demo binaries.
pub mod apps;
/// Incremental builder: discovery, chunking, transform, and load.
pub mod builder;
/// Builder configuration and level-of-theory tunables.
pub mod config;
/// Centralized field names, index lists, and storage constants.
pub mod constants;
/// Molecule and task document schemas.
pub mod data;
/// Level-of-theory parsing and scoring.
pub mod lot;
/// Run summaries.
pub mod metrics;
/// Derived property documents and property kinds.
pub mod properties;
/// Best-candidate selection per sub-category.
pub mod selection;
/// Document stores and query criteria.
pub mod store;
/// Shared type aliases.
pub mod types;
/// Chemical formula helpers.
pub mod utils;

mod errors;

pub use builder::{
    IncrementalBuilder, StoreTaskLookup, TaskLookup, WorkGroup, WorkItems, chunk_pending,
};
pub use config::{BuildSettings, BuilderConfig};
pub use data::{MoleculeDoc, MoleculeEntry, TaskDocument, TaskRef};
pub use errors::BuildError;
pub use lot::{LevelOfTheory, evaluate_lot, theory_score};
pub use metrics::RunSummary;
pub use properties::{
    DerivedDocument, OrbitalDoc, OrbitalKind, PropertyKind, PropertyMeta, VibrationDoc,
    VibrationKind,
};
pub use selection::{RankingKey, rank_by_subcategory, select_best};
pub use store::{Condition, Criteria, Document, FileStore, MemoryStore, Store};
pub use types::{
    FieldName, GroupKey, LevelOfTheoryText, LogMessage, MoleculeId, PropertyId, SolventTag,
};
