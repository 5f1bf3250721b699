//! Derived property documents and the per-property builder interface.
//!
//! Each property kind (orbitals, vibrations) supplies:
//! - the derived document type, built deterministically from one task,
//! - the capability filter deciding which molecule entries are candidates.
//!
//! The incremental builder is generic over `PropertyKind` and never inspects
//! property payloads itself.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::builder::PROPERTY_INDEXES;
use crate::data::{MoleculeEntry, TaskDocument, TaskRef, to_document};
use crate::errors::BuildError;
use crate::store::Document;
use crate::types::{GroupKey, LevelOfTheoryText, MoleculeId, PropertyId, SolventTag};

/// Natural bond orbital summaries.
pub mod orbitals;
/// Vibrational analysis summaries.
pub mod vibrations;

pub use orbitals::{OrbitalDoc, OrbitalKind};
pub use vibrations::{VibrationDoc, VibrationKind};

/// Fields shared by every derived property document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PropertyMeta {
    /// `<molecule_id>-<property>-<solvent>`.
    pub property_id: PropertyId,
    /// Property kind name.
    pub property_name: String,
    /// Source molecule.
    pub molecule_id: MoleculeId,
    /// Task the document was built from.
    pub task_id: TaskRef,
    /// Formula copied from the chosen task.
    pub formula_alphabetical: GroupKey,
    /// Charge of the chosen task.
    pub charge: i32,
    /// Spin multiplicity of the chosen task.
    pub spin_multiplicity: u32,
    /// Level of theory of the chosen task.
    pub level_of_theory: LevelOfTheoryText,
    /// Solvent tag of the chosen task.
    pub solvent: SolventTag,
    /// Level of theory and solvent combined.
    pub lot_solvent: String,
    /// Always `false`; deprecated molecules are never built.
    pub deprecated: bool,
    /// Source task modification time.
    pub last_updated: Option<DateTime<Utc>>,
}

impl PropertyMeta {
    /// Metadata for `property_name` derived from `task` on behalf of `molecule_id`.
    pub fn from_task(task: &TaskDocument, molecule_id: &str, property_name: &str) -> Self {
        Self {
            property_id: property_id(molecule_id, property_name, &task.solvent),
            property_name: property_name.to_string(),
            molecule_id: molecule_id.to_string(),
            task_id: task.task_id.clone(),
            formula_alphabetical: task.formula_alphabetical.clone(),
            charge: task.charge,
            spin_multiplicity: task.spin_multiplicity,
            level_of_theory: task.level_of_theory.clone(),
            solvent: task.solvent.clone(),
            lot_solvent: format!("{}({})", task.level_of_theory, task.solvent),
            deprecated: false,
            last_updated: task.last_updated,
        }
    }
}

/// Deterministic property id: one per (molecule, property, solvent).
pub fn property_id(molecule_id: &str, property_name: &str, solvent: &str) -> PropertyId {
    format!("{molecule_id}-{property_name}-{solvent}")
}

/// A derived summary document written to a target store.
pub trait DerivedDocument: Serialize + Send {
    /// Shared metadata (ids, sub-category, provenance).
    fn meta(&self) -> &PropertyMeta;

    /// Serialize into a stored document.
    fn to_document(&self) -> Result<Document, BuildError> {
        to_document(self)
    }
}

/// Builder-facing description of one derived property kind.
pub trait PropertyKind: Send + Sync {
    /// Derived document produced by this kind.
    type Doc: DerivedDocument;

    /// Property name, used in ids and logs.
    fn property_name(&self) -> &'static str;

    /// Indexes requested on this kind's target store.
    fn target_indexes(&self) -> &'static [&'static str] {
        &PROPERTY_INDEXES
    }

    /// Capability filter: whether `entry` carries the sub-results this property needs.
    fn accepts(&self, entry: &MoleculeEntry) -> bool;

    /// Build the derived document from the winning task.
    ///
    /// `Ok(None)` means the task lacks the data after all; the builder then
    /// produces nothing for that sub-category.
    fn build(
        &self,
        task: &TaskDocument,
        molecule_id: &str,
    ) -> Result<Option<Self::Doc>, BuildError>;
}


#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn meta_is_a_deterministic_function_of_task_and_molecule() {
        let task = fixtures::task(json!(7), "SOLVENT=WATER");
        let meta = PropertyMeta::from_task(&task, "mol-1", "orbitals");
        assert_eq!(meta.property_id, "mol-1-orbitals-SOLVENT=WATER");
        assert_eq!(
            meta.lot_solvent,
            "wB97X-V/def2-TZVPPD/VACUUM(SOLVENT=WATER)"
        );
        assert_eq!(meta.task_id, TaskRef::Int(7));
        assert_eq!(meta, PropertyMeta::from_task(&task, "mol-1", "orbitals"));
    }
}
