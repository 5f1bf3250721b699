use serde::{Deserialize, Serialize};

use crate::data::{Bond, Interaction, LonePair, MoleculeEntry, NaturalPopulation, TaskDocument};
use crate::errors::BuildError;
use crate::properties::{DerivedDocument, PropertyKind, PropertyMeta};

/// `$rem` flags marking a task that ran the NBO7 analysis.
const NBO_FLAGS: [&str; 2] = ["run_nbo6", "nbo_external"];

/// Natural bond orbital summary for one molecule in one solvent environment.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrbitalDoc {
    /// Shared property fields.
    #[serde(flatten)]
    pub meta: PropertyMeta,
    /// Whether the molecule has unpaired electrons.
    pub open_shell: bool,
    /// Natural populations per atom.
    pub nbo_population: Vec<NaturalPopulation>,
    /// Lone pair orbitals.
    pub nbo_lone_pairs: Vec<LonePair>,
    /// Bonding orbitals.
    pub nbo_bonds: Vec<Bond>,
    /// Donor/acceptor interactions.
    pub nbo_interactions: Vec<Interaction>,
}

impl OrbitalDoc {
    /// Build from a task carrying NBO output; `None` when it has none.
    pub fn from_task(task: &TaskDocument, molecule_id: &str) -> Option<Self> {
        let nbo = task.output.nbo.as_ref()?;
        if nbo.natural_populations.is_empty() {
            return None;
        }
        Some(Self {
            meta: PropertyMeta::from_task(task, molecule_id, OrbitalKind::NAME),
            open_shell: task.spin_multiplicity != 1,
            nbo_population: nbo.natural_populations.clone(),
            nbo_lone_pairs: nbo.lone_pairs.clone(),
            nbo_bonds: nbo.bonds.clone(),
            nbo_interactions: nbo.interactions.clone(),
        })
    }

    /// Strongest donor/acceptor interaction, if any were recorded.
    pub fn strongest_interaction(&self) -> Option<&Interaction> {
        self.nbo_interactions
            .iter()
            .max_by(|a, b| a.perturbation_energy.total_cmp(&b.perturbation_energy))
    }
}

impl DerivedDocument for OrbitalDoc {
    fn meta(&self) -> &PropertyMeta {
        &self.meta
    }
}

/// Orbital property kind: candidates need NBO output from an NBO7 run.
#[derive(Clone, Copy, Debug, Default)]
pub struct OrbitalKind;

impl OrbitalKind {
    /// Short name used in ids and logs.
    pub const NAME: &'static str = "orbitals";
}

impl PropertyKind for OrbitalKind {
    type Doc = OrbitalDoc;

    fn property_name(&self) -> &'static str {
        Self::NAME
    }

    fn accepts(&self, entry: &MoleculeEntry) -> bool {
        let has_nbo = entry
            .output
            .nbo
            .as_ref()
            .is_some_and(|nbo| !nbo.is_null());
        has_nbo && NBO_FLAGS.iter().any(|flag| entry.orig.rem_flag(flag))
    }

    fn build(
        &self,
        task: &TaskDocument,
        molecule_id: &str,
    ) -> Result<Option<OrbitalDoc>, BuildError> {
        Ok(OrbitalDoc::from_task(task, molecule_id))
    }
}
