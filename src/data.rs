//! Source document schemas: molecule records and the task records they aggregate.
//!
//! Stored documents are untyped maps. The `from_document` constructors turn
//! them into typed records and fail with `BuildError::Validation` when a
//! required field is missing, mistyped, or semantically invalid.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::constants::fields;
use crate::errors::BuildError;
use crate::store::Document;
use crate::types::{GroupKey, LevelOfTheoryText, MoleculeId, SolventTag};
use crate::utils::formula_alphabetical;

/// Task identifier as stored: some stores keep integer ids, others their text form.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TaskRef {
    /// Integer-encoded task id.
    Int(i64),
    /// Text-encoded task id.
    Text(String),
}

impl TaskRef {
    /// The id as a JSON value in its stored encoding.
    pub fn to_value(&self) -> Value {
        match self {
            Self::Int(value) => Value::from(*value),
            Self::Text(value) => Value::from(value.clone()),
        }
    }

    /// The same id in the other encoding, when one exists.
    ///
    /// Text ids that do not parse as integers have no alternate encoding.
    pub fn alternate(&self) -> Option<TaskRef> {
        match self {
            Self::Int(value) => Some(Self::Text(value.to_string())),
            Self::Text(value) => value.trim().parse::<i64>().ok().map(Self::Int),
        }
    }
}

impl fmt::Display for TaskRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(value) => write!(f, "{value}"),
            Self::Text(value) => f.write_str(value),
        }
    }
}

/// Calculation input as submitted; `rem` holds the Q-Chem `$rem` section.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CalcInput {
    /// Q-Chem `$rem` keywords.
    #[serde(default)]
    pub rem: Map<String, Value>,
}

impl CalcInput {
    /// Returns `true` when `$rem` sets `flag` to a truthy value.
    pub fn rem_flag(&self, flag: &str) -> bool {
        match self.rem.get(flag) {
            Some(Value::Bool(value)) => *value,
            Some(Value::Number(value)) => value.as_f64().is_some_and(|v| v != 0.0),
            Some(Value::String(value)) => {
                matches!(value.to_ascii_lowercase().as_str(), "true" | "1" | "yes")
            }
            _ => false,
        }
    }
}

/// Sub-results summarized on a molecule entry. Presence gates candidate eligibility.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EntryOutput {
    /// Raw NBO summary, if the calculation ran one.
    #[serde(default)]
    pub nbo: Option<Value>,
    /// Vibrational frequencies in cm^-1.
    #[serde(default)]
    pub frequencies: Option<Vec<f64>>,
}

/// One calculation variant aggregated into a molecule record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MoleculeEntry {
    /// Task that produced this entry.
    pub task_id: TaskRef,
    /// Net charge.
    pub charge: i32,
    /// Spin multiplicity (2S + 1).
    pub spin_multiplicity: u32,
    /// Functional/basis/solvation model.
    pub level_of_theory: LevelOfTheoryText,
    /// Solvent tag, `NONE` in vacuum.
    pub solvent: SolventTag,
    /// Final energy in Hartree.
    pub energy: f64,
    /// Summarized sub-results.
    #[serde(default)]
    pub output: EntryOutput,
    /// Submitted input.
    #[serde(default)]
    pub orig: CalcInput,
}

/// Aggregated molecule record: the unit grouped by formula.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MoleculeDoc {
    /// Unique molecule identifier.
    pub molecule_id: MoleculeId,
    /// Stored formula; the group key.
    pub formula_alphabetical: GroupKey,
    /// Canonical net charge.
    pub charge: i32,
    /// Canonical spin multiplicity.
    pub spin_multiplicity: u32,
    /// Deprecated molecules are never built.
    #[serde(default)]
    pub deprecated: bool,
    /// Calculations aggregated into this molecule.
    #[serde(default)]
    pub entries: Vec<MoleculeEntry>,
    /// Last modification time.
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
}

impl MoleculeDoc {
    const SCHEMA: &'static str = "molecule";

    /// Validate a stored molecule document.
    ///
    /// The formula must parse, but is kept as stored: it is the group key that
    /// discovery and task lookups match on.
    pub fn from_document(doc: &Document) -> Result<Self, BuildError> {
        let id = peek_id(doc, fields::MOLECULE_ID);
        let mol: Self = decode(Self::SCHEMA, &id, doc)?;
        if mol.molecule_id.trim().is_empty() {
            return Err(BuildError::validation(
                Self::SCHEMA,
                id,
                "molecule_id is empty",
            ));
        }
        if mol.spin_multiplicity == 0 {
            return Err(BuildError::validation(
                Self::SCHEMA,
                id,
                "spin_multiplicity must be at least 1",
            ));
        }
        formula_alphabetical(&mol.formula_alphabetical)
            .map_err(|reason| BuildError::validation(Self::SCHEMA, &id, reason))?;
        for (idx, entry) in mol.entries.iter().enumerate() {
            if entry.spin_multiplicity == 0 {
                return Err(BuildError::validation(
                    Self::SCHEMA,
                    &id,
                    format!("entry {idx} has spin_multiplicity 0"),
                ));
            }
            if !entry.energy.is_finite() {
                return Err(BuildError::validation(
                    Self::SCHEMA,
                    &id,
                    format!("entry {idx} has non-finite energy"),
                ));
            }
        }
        Ok(mol)
    }

    /// Entries computed at this molecule's canonical charge and spin.
    pub fn ground_state_entries(&self) -> impl Iterator<Item = &MoleculeEntry> {
        self.entries.iter().filter(move |entry| {
            entry.charge == self.charge && entry.spin_multiplicity == self.spin_multiplicity
        })
    }
}

/// One natural population analysis row.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NaturalPopulation {
    /// Zero-based atom index.
    pub atom_index: usize,
    /// Element symbol.
    pub atom: String,
    /// Core electron count.
    pub core_electrons: f64,
    /// Valence electron count.
    pub valence_electrons: f64,
    /// Rydberg electron count.
    pub rydberg_electrons: f64,
    /// Total electron count.
    pub total_electrons: f64,
}

/// A lone pair natural bond orbital.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LonePair {
    /// NBO index.
    pub index: usize,
    /// Atom hosting the pair.
    pub atom_index: usize,
    /// Fractional s character.
    pub s_character: f64,
    /// Fractional p character.
    pub p_character: f64,
    /// Electron occupancy.
    pub occupancy: f64,
}

/// A two-center bonding natural bond orbital.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bond {
    /// NBO index.
    pub index: usize,
    /// First bonded atom.
    pub atom1_index: usize,
    /// Second bonded atom.
    pub atom2_index: usize,
    /// Bond type label, e.g. `BD`.
    pub bond_type: String,
    /// Electron occupancy.
    pub occupancy: f64,
}

/// Second-order perturbative donor/acceptor interaction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    /// Donor NBO index.
    pub donor_index: usize,
    /// Acceptor NBO index.
    pub acceptor_index: usize,
    /// Stabilization energy in kcal/mol.
    pub perturbation_energy: f64,
}

/// Natural bond orbital analysis of a task.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NboOutput {
    /// Per-atom natural populations.
    #[serde(default)]
    pub natural_populations: Vec<NaturalPopulation>,
    /// Lone pair orbitals.
    #[serde(default)]
    pub lone_pairs: Vec<LonePair>,
    /// Bonding orbitals.
    #[serde(default)]
    pub bonds: Vec<Bond>,
    /// Donor/acceptor interactions.
    #[serde(default)]
    pub interactions: Vec<Interaction>,
}

/// Task output fields consumed by property builders.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaskOutput {
    /// Final energy in Hartree.
    pub final_energy: f64,
    /// NBO analysis, if run.
    #[serde(default)]
    pub nbo: Option<NboOutput>,
    /// Vibrational frequencies in cm^-1.
    #[serde(default)]
    pub frequencies: Option<Vec<f64>>,
    /// Per-mode atomic displacement vectors.
    #[serde(default)]
    pub frequency_modes: Option<Vec<Vec<[f64; 3]>>>,
    /// IR intensities per mode.
    #[serde(default)]
    pub ir_intensities: Option<Vec<f64>>,
    /// IR activity flag per mode.
    #[serde(default)]
    pub ir_activities: Option<Vec<bool>>,
    /// Raman intensities per mode.
    #[serde(default)]
    pub raman_intensities: Option<Vec<f64>>,
    /// Raman activities per mode.
    #[serde(default)]
    pub raman_activities: Option<Vec<f64>>,
}

/// Full calculation record: the originating document behind a molecule entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaskDocument {
    /// Task identifier.
    pub task_id: TaskRef,
    /// Stored formula; matched against the group key.
    pub formula_alphabetical: GroupKey,
    /// Net charge.
    pub charge: i32,
    /// Spin multiplicity (2S + 1).
    pub spin_multiplicity: u32,
    /// Functional/basis/solvation model.
    pub level_of_theory: LevelOfTheoryText,
    /// Solvent tag, `NONE` in vacuum.
    pub solvent: SolventTag,
    /// Parsed results.
    pub output: TaskOutput,
    /// Submitted input.
    pub orig: CalcInput,
    /// Last modification time.
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
}

impl TaskDocument {
    const SCHEMA: &'static str = "task";

    /// Validate a stored task document.
    pub fn from_document(doc: &Document) -> Result<Self, BuildError> {
        let id = peek_id(doc, fields::TASK_ID);
        let task: Self = decode(Self::SCHEMA, &id, doc)?;
        if task.spin_multiplicity == 0 {
            return Err(BuildError::validation(
                Self::SCHEMA,
                id,
                "spin_multiplicity must be at least 1",
            ));
        }
        if !task.output.final_energy.is_finite() {
            return Err(BuildError::validation(
                Self::SCHEMA,
                id,
                "output.final_energy is not finite",
            ));
        }
        formula_alphabetical(&task.formula_alphabetical)
            .map_err(|reason| BuildError::validation(Self::SCHEMA, &id, reason))?;
        Ok(task)
    }

    /// Serialize back into a stored document.
    pub fn to_document(&self) -> Result<Document, BuildError> {
        to_document(self)
    }
}

pub(crate) fn to_document<T: Serialize + ?Sized>(value: &T) -> Result<Document, BuildError> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(BuildError::Store(format!(
            "expected a JSON object document, found {other}"
        ))),
    }
}

fn decode<T: DeserializeOwned>(
    schema: &'static str,
    id: &str,
    doc: &Document,
) -> Result<T, BuildError> {
    serde_json::from_value(Value::Object(doc.clone()))
        .map_err(|err| BuildError::validation(schema, id, err.to_string()))
}

fn peek_id(doc: &Document, field: &str) -> String {
    match doc.get(field) {
        Some(Value::String(value)) => value.clone(),
        Some(other) => other.to_string(),
        None => "<unknown>".to_string(),
    }
}
