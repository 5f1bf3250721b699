use serde::{Deserialize, Serialize};

use crate::data::{MoleculeEntry, TaskDocument};
use crate::errors::BuildError;
use crate::properties::{DerivedDocument, PropertyKind, PropertyMeta};

/// Vibrational analysis summary for one molecule in one solvent environment.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VibrationDoc {
    /// Shared property fields.
    #[serde(flatten)]
    pub meta: PropertyMeta,
    /// Harmonic frequencies in cm^-1; negative values are imaginary modes.
    pub frequencies: Vec<f64>,
    /// Per-mode atomic displacement vectors.
    pub frequency_modes: Vec<Vec<[f64; 3]>>,
    /// IR intensities per mode.
    pub ir_intensities: Vec<f64>,
    /// IR activity flag per mode.
    pub ir_activities: Vec<bool>,
    /// Raman intensities per mode.
    pub raman_intensities: Option<Vec<f64>>,
    /// Raman activities per mode.
    pub raman_activities: Option<Vec<f64>>,
    /// Number of negative frequencies.
    pub imaginary_modes: usize,
}

impl VibrationDoc {
    /// Build from a frequency task.
    ///
    /// Returns `Ok(None)` when the task has no frequencies and a validation
    /// error when per-mode arrays disagree in length.
    pub fn from_task(task: &TaskDocument, molecule_id: &str) -> Result<Option<Self>, BuildError> {
        let output = &task.output;
        let Some(frequencies) = output.frequencies.as_ref().filter(|f| !f.is_empty()) else {
            return Ok(None);
        };
        let modes = frequencies.len();
        let frequency_modes = output.frequency_modes.clone().unwrap_or_default();
        let ir_intensities = output.ir_intensities.clone().unwrap_or_default();
        let ir_activities = output.ir_activities.clone().unwrap_or_default();

        let mut checks = vec![
            ("frequency_modes", frequency_modes.len()),
            ("ir_intensities", ir_intensities.len()),
            ("ir_activities", ir_activities.len()),
        ];
        if let Some(raman) = &output.raman_intensities {
            checks.push(("raman_intensities", raman.len()));
        }
        if let Some(raman) = &output.raman_activities {
            checks.push(("raman_activities", raman.len()));
        }
        for (field, len) in checks {
            if len != modes {
                return Err(BuildError::validation(
                    "task",
                    task.task_id.to_string(),
                    format!("output.{field} has {len} values for {modes} frequencies"),
                ));
            }
        }

        Ok(Some(Self {
            meta: PropertyMeta::from_task(task, molecule_id, VibrationKind::NAME),
            imaginary_modes: frequencies.iter().filter(|f| **f < 0.0).count(),
            frequencies: frequencies.clone(),
            frequency_modes,
            ir_intensities,
            ir_activities,
            raman_intensities: output.raman_intensities.clone(),
            raman_activities: output.raman_activities.clone(),
        }))
    }
}

impl DerivedDocument for VibrationDoc {
    fn meta(&self) -> &PropertyMeta {
        &self.meta
    }
}

/// Vibration property kind: candidates need a non-empty frequency list.
#[derive(Clone, Copy, Debug, Default)]
pub struct VibrationKind;

impl VibrationKind {
    /// Short name used in ids and logs.
    pub const NAME: &'static str = "vibrations";
}

impl PropertyKind for VibrationKind {
    type Doc = VibrationDoc;

    fn property_name(&self) -> &'static str {
        Self::NAME
    }

    fn accepts(&self, entry: &MoleculeEntry) -> bool {
        entry
            .output
            .frequencies
            .as_ref()
            .is_some_and(|frequencies| !frequencies.is_empty())
    }

    fn build(
        &self,
        task: &TaskDocument,
        molecule_id: &str,
    ) -> Result<Option<VibrationDoc>, BuildError> {
        VibrationDoc::from_task(task, molecule_id)
    }
}
