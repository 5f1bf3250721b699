use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::constants::builder::DEFAULT_COMMIT_BATCH_SIZE;
use crate::constants::fields;
use crate::constants::lot::{DEFAULT_BASIS_SETS, DEFAULT_FUNCTIONALS, DEFAULT_SOLVENT_MODELS};
use crate::errors::BuildError;
use crate::store::Criteria;

/// Level-of-theory scoring tunables.
///
/// Each ranking lists components best first; a component's score is its
/// position, and components missing from a ranking score as its length.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildSettings {
    /// Density functionals, best first.
    pub functionals: Vec<String>,
    /// Basis sets, best first.
    pub basis_sets: Vec<String>,
    /// Implicit solvent models, best first.
    pub solvent_models: Vec<String>,
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            functionals: DEFAULT_FUNCTIONALS.iter().map(|s| s.to_string()).collect(),
            basis_sets: DEFAULT_BASIS_SETS.iter().map(|s| s.to_string()).collect(),
            solvent_models: DEFAULT_SOLVENT_MODELS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// Top-level builder configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuilderConfig {
    /// Additional filter merged into every molecule query (alongside `deprecated = false`).
    pub query: Criteria,
    /// Level-of-theory scoring tunables.
    pub settings: BuildSettings,
    /// Number of processed groups buffered before committing to the target store.
    pub commit_batch_size: usize,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            query: Criteria::new(),
            settings: BuildSettings::default(),
            commit_batch_size: DEFAULT_COMMIT_BATCH_SIZE,
        }
    }
}

impl BuilderConfig {
    /// Molecule filter used by discovery: the configured query plus `deprecated = false`.
    pub fn base_query(&self) -> Criteria {
        self.query.clone().eq(fields::DEPRECATED, false)
    }

    /// Copy of this config restricted to one prechunk filter.
    pub fn narrowed(&self, chunk: &Criteria) -> Self {
        Self {
            query: self.query.clone().merge(chunk),
            ..self.clone()
        }
    }

    /// Reject settings the builder cannot run with.
    pub fn validate(&self) -> Result<(), BuildError> {
        if self.commit_batch_size == 0 {
            return Err(BuildError::Configuration(
                "commit_batch_size must be greater than zero".to_string(),
            ));
        }
        let rankings = [
            ("functionals", &self.settings.functionals),
            ("basis_sets", &self.settings.basis_sets),
            ("solvent_models", &self.settings.solvent_models),
        ];
        for (name, ranking) in rankings {
            if ranking.is_empty() {
                return Err(BuildError::Configuration(format!(
                    "settings.{name} must list at least one entry"
                )));
            }
        }
        Ok(())
    }

    /// Parse and validate a JSON configuration.
    pub fn from_json_str(raw: &str) -> Result<Self, BuildError> {
        let config: Self = serde_json::from_str(raw)
            .map_err(|err| BuildError::Configuration(format!("invalid builder config: {err}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse, and validate a JSON configuration file.
    pub fn from_json_path<P: AsRef<Path>>(path: P) -> Result<Self, BuildError> {
        let raw = fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&raw)
    }
}
