//! Level-of-theory parsing and scoring.
//!
//! A level of theory reads `functional/basis/solvent-model`, where the solvent
//! model may carry parameters, e.g. `wB97X-V/def2-TZVPPD/SMD(SOLVENT=WATER)`.
//! Lower scores are better.

use crate::config::BuildSettings;
use crate::constants::lot::COMPONENT_SEPARATOR;

/// Parsed level-of-theory components.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LevelOfTheory {
    /// Density functional.
    pub functional: String,
    /// Basis set.
    pub basis: String,
    /// Solvent model name with parameters stripped (`VACUUM` when absent).
    pub solvent_model: String,
}

impl LevelOfTheory {
    /// Parse a level-of-theory descriptor.
    pub fn parse(raw: &str) -> Result<Self, String> {
        let mut parts = raw.trim().splitn(3, COMPONENT_SEPARATOR).map(str::trim);
        let functional = parts.next().filter(|part| !part.is_empty());
        let basis = parts.next().filter(|part| !part.is_empty());
        let (Some(functional), Some(basis)) = (functional, basis) else {
            return Err(format!(
                "level of theory '{raw}' must read functional/basis[/solvent model]"
            ));
        };
        let solvent_model = parts
            .next()
            .map(|model| model.split('(').next().unwrap_or(model).trim())
            .filter(|model| !model.is_empty())
            .unwrap_or("VACUUM");
        Ok(Self {
            functional: functional.to_string(),
            basis: basis.to_string(),
            solvent_model: solvent_model.to_ascii_uppercase(),
        })
    }
}

/// Per-component ranks `(functional, basis, solvent model)`.
pub fn evaluate_lot(lot: &LevelOfTheory, settings: &BuildSettings) -> (u32, u32, u32) {
    (
        rank_in(&settings.functionals, &lot.functional),
        rank_in(&settings.basis_sets, &lot.basis),
        rank_in(&settings.solvent_models, &lot.solvent_model),
    )
}

/// Summed level-of-theory score for a raw descriptor.
///
/// Unparseable descriptors score worst on every component.
pub fn theory_score(raw: &str, settings: &BuildSettings) -> u32 {
    match LevelOfTheory::parse(raw) {
        Ok(lot) => {
            let (functional, basis, solvent) = evaluate_lot(&lot, settings);
            functional + basis + solvent
        }
        Err(_) => {
            (settings.functionals.len() + settings.basis_sets.len() + settings.solvent_models.len())
                as u32
        }
    }
}

fn rank_in(ranking: &[String], component: &str) -> u32 {
    ranking
        .iter()
        .position(|candidate| candidate.eq_ignore_ascii_case(component))
        .unwrap_or(ranking.len()) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> BuildSettings {
        BuildSettings {
            functionals: vec!["wB97M-V".into(), "wB97X-V".into()],
            basis_sets: vec!["def2-QZVPPD".into(), "def2-TZVPPD".into()],
            solvent_models: vec!["VACUUM".into(), "SMD".into(), "PCM".into()],
        }
    }

    #[test]
    fn parse_strips_solvent_parameters() {
        let lot = LevelOfTheory::parse("wB97X-V/def2-TZVPPD/SMD(SOLVENT=WATER)").unwrap();
        assert_eq!(lot.functional, "wB97X-V");
        assert_eq!(lot.basis, "def2-TZVPPD");
        assert_eq!(lot.solvent_model, "SMD");

        let vacuum = LevelOfTheory::parse("wB97M-V/def2-QZVPPD").unwrap();
        assert_eq!(vacuum.solvent_model, "VACUUM");
    }

    #[test]
    fn parse_rejects_missing_components() {
        assert!(LevelOfTheory::parse("wB97X-V").is_err());
        assert!(LevelOfTheory::parse("/def2-TZVPPD").is_err());
        assert!(LevelOfTheory::parse("").is_err());
    }

    #[test]
    fn scores_sum_component_ranks() {
        let settings = settings();
        assert_eq!(theory_score("wB97M-V/def2-QZVPPD/VACUUM", &settings), 0);
        assert_eq!(theory_score("wB97X-V/def2-TZVPPD/SMD(SOLVENT=WATER)", &settings), 3);
        assert_eq!(
            evaluate_lot(
                &LevelOfTheory::parse("b3lyp/def2-tzvppd/pcm").unwrap(),
                &settings
            ),
            (2, 1, 2)
        );
    }

    #[test]
    fn unknown_and_unparseable_descriptors_score_worst() {
        let settings = settings();
        assert_eq!(theory_score("HF/STO-3G/COSMO", &settings), 2 + 2 + 3);
        assert_eq!(theory_score("garbage", &settings), 7);
    }
}
