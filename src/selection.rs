//! Best-candidate selection within a group.
//!
//! Candidates are filtered, partitioned by sub-category (solvent), and ranked
//! ascending by `RankingKey`. Sorting is stable, so ties resolve to the entry
//! seen first in input order. Callers get deterministic winners only when the
//! store hands back entries in a deterministic order.

use indexmap::IndexMap;
use std::cmp::Ordering;

use crate::config::BuildSettings;
use crate::data::MoleculeEntry;
use crate::lot::theory_score;
use crate::types::SolventTag;

/// Ordering key for candidate entries; lower is better on both components.
///
/// NaN energies rank after every number.
#[derive(Clone, Copy, Debug)]
pub struct RankingKey {
    /// Summed level-of-theory rank.
    pub theory_score: u32,
    /// Electronic energy.
    pub energy: f64,
}

impl RankingKey {
    /// Ranking key of a molecule entry under `settings`.
    pub fn for_entry(entry: &MoleculeEntry, settings: &BuildSettings) -> Self {
        Self {
            theory_score: theory_score(&entry.level_of_theory, settings),
            energy: entry.energy,
        }
    }
}

impl PartialEq for RankingKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for RankingKey {}

impl PartialOrd for RankingKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RankingKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.theory_score
            .cmp(&other.theory_score)
            .then_with(|| {
                // NaN sorts last; signed zeros compare equal.
                self.energy
                    .partial_cmp(&other.energy)
                    .unwrap_or_else(|| self.energy.is_nan().cmp(&other.energy.is_nan()))
            })
    }
}

/// Filter, partition by sub-category, and rank each partition best first.
///
/// Partitions appear in first-seen order; a sub-category with no surviving
/// entry is absent from the result.
pub fn rank_by_subcategory<E, K, C, R>(
    entries: impl IntoIterator<Item = E>,
    mut keep: K,
    mut sub_category: C,
    mut rank: R,
) -> IndexMap<SolventTag, Vec<E>>
where
    K: FnMut(&E) -> bool,
    C: FnMut(&E) -> SolventTag,
    R: FnMut(&E) -> RankingKey,
{
    let mut partitions: IndexMap<SolventTag, Vec<(RankingKey, E)>> = IndexMap::new();
    for entry in entries {
        if !keep(&entry) {
            continue;
        }
        let key = rank(&entry);
        partitions
            .entry(sub_category(&entry))
            .or_default()
            .push((key, entry));
    }
    partitions
        .into_iter()
        .map(|(category, mut ranked)| {
            ranked.sort_by(|a, b| a.0.cmp(&b.0));
            (category, ranked.into_iter().map(|(_, entry)| entry).collect())
        })
        .collect()
}

/// The single best entry per sub-category.
pub fn select_best<E, K, C, R>(
    entries: impl IntoIterator<Item = E>,
    keep: K,
    sub_category: C,
    rank: R,
) -> IndexMap<SolventTag, E>
where
    K: FnMut(&E) -> bool,
    C: FnMut(&E) -> SolventTag,
    R: FnMut(&E) -> RankingKey,
{
    rank_by_subcategory(entries, keep, sub_category, rank)
        .into_iter()
        .filter_map(|(category, ranked)| ranked.into_iter().next().map(|best| (category, best)))
        .collect()
}
