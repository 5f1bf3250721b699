use chrono::{DateTime, Utc};
use indexmap::IndexMap;

use crate::types::{GroupKey, LogMessage, SolventTag};

/// Outcome of one builder run (or several merged chunk runs).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RunSummary {
    /// Build timestamp stamped onto every committed document.
    pub build_timestamp: Option<DateTime<Utc>>,
    /// Pending groups found by discovery.
    pub pending_groups: usize,
    /// Groups transformed without error (including those yielding no documents).
    pub processed_groups: usize,
    /// Groups that yielded no documents.
    pub empty_groups: usize,
    /// Groups whose processing failed, with the failure reason.
    pub failed_groups: Vec<(GroupKey, LogMessage)>,
    /// Documents upserted into the target store.
    pub documents_written: usize,
    /// Documents produced per solvent environment.
    pub per_solvent: IndexMap<SolventTag, usize>,
}

impl RunSummary {
    /// Record a successfully transformed group and the solvents of its documents.
    pub fn record_group<'a>(&mut self, solvents: impl IntoIterator<Item = &'a SolventTag>) {
        self.processed_groups += 1;
        let mut produced = 0usize;
        for solvent in solvents {
            *self.per_solvent.entry(solvent.clone()).or_insert(0) += 1;
            produced += 1;
        }
        if produced == 0 {
            self.empty_groups += 1;
        }
    }

    /// Record a failed group.
    pub fn record_failure(&mut self, group: GroupKey, reason: impl Into<LogMessage>) {
        self.failed_groups.push((group, reason.into()));
    }

    /// Fold another summary (e.g. from a parallel chunk) into this one.
    pub fn merge(&mut self, other: RunSummary) {
        self.build_timestamp = self.build_timestamp.or(other.build_timestamp);
        self.pending_groups += other.pending_groups;
        self.processed_groups += other.processed_groups;
        self.empty_groups += other.empty_groups;
        self.failed_groups.extend(other.failed_groups);
        self.documents_written += other.documents_written;
        for (solvent, count) in other.per_solvent {
            *self.per_solvent.entry(solvent).or_insert(0) += count;
        }
    }

    /// Returns `true` when every pending group processed without error.
    pub fn is_clean(&self) -> bool {
        self.failed_groups.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_and_merge_accumulate_counts() {
        let water = "SOLVENT=WATER".to_string();
        let none = "NONE".to_string();

        let mut left = RunSummary {
            pending_groups: 2,
            ..RunSummary::default()
        };
        left.record_group([&water, &none]);
        left.record_group(std::iter::empty());

        let mut right = RunSummary {
            pending_groups: 1,
            documents_written: 1,
            ..RunSummary::default()
        };
        right.record_failure("C1 O2".into(), "bad document");
        right.record_group([&water]);

        left.merge(right);
        assert_eq!(left.pending_groups, 3);
        assert_eq!(left.processed_groups, 3);
        assert_eq!(left.empty_groups, 1);
        assert_eq!(left.documents_written, 1);
        assert_eq!(left.per_solvent[&water], 2);
        assert_eq!(left.per_solvent[&none], 1);
        assert!(!left.is_clean());
    }
}
