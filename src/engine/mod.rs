//! The three search algorithms: [`merge_distinct_list`], the reference
//! oracle; [`probe_set_optimized`], the prefix+position filter baseline;
//! and [`josie`], the cost-model-driven algorithm that dominates both.
//!
//! All three share the storage adapter and token table abstractions and
//! the merge-based `overlap` primitive below; none of them depends on the
//! others' internals.

pub mod josie;
pub mod merge_distinct_list;
pub mod probe_set_optimized;

use std::fmt::Write as _;

use log::error;
use rustc_hash::FxHashMap;

use crate::candidate::CandidateEntry;
use crate::error::{Result, TopkError};
use crate::storage::ListEntry;

/// A posting-list entry claiming a match position past the end of its own
/// set's token sequence is a bug in whatever built the index, not a
/// condition the engine can recover from. Compiled out entirely in release
/// builds — the hot path trusts the storage adapter's contract there.
#[cfg(debug_assertions)]
pub(crate) fn check_list_entry(entry: &ListEntry) -> Result<()> {
    if entry.size < entry.match_position {
        error!(
            "invariant violation: set {} has size {} but posting-list match_position {}",
            entry.set_id, entry.size, entry.match_position
        );
        return Err(TopkError::InvariantViolation(format!(
            "set {} has size {} but match_position {}",
            entry.set_id, entry.size, entry.match_position
        )));
    }
    Ok(())
}

#[cfg(not(debug_assertions))]
pub(crate) fn check_list_entry(_entry: &ListEntry) -> Result<()> {
    Ok(())
}

/// No set id may be live in both `counter` and `ignores` at once. A set id
/// reappearing in a posting list after being fully read must have been
/// filtered by `ignores` before ever re-entering `counter` — if it didn't,
/// that is the bug this guards against.
#[cfg(debug_assertions)]
pub(crate) fn check_counter_ignores_disjoint(
    counter: &FxHashMap<i64, CandidateEntry>,
    ignores: &rustc_hash::FxHashSet<i64>,
) -> Result<()> {
    for id in counter.keys() {
        if ignores.contains(id) {
            error!("invariant violation: set {id} is live in both counter and ignores");
            return Err(TopkError::InvariantViolation(format!(
                "set {id} is live in both counter and ignores"
            )));
        }
    }
    Ok(())
}

#[cfg(not(debug_assertions))]
pub(crate) fn check_counter_ignores_disjoint(
    _counter: &FxHashMap<i64, CandidateEntry>,
    _ignores: &rustc_hash::FxHashSet<i64>,
) -> Result<()> {
    Ok(())
}

/// Counts the overlap between two token sequences, each sorted ascending.
/// A linear merge, exactly the primitive every algorithm uses once it has
/// read a candidate set's suffix.
pub fn overlap(set_tokens: &[i64], query_tokens: &[i64]) -> i64 {
    let mut i = 0usize;
    let mut j = 0usize;
    let mut count = 0i64;
    while i < query_tokens.len() && j < set_tokens.len() {
        match query_tokens[i].cmp(&set_tokens[j]) {
            std::cmp::Ordering::Equal => {
                count += 1;
                i += 1;
                j += 1;
            }
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
        }
    }
    count
}

/// Accumulates the `actions` trace (`l<len>` for a list read, `s<size>o<overlap>`
/// for a set read) for a `QueryResult`.
#[derive(Default)]
pub(crate) struct ActionTrace(String);

impl ActionTrace {
    pub fn add_read_list(&mut self, length: usize) {
        let _ = write!(self.0, "l{length}");
    }

    pub fn add_read_set(&mut self, size: usize, overlap: i64) {
        let _ = write!(self.0, "s{size}o{overlap}");
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

/// Accumulates JOSIE's `benefit_cost` trace: one
/// `l<list_benefit>c<list_cost>s<set_benefit>c<set_cost>` entry per greedy
/// decision point.
#[derive(Default)]
pub(crate) struct BenefitCostTrace(String);

impl BenefitCostTrace {
    pub fn add(&mut self, list_benefit: f64, list_cost: f64, set_benefit: f64, set_cost: f64) {
        let _ = write!(
            self.0,
            "l{}c{}s{}c{}",
            list_benefit as i64, list_cost as i64, set_benefit as i64, set_cost as i64
        );
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlap_counts_shared_ascending_tokens() {
        assert_eq!(overlap(&[1, 2, 4, 6], &[2, 3, 4, 5, 6]), 3);
    }

    #[test]
    fn overlap_is_zero_for_disjoint_sequences() {
        assert_eq!(overlap(&[1, 2, 3], &[4, 5, 6]), 0);
    }

    #[test]
    fn overlap_handles_empty_inputs() {
        assert_eq!(overlap(&[], &[1, 2]), 0);
        assert_eq!(overlap(&[1, 2], &[]), 0);
    }

    #[test]
    #[cfg(debug_assertions)]
    fn check_list_entry_rejects_match_position_past_set_size() {
        let bad = ListEntry {
            set_id: 1,
            size: 3,
            match_position: 5,
        };
        assert!(matches!(
            check_list_entry(&bad),
            Err(TopkError::InvariantViolation(_))
        ));
    }

    #[test]
    #[cfg(debug_assertions)]
    fn check_list_entry_accepts_a_valid_entry() {
        let ok = ListEntry {
            set_id: 1,
            size: 3,
            match_position: 2,
        };
        assert!(check_list_entry(&ok).is_ok());
    }

    #[test]
    #[cfg(debug_assertions)]
    fn check_counter_ignores_disjoint_rejects_overlap() {
        let mut counter = FxHashMap::default();
        counter.insert(5, CandidateEntry::new(5, 10, 0, 0, 0));
        let mut ignores = rustc_hash::FxHashSet::default();
        ignores.insert(5);
        assert!(matches!(
            check_counter_ignores_disjoint(&counter, &ignores),
            Err(TopkError::InvariantViolation(_))
        ));
    }
}
