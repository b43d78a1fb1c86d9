//! JOSIE: the cost-model-driven algorithm that interleaves posting-list
//! reads and candidate-set reads to minimize expected I/O while still
//! producing an exact top-k answer.
//!
//! This is a direct port of the published JOSIE search loop: merge
//! distinct posting lists in query order, and every `batch_size` lists
//! pause to greedily decide whether reading the best unread candidate set
//! now is cheaper than reading the next batch of lists — repeating until
//! either the query is exhausted or no unseen candidate could still beat
//! the kth overlap.

use std::time::Instant;

use log::debug;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::candidate::CandidateEntry;
use crate::cost_model::CostModel;
use crate::engine::{
    check_counter_ignores_disjoint, check_list_entry, overlap, ActionTrace, BenefitCostTrace,
};
use crate::error::Result;
use crate::heap::{SearchResult, TopKHeap};
use crate::query::{next_batch_distinct_lists, next_distinct_list, RawTokenSet};
use crate::result::{write_result_string, EngineConfig, QueryResult};
use crate::storage::StorageAdapter;
use crate::token_table::TokenTable;

/// Upper bound on the overlap a not-yet-seen candidate could reach, given
/// `prefix_overlap` skipped-token credit at query position
/// `query_position` out of `query_size` total positions.
fn upperbound_overlap_unknown_candidate(
    query_size: usize,
    query_position: usize,
    prefix_overlap: i64,
) -> i64 {
    query_size as i64 - query_position as i64 + prefix_overlap
}

/// Number of posting lists that must be read for a query of `query_size`
/// positions to guarantee the kth overlap could still be beaten, i.e. the
/// number of positions from the front of the query that matter once the
/// threshold is `kth_overlap`.
fn prefix_length(query_size: usize, kth_overlap: i64) -> i64 {
    if kth_overlap == 0 {
        query_size as i64
    } else {
        query_size as i64 - kth_overlap + 1
    }
}

fn read_lists_benefit_for_candidate(ce: &CandidateEntry, kth_overlap: i64, cost_model: &CostModel) -> f64 {
    if kth_overlap >= ce.estimated_next_upperbound {
        ce.estimated_cost
    } else {
        ce.estimated_cost - cost_model.cost_set(ce.suffix_length() - ce.estimated_next_truncation)
    }
}

/// Processes every live candidate in `counter` once a batch boundary has
/// been reached: disqualifies candidates whose upper bound can no longer
/// beat `kth_overlap` (moving them to `ignores`), skips ones that haven't
/// been sampled long enough to trust an estimate, and computes estimates
/// plus the aggregate benefit of reading the next batch of lists for the
/// rest. Returns `(benefit, num_with_benefit, qualified_ids)`.
#[allow(clippy::too_many_arguments)]
fn process_candidates_init(
    query_size: usize,
    query_position: usize,
    next_batch_end: usize,
    kth_overlap: i64,
    batch_size: i64,
    counter: &mut FxHashMap<i64, CandidateEntry>,
    ignores: &mut FxHashSet<i64>,
    cost_model: &CostModel,
) -> (f64, i64, Vec<i64>) {
    let mut read_lists_benefit = 0.0;
    let mut num_with_benefit = 0i64;
    let mut qualified = Vec::with_capacity(counter.len());

    let ids: Vec<i64> = counter.keys().copied().collect();
    for id in ids {
        let ce = counter.get_mut(&id).expect("id collected from counter");
        let max_overlap = ce.upperbound_overlap(query_size, query_position);
        if kth_overlap >= max_overlap {
            counter.remove(&id);
            ignores.insert(id);
            continue;
        }
        if !ce.has_min_sample_size(query_position, batch_size) {
            continue;
        }
        ce.estimate_cost(cost_model);
        ce.estimate_overlap(query_size, query_position);
        ce.estimate_truncation(query_size, query_position, next_batch_end);
        ce.estimate_next_overlap_upperbound(query_size, query_position, next_batch_end);
        read_lists_benefit += read_lists_benefit_for_candidate(ce, kth_overlap, cost_model);
        let estimated_overlap = ce.estimated_overlap;
        qualified.push(id);
        if estimated_overlap > kth_overlap {
            num_with_benefit += 1;
        }
    }
    (read_lists_benefit, num_with_benefit, qualified)
}

/// Re-scans the qualified candidates mid-greedy-phase: disqualifies any
/// whose upper bound has been overtaken by a now-higher `kth_overlap`
/// (recorded into `eliminated`/`ignores`/`counter`) and recomputes the
/// aggregate benefit of reading the next batch of lists.
fn process_candidates_update(
    kth_overlap: i64,
    qualified: &[i64],
    committed: &FxHashSet<i64>,
    eliminated: &mut FxHashSet<i64>,
    counter: &mut FxHashMap<i64, CandidateEntry>,
    ignores: &mut FxHashSet<i64>,
    cost_model: &CostModel,
) -> f64 {
    let mut read_lists_benefit = 0.0;
    for &id in qualified {
        if eliminated.contains(&id) || committed.contains(&id) {
            continue;
        }
        let ce = match counter.get(&id) {
            Some(ce) => ce,
            None => continue,
        };
        read_lists_benefit += read_lists_benefit_for_candidate(ce, kth_overlap, cost_model);
        if ce.maximum_overlap <= kth_overlap {
            eliminated.insert(id);
            ignores.insert(id);
            counter.remove(&id);
        }
    }
    read_lists_benefit
}

/// Benefit of reading a candidate set that would move the kth overlap from
/// `kth_overlap` to `kth_overlap_after`: the read-list cost saved by
/// needing a shorter prefix of the query, plus (unless `fast`) the cost of
/// every other qualified candidate that the new threshold would eliminate
/// outright.
#[allow(clippy::too_many_arguments)]
fn read_set_benefit(
    query_size: usize,
    kth_overlap: i64,
    kth_overlap_after: i64,
    qualified: &[i64],
    committed: &FxHashSet<i64>,
    eliminated: &FxHashSet<i64>,
    counter: &FxHashMap<i64, CandidateEntry>,
    cost_list_prefix: &[f64],
    fast: bool,
) -> f64 {
    if kth_overlap_after <= kth_overlap {
        return 0.0;
    }
    let p0 = prefix_length(query_size, kth_overlap);
    let p1 = prefix_length(query_size, kth_overlap_after);
    let mut benefit = cost_list_prefix[(p0 - 1) as usize] - cost_list_prefix[(p1 - 1) as usize];
    if fast {
        return benefit;
    }
    for &id in qualified {
        if eliminated.contains(&id) || committed.contains(&id) {
            continue;
        }
        if let Some(ce) = counter.get(&id) {
            if ce.maximum_overlap <= kth_overlap_after {
                benefit += ce.estimated_cost;
            }
        }
    }
    benefit
}

pub fn josie(
    storage: &dyn StorageAdapter,
    token_table: &dyn TokenTable,
    query: &RawTokenSet,
    k: usize,
    ignore_self: bool,
    config: &EngineConfig,
) -> Result<(Vec<SearchResult>, QueryResult)> {
    let cost_model = &config.cost_model;
    cost_model.validate()?;
    let batch_size = config.batch_size;
    let expensive_estimation_budget = config.expensive_estimation_budget;

    let preproc_start = Instant::now();
    let processed = token_table.process(query)?;
    let query_size = processed.tokens.len();

    let mut cost_list_prefix = Vec::with_capacity(query_size);
    for (i, &count) in processed.counts.iter().enumerate() {
        let cost = cost_model.cost_list(count + 1);
        if i == 0 {
            cost_list_prefix.push(cost);
        } else {
            cost_list_prefix.push(cost_list_prefix[i - 1] + cost);
        }
    }
    let preproc_duration_ms = preproc_start.elapsed().as_millis() as i64;

    let start = Instant::now();
    let mut counter: FxHashMap<i64, CandidateEntry> = FxHashMap::default();
    let mut ignores: FxHashSet<i64> = FxHashSet::default();
    if ignore_self {
        ignores.insert(query.id);
    }
    let mut heap = TopKHeap::new(k);
    let mut trace = ActionTrace::default();
    let mut benefit_cost_trace = BenefitCostTrace::default();
    let mut num_list_read = 0u64;
    let mut num_set_read = 0u64;
    let mut max_list_size_read = 0i64;
    let mut max_set_size_read = 0i64;
    let mut max_counter_size = 0usize;

    let mut curr_batch_lists = batch_size;
    let tokens = &processed.tokens;
    let mut i = 0usize;
    let mut num_skipped = 0i64;

    while i < query_size {
        let token = tokens[i];
        let skipped_overlap = num_skipped;
        let ub_unseen = upperbound_overlap_unknown_candidate(query_size, i, skipped_overlap);

        if heap.kth_overlap() >= ub_unseen && counter.is_empty() {
            debug!(
                "josie: early termination at query position {i}, kth_overlap={}, ub_unseen={ub_unseen}",
                heap.kth_overlap()
            );
            break;
        }

        let entries = storage.read_list(token)?;
        num_list_read += 1;
        max_list_size_read = max_list_size_read.max(entries.len() as i64);
        trace.add_read_list(entries.len());

        for entry in &entries {
            check_list_entry(entry)?;
            if ignores.contains(&entry.set_id) {
                continue;
            }
            if let Some(ce) = counter.get_mut(&entry.set_id) {
                ce.update(entry.match_position as i64, skipped_overlap);
                continue;
            }
            if heap.kth_overlap() >= ub_unseen {
                continue;
            }
            counter.insert(
                entry.set_id,
                CandidateEntry::new(
                    entry.set_id,
                    entry.size as i64,
                    entry.match_position as i64,
                    i,
                    skipped_overlap,
                ),
            );
        }
        max_counter_size = max_counter_size.max(counter.len());
        check_counter_ignores_disjoint(&counter, &ignores)?;

        if i == query_size - 1 {
            break;
        }

        if counter.is_empty() || (counter.len() < k && heap.len() < k) || curr_batch_lists > 0 {
            curr_batch_lists -= 1;
            let (next_i, skipped) = next_distinct_list(&processed.gids, i);
            i = next_i;
            num_skipped = skipped;
            continue;
        }
        curr_batch_lists = batch_size;

        let next_batch_end_index = next_batch_distinct_lists(&processed.gids, i, batch_size);
        let merge_lists_cost = cost_list_prefix[next_batch_end_index] - cost_list_prefix[i];

        let (mut merge_lists_benefit, num_with_benefit, qualified) = process_candidates_init(
            query_size,
            i,
            next_batch_end_index,
            heap.kth_overlap(),
            batch_size,
            &mut counter,
            &mut ignores,
            cost_model,
        );
        max_counter_size = max_counter_size.max(counter.len());

        if num_with_benefit == 0 || qualified.is_empty() {
            let (next_i, skipped) = next_distinct_list(&processed.gids, i);
            i = next_i;
            num_skipped = skipped;
            continue;
        }

        let mut sorted_qualified = qualified.clone();
        sorted_qualified.sort_unstable_by(|&a, &b| {
            let ea = &counter[&a];
            let eb = &counter[&b];
            eb.estimated_overlap
                .cmp(&ea.estimated_overlap)
                .then(ea.estimated_cost.partial_cmp(&eb.estimated_cost).unwrap())
        });

        let mut prev_kth_overlap = heap.kth_overlap();
        let mut num_candidate_expensive = 0i64;
        let mut fast_estimate = false;
        let mut fast_estimate_kth_overlap = 0i64;
        let mut eliminated: FxHashSet<i64> = FxHashSet::default();
        let mut committed: FxHashSet<i64> = FxHashSet::default();

        for &candidate_id in &sorted_qualified {
            if eliminated.contains(&candidate_id) || committed.contains(&candidate_id) {
                continue;
            }
            let kth = heap.kth_overlap();
            let estimated_overlap = counter[&candidate_id].estimated_overlap;
            if estimated_overlap <= kth {
                break;
            }

            if heap.len() >= k {
                num_candidate_expensive += 1;
                if !fast_estimate
                    && num_candidate_expensive * (sorted_qualified.len() as i64)
                        > expensive_estimation_budget
                {
                    fast_estimate = true;
                    fast_estimate_kth_overlap = prev_kth_overlap;
                    debug!("josie: switching to fast estimation at query position {i}");
                }
                if !fast_estimate {
                    merge_lists_benefit = process_candidates_update(
                        kth,
                        &sorted_qualified,
                        &committed,
                        &mut eliminated,
                        &mut counter,
                        &mut ignores,
                        cost_model,
                    );
                }

                let kth_after = heap.kth_overlap_after_push(
                    counter[&candidate_id].estimated_overlap,
                );
                let probe_set_benefit = read_set_benefit(
                    query_size,
                    kth,
                    kth_after,
                    &sorted_qualified,
                    &committed,
                    &eliminated,
                    &counter,
                    &cost_list_prefix,
                    fast_estimate,
                );
                let probe_set_cost = counter[&candidate_id].estimated_cost;
                benefit_cost_trace.add(
                    merge_lists_benefit,
                    merge_lists_cost,
                    probe_set_benefit,
                    probe_set_cost,
                );
                if probe_set_benefit - probe_set_cost < merge_lists_benefit - merge_lists_cost {
                    break;
                }
            }

            if fast_estimate
                || (num_candidate_expensive + 1) * (sorted_qualified.len() as i64)
                    > expensive_estimation_budget
            {
                let ce = &counter[&candidate_id];
                merge_lists_benefit -=
                    read_lists_benefit_for_candidate(ce, fast_estimate_kth_overlap, cost_model);
            }

            committed.insert(candidate_id);
            ignores.insert(candidate_id);
            let ce = counter.remove(&candidate_id).expect("candidate was live");

            if ce.maximum_overlap <= kth {
                continue;
            }

            let total_overlap = if ce.suffix_length() > 0 {
                let suffix = storage.read_set_suffix(ce.id, (ce.latest_match_position + 1) as i32)?;
                num_set_read += 1;
                max_set_size_read = max_set_size_read.max(suffix.len() as i64);
                let suffix_overlap = overlap(&suffix, &tokens[i + 1..]);
                trace.add_read_set(suffix.len(), suffix_overlap + ce.partial_overlap);
                suffix_overlap + ce.partial_overlap
            } else {
                ce.partial_overlap
            };

            prev_kth_overlap = kth;
            heap.push_candidate(ce.id, total_overlap);
        }

        let (next_i, skipped) = next_distinct_list(&processed.gids, i);
        i = next_i;
        num_skipped = skipped;
    }

    for (&id, ce) in counter.iter() {
        heap.push_candidate(id, ce.partial_overlap);
    }
    let results = heap.ordered_results();
    let duration_ms = start.elapsed().as_millis() as i64;

    let query_result = QueryResult {
        query_id: query.id,
        query_size: query.raw_tokens.len(),
        query_num_token: query_size,
        num_result: results.len(),
        duration_ms,
        preproc_duration_ms,
        num_set_read,
        num_list_read,
        max_set_size_read,
        max_list_size_read,
        max_counter_size,
        ignore_size: ignores.len(),
        results: write_result_string(&results),
        actions: trace.into_string(),
        benefit_cost: benefit_cost_trace.into_string(),
        ..Default::default()
    };
    Ok((results, query_result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::merge_distinct_list::merge_distinct_list;
    use crate::storage::InMemoryStorage;
    use crate::token_table::{ProcessedQuery, ProcessedQueryWithSignature};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::collections::BTreeMap;

    struct IdentityTokenTable;
    impl TokenTable for IdentityTokenTable {
        fn process(&self, query: &RawTokenSet) -> Result<ProcessedQuery> {
            let mut tokens = query.tokens.clone();
            tokens.sort_unstable();
            let gids = tokens.clone();
            let counts = vec![0; tokens.len()];
            Ok(ProcessedQuery {
                tokens,
                counts,
                gids,
            })
        }
        fn process_and_minhash(&self, _query: &RawTokenSet) -> Result<ProcessedQueryWithSignature> {
            unimplemented!()
        }
    }

    fn query_of(id: i64, tokens: &[i64]) -> RawTokenSet {
        RawTokenSet {
            id,
            tokens: tokens.to_vec(),
            raw_tokens: vec![],
        }
    }

    fn small_config() -> EngineConfig {
        let mut cfg = EngineConfig::new(CostModel::DEFAULT, 2);
        cfg.expensive_estimation_budget = crate::result::UNBOUNDED_BUDGET;
        cfg
    }

    #[test]
    fn ranks_nested_sets_by_overlap_descending() {
        let storage = InMemoryStorage::from_sets(vec![
            (1, vec![1, 2]),
            (2, vec![1, 2, 3]),
            (3, vec![1, 2, 3, 4]),
        ]);
        let q = query_of(999, &[1, 2, 3, 4]);
        let (results, _) =
            josie(&storage, &IdentityTokenTable, &q, 3, false, &small_config()).unwrap();
        assert_eq!(
            results.iter().map(|r| (r.id, r.overlap)).collect::<Vec<_>>(),
            vec![(3, 4), (2, 3), (1, 2)]
        );
    }

    #[test]
    fn ignore_self_excludes_query_id() {
        let storage = InMemoryStorage::from_sets(vec![
            (1, vec![1, 2]),
            (2, vec![1, 2, 3]),
            (3, vec![1, 2, 3, 4]),
        ]);
        let q = query_of(2, &[1, 2, 3]);
        let (results, _) =
            josie(&storage, &IdentityTokenTable, &q, 2, true, &small_config()).unwrap();
        assert!(results.iter().all(|r| r.id != 2));
    }

    /// JOSIE's output multiset matches the MergeDistinctList oracle's,
    /// across a generated corpus and several values of k.
    #[test]
    fn matches_merge_distinct_list_oracle_on_random_corpora() {
        let mut rng = StdRng::seed_from_u64(7);
        for trial in 0..25 {
            let num_sets = 12;
            let vocab = 10;
            let mut sets = Vec::new();
            for set_id in 0..num_sets {
                let mut tokens: Vec<i64> =
                    (1..=vocab).filter(|_| rng.gen_bool(0.5)).collect();
                if tokens.is_empty() {
                    tokens.push(1);
                }
                tokens.sort_unstable();
                tokens.dedup();
                sets.push((set_id, tokens));
            }
            let storage = InMemoryStorage::from_sets(sets);
            let query_tokens: Vec<i64> = (1..=vocab).filter(|_| rng.gen_bool(0.6)).collect();
            let query_tokens = if query_tokens.is_empty() {
                vec![1]
            } else {
                query_tokens
            };
            let q = query_of(1000 + trial, &query_tokens);

            for k in [1usize, 3, 5] {
                let (oracle_results, _) =
                    merge_distinct_list(&storage, &IdentityTokenTable, &q, k, false).unwrap();
                let (josie_results, _) =
                    josie(&storage, &IdentityTokenTable, &q, k, false, &small_config()).unwrap();

                let to_multiset = |rs: &[SearchResult]| -> BTreeMap<(i64, i64), i64> {
                    let mut m = BTreeMap::new();
                    for r in rs {
                        *m.entry((r.id, r.overlap)).or_insert(0) += 1;
                    }
                    m
                };
                assert_eq!(
                    to_multiset(&oracle_results),
                    to_multiset(&josie_results),
                    "mismatch at trial {trial}, k={k}"
                );
            }
        }
    }

    #[test]
    fn fewer_than_k_matches_yields_fewer_than_k_results() {
        let storage = InMemoryStorage::from_sets(vec![(1, vec![1, 2])]);
        let q = query_of(999, &[1, 2]);
        let (results, _) =
            josie(&storage, &IdentityTokenTable, &q, 5, false, &small_config()).unwrap();
        assert_eq!(results.len(), 1);
    }
}
