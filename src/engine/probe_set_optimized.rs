//! `ProbeSetOptimized`: the baseline that combines the prefix filter (stop
//! once no unseen candidate could beat the kth overlap) with the position
//! filter (read only the unmatched suffix of a candidate set), plus the
//! distinct-list optimization.

use std::time::Instant;

use rustc_hash::FxHashSet;

use crate::engine::{check_list_entry, overlap, ActionTrace};
use crate::error::Result;
use crate::heap::{SearchResult, TopKHeap};
use crate::query::{next_distinct_list, RawTokenSet};
use crate::result::{write_result_string, QueryResult};
use crate::storage::StorageAdapter;
use crate::token_table::TokenTable;

pub fn probe_set_optimized(
    storage: &dyn StorageAdapter,
    token_table: &dyn TokenTable,
    query: &RawTokenSet,
    k: usize,
    ignore_self: bool,
) -> Result<(Vec<SearchResult>, QueryResult)> {
    let preproc_start = Instant::now();
    let processed = token_table.process(query)?;
    let preproc_duration_ms = preproc_start.elapsed().as_millis() as i64;

    let start = Instant::now();
    let mut ignores: FxHashSet<i64> = FxHashSet::default();
    if ignore_self {
        ignores.insert(query.id);
    }
    let mut heap = TopKHeap::new(k);
    let mut trace = ActionTrace::default();
    let mut num_list_read = 0u64;
    let mut num_set_read = 0u64;
    let mut max_list_size_read = 0i64;
    let mut max_set_size_read = 0i64;

    let tokens = &processed.tokens;
    let query_size = tokens.len();
    let mut i = 0usize;
    let mut num_skipped = 0i64;

    while i < query_size {
        let token = tokens[i];
        let skipped_overlap = num_skipped;
        let remaining_query = (query_size - i) as i64 + skipped_overlap;

        if heap.kth_overlap() >= remaining_query {
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
            ignores.insert(entry.set_id);

            let remaining_candidate = (entry.size - entry.match_position) as i64 + skipped_overlap;
            if heap.kth_overlap() >= remaining_query.min(remaining_candidate) {
                continue;
            }

            let suffix = storage.read_set_suffix(entry.set_id, entry.match_position)?;
            num_set_read += 1;
            max_set_size_read = max_set_size_read.max(suffix.len() as i64);

            let o = overlap(&suffix, &tokens[i..]) + skipped_overlap;
            trace.add_read_set(suffix.len(), o);
            heap.push_candidate(entry.set_id, o);
        }

        let (next_i, skipped) = next_distinct_list(&processed.gids, i);
        i = next_i;
        num_skipped = skipped;
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
        ignore_size: ignores.len(),
        results: write_result_string(&results),
        actions: trace.into_string(),
        ..Default::default()
    };
    Ok((results, query_result))
}
