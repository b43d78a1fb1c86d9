//! `MergeDistinctList`: the baseline that simply merges every distinct
//! posting list and counts overlaps. This is the reference oracle —
//! property P1 (JOSIE's output matches this one) is checked against it.

use std::time::Instant;

use rustc_hash::FxHashMap;

use crate::engine::{check_list_entry, ActionTrace};
use crate::error::Result;
use crate::heap::{SearchResult, TopKHeap};
use crate::query::{next_distinct_list, RawTokenSet};
use crate::result::{write_result_string, QueryResult};
use crate::storage::StorageAdapter;
use crate::token_table::TokenTable;

pub fn merge_distinct_list(
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
    let mut counter: FxHashMap<i64, i64> = FxHashMap::default();
    let mut trace = ActionTrace::default();
    let mut num_list_read = 0u64;
    let mut max_list_size_read = 0i64;
    let mut max_counter_size = 0usize;

    let query_size = processed.tokens.len();
    let mut i = 0usize;
    let mut num_skipped = 0i64;
    while i < query_size {
        let token = processed.tokens[i];
        let skipped_overlap = num_skipped;

        let entries = storage.read_list(token)?;
        num_list_read += 1;
        max_list_size_read = max_list_size_read.max(entries.len() as i64);
        trace.add_read_list(entries.len());

        for entry in &entries {
            check_list_entry(entry)?;
            if ignore_self && entry.set_id == query.id {
                continue;
            }
            *counter.entry(entry.set_id).or_insert(0) += skipped_overlap + 1;
        }
        max_counter_size = max_counter_size.max(counter.len());

        let (next_i, skipped) = next_distinct_list(&processed.gids, i);
        i = next_i;
        num_skipped = skipped;
    }

    let mut heap = TopKHeap::new(k);
    for (&id, &overlap) in &counter {
        heap.push_candidate(id, overlap);
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
        num_list_read,
        max_list_size_read,
        max_counter_size,
        results: write_result_string(&results),
        actions: trace.into_string(),
        ..Default::default()
    };
    Ok((results, query_result))
}
