//! The per-query result record and the tunables the engine is configured
//! with.

use serde::{Deserialize, Serialize};

use crate::cost_model::CostModel;
use crate::error::{Result, TopkError};
use crate::heap::SearchResult;

/// A very large but platform-independent stand-in for "no budget limit".
/// Using `i64::MAX` directly (rather than relying on a platform word size)
/// keeps the sentinel's meaning identical across architectures.
pub const UNBOUNDED_BUDGET: i64 = i64::MAX;

/// The tunables a query is run with (§6).
#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    pub cost_model: CostModel,
    /// Number of distinct posting lists merged per batch before JOSIE
    /// re-evaluates whether to keep merging or start probing sets.
    pub batch_size: i64,
    /// Cap on `num_candidate_expensive * num_candidates` during the greedy
    /// probe phase; `0` forces fast estimation for every candidate,
    /// [`UNBOUNDED_BUDGET`] forces expensive estimation throughout.
    pub expensive_estimation_budget: i64,
}

impl EngineConfig {
    pub fn new(cost_model: CostModel, batch_size: i64) -> Self {
        Self {
            cost_model,
            batch_size,
            expensive_estimation_budget: UNBOUNDED_BUDGET,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new(CostModel::default(), 20)
    }
}

/// Per-query experiment row, mirroring the original's CSV-serializable
/// `experimentResult`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryResult {
    pub query_id: i64,
    pub query_size: usize,
    pub query_num_token: usize,
    pub num_result: usize,
    pub duration_ms: i64,
    pub preproc_duration_ms: i64,
    pub num_set_read: u64,
    pub num_list_read: u64,
    /// Kept for CSV-schema parity with the original row; no read primitive
    /// in this crate reports a byte count, so this is always `0`.
    pub num_byte_read: u64,
    pub max_set_size_read: i64,
    pub max_list_size_read: i64,
    pub max_counter_size: usize,
    pub ignore_size: usize,
    /// Trace of reads: `l<len>` for a list read, `s<size>o<overlap>` for a
    /// set read.
    pub actions: String,
    /// `(s{id}o{overlap})*`, ordered by descending overlap.
    pub results: String,
    /// Trace of benefit/cost pairs JOSIE's greedy phase computed, as
    /// `l<benefit>c<cost>s<benefit>c<cost>` per decision.
    pub benefit_cost: String,
    pub lsh_duration_ms: i64,
    pub lsh_precision: f64,
}

/// Renders results as `(s{id}o{overlap})*`, ordered as given (callers pass
/// already-descending-by-overlap results).
pub fn write_result_string(results: &[SearchResult]) -> String {
    let mut s = String::new();
    for r in results {
        s.push_str(&format!("s{}o{}", r.id, r.overlap));
    }
    s
}

/// Parses a string produced by [`write_result_string`].
pub fn parse_result_string(s: &str) -> Vec<SearchResult> {
    if s.is_empty() {
        return Vec::new();
    }
    s.split('s')
        .filter(|chunk| !chunk.is_empty())
        .map(|chunk| {
            let mut parts = chunk.splitn(2, 'o');
            let id = parts.next().unwrap_or("0").parse().unwrap_or(0);
            let overlap = parts.next().unwrap_or("0").parse().unwrap_or(0);
            SearchResult { id, overlap }
        })
        .collect()
}

/// Appends a batch of query results to a CSV writer, one row per result,
/// mirroring the original's `gocsv`-based `writeExperimentResults`.
pub fn write_results_csv<W: std::io::Write>(writer: W, results: &[QueryResult]) -> Result<()> {
    let mut w = csv::Writer::from_writer(writer);
    for r in results {
        w.serialize(r)
            .map_err(|e| TopkError::Io(format!("csv write: {e}")))?;
    }
    w.flush().map_err(|e| TopkError::Io(format!("csv flush: {e}")))
}

/// Reads a batch of query results previously written by
/// [`write_results_csv`].
pub fn read_results_csv<R: std::io::Read>(reader: R) -> Result<Vec<QueryResult>> {
    let mut r = csv::Reader::from_reader(reader);
    r.deserialize()
        .map(|row| row.map_err(|e| TopkError::Io(format!("csv read: {e}"))))
        .collect()
}
