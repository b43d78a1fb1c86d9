//! Exact top-k set-overlap search over an inverted index.
//!
//! Given a query set of tokens and a corpus indexed as token -> posting
//! list, this crate finds the `k` corpus sets with the highest token
//! overlap with the query — exactly, not approximately. Three algorithms
//! are provided, all returning identical results for the same input:
//!
//! - [`engine::merge_distinct_list`] merges every distinct posting list
//!   touched by the query and counts overlaps directly. The simplest
//!   correct algorithm and the oracle the other two are checked against.
//! - [`engine::probe_set_optimized`] adds a prefix filter (stop once no
//!   unseen candidate could beat the kth overlap) and a position filter
//!   (read only the unmatched suffix of a candidate set).
//! - [`engine::josie`] adds a cost model: every `batch_size` lists it
//!   greedily decides whether reading a candidate set now is cheaper than
//!   continuing to merge lists, converging to the same top-k with less
//!   I/O than either baseline.
//!
//! The engine depends on exactly one capability from its caller: a
//! [`storage::StorageAdapter`] that can read posting lists and set token
//! arrays. Resolving raw tokens to ids and frequencies is a second,
//! independent capability behind [`token_table::TokenTable`]. Building
//! those structures from a corpus — the index itself — lives outside this
//! crate; it answers queries against one, it doesn't build one.

pub mod candidate;
pub mod cost_model;
pub mod engine;
pub mod error;
pub mod heap;
pub mod minhash;
pub mod pruning;
pub mod query;
pub mod result;
pub mod storage;
pub mod token_table;

pub use candidate::CandidateEntry;
pub use cost_model::CostModel;
pub use error::{Result, TopkError};
pub use heap::{SearchResult, TopKHeap};
pub use query::RawTokenSet;
pub use result::{read_results_csv, write_results_csv, EngineConfig, QueryResult, UNBOUNDED_BUDGET};
pub use storage::{InMemoryStorage, ListEntry, StorageAdapter, TokenFrequencyEntry};
pub use token_table::{ProcessedQuery, ProcessedQueryWithSignature, TokenTable, TokenTableDisk, TokenTableMem};

pub use engine::josie::josie;
pub use engine::merge_distinct_list::merge_distinct_list;
pub use engine::probe_set_optimized::probe_set_optimized;
