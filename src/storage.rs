//! The storage adapter: the only boundary the search engine depends on.
//!
//! The engine never talks to a database or a filesystem directly — it reads
//! posting lists and set-token arrays through this trait. Loading raw sets
//! into the index, assigning token ids, and materializing posting lists are
//! all external infrastructure (out of scope for this crate); what lives
//! here is the read-only contract the engine was written against, plus one
//! in-memory implementation of it that is complete enough to run real
//! queries and to back the test suite.

use rustc_hash::FxHashMap;

use crate::error::{Result, TopkError};

/// One entry of a posting list: the set containing the token, its size, and
/// the 0-based position of the token inside that set's ascending token
/// sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListEntry {
    pub set_id: i64,
    pub size: i32,
    pub match_position: i32,
}

/// A single row of the token vocabulary: a token id's global frequency and
/// the duplicate-group id it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenFrequencyEntry {
    pub token: i64,
    pub frequency: i64,
    pub gid: i64,
}

/// The read-only contract the search engine is written against.
///
/// Every method may fail with [`TopkError::Io`] — from the engine's point
/// of view, a synchronous, blocking call that happens-before the next
/// engine step. Implementations backed by a connection pool or other
/// concurrent resource are free to do whatever they need internally as
/// long as that ordering is preserved.
pub trait StorageAdapter {
    /// The full posting list for `token`, as a single atomic read. Entries
    /// are not required to be ordered by `set_id`.
    fn read_list(&self, token: i64) -> Result<Vec<ListEntry>>;

    /// All tokens of set `id`, ascending.
    fn read_set(&self, id: i64) -> Result<Vec<i64>>;

    /// Tokens of set `id` from `start_pos` (inclusive) through the end,
    /// ascending.
    fn read_set_suffix(&self, id: i64, start_pos: i32) -> Result<Vec<i64>>;

    /// Tokens of set `id` from the start through `end_pos` (inclusive),
    /// ascending.
    fn read_set_prefix(&self, id: i64, end_pos: i32) -> Result<Vec<i64>>;

    /// Tokens of set `id` in `[start_pos, end_pos)`, ascending.
    fn read_set_subset(&self, id: i64, start_pos: i32, end_pos: i32) -> Result<Vec<i64>>;

    /// Batched frequency/gid lookup for a set of already-resolved token
    /// ids, returned sorted ascending by token. Backs the disk-resident
    /// token table, which issues exactly one such range query per
    /// preprocessed input set.
    fn lookup_token_frequencies(&self, tokens: &[i64]) -> Result<Vec<TokenFrequencyEntry>>;
}

/// A complete, in-process [`StorageAdapter`]: the corpus lives in memory as
/// per-set token arrays plus materialized posting lists built from them.
///
/// This is the storage adapter the test suite and any embedding
/// application without an external index service would use.
pub struct InMemoryStorage {
    sets: FxHashMap<i64, Vec<i64>>,
    posting_lists: FxHashMap<i64, Vec<ListEntry>>,
    frequencies: FxHashMap<i64, TokenFrequencyEntry>,
}

impl InMemoryStorage {
    /// Build the posting lists and vocabulary from a corpus of
    /// `(set_id, ascending token sequence)` pairs and a per-token duplicate-
    /// group assignment. Tokens not present in `gids` get their own unique
    /// gid (no duplicate group).
    pub fn build(sets: Vec<(i64, Vec<i64>)>, gids: &FxHashMap<i64, i64>) -> Self {
        let mut posting_lists: FxHashMap<i64, Vec<ListEntry>> = FxHashMap::default();
        let mut frequency_counts: FxHashMap<i64, i64> = FxHashMap::default();
        let mut set_map: FxHashMap<i64, Vec<i64>> = FxHashMap::default();

        for (set_id, tokens) in sets {
            for (pos, &token) in tokens.iter().enumerate() {
                posting_lists.entry(token).or_default().push(ListEntry {
                    set_id,
                    size: tokens.len() as i32,
                    match_position: pos as i32,
                });
                *frequency_counts.entry(token).or_insert(0) += 1;
            }
            set_map.insert(set_id, tokens);
        }

        let frequencies = frequency_counts
            .into_iter()
            .map(|(token, frequency)| {
                let gid = *gids.get(&token).unwrap_or(&token);
                (
                    token,
                    TokenFrequencyEntry {
                        token,
                        frequency,
                        gid,
                    },
                )
            })
            .collect();

        Self {
            sets: set_map,
            posting_lists,
            frequencies,
        }
    }

    /// Convenience constructor for corpora where no two tokens share a
    /// duplicate group.
    pub fn from_sets(sets: Vec<(i64, Vec<i64>)>) -> Self {
        Self::build(sets, &FxHashMap::default())
    }

    fn set_tokens(&self, id: i64) -> Result<&[i64]> {
        self.sets
            .get(&id)
            .map(Vec::as_slice)
            .ok_or_else(|| TopkError::Io(format!("no such set: {id}")))
    }
}

impl StorageAdapter for InMemoryStorage {
    fn read_list(&self, token: i64) -> Result<Vec<ListEntry>> {
        Ok(self.posting_lists.get(&token).cloned().unwrap_or_default())
    }

    fn read_set(&self, id: i64) -> Result<Vec<i64>> {
        Ok(self.set_tokens(id)?.to_vec())
    }

    fn read_set_suffix(&self, id: i64, start_pos: i32) -> Result<Vec<i64>> {
        let tokens = self.set_tokens(id)?;
        let start = start_pos.max(0) as usize;
        Ok(tokens.get(start..).unwrap_or(&[]).to_vec())
    }

    fn read_set_prefix(&self, id: i64, end_pos: i32) -> Result<Vec<i64>> {
        let tokens = self.set_tokens(id)?;
        let end = ((end_pos + 1).max(0) as usize).min(tokens.len());
        Ok(tokens[..end].to_vec())
    }

    fn read_set_subset(&self, id: i64, start_pos: i32, end_pos: i32) -> Result<Vec<i64>> {
        let tokens = self.set_tokens(id)?;
        let start = start_pos.max(0) as usize;
        let end = (end_pos.max(0) as usize).min(tokens.len());
        if start >= end {
            return Ok(Vec::new());
        }
        Ok(tokens[start..end].to_vec())
    }

    fn lookup_token_frequencies(&self, tokens: &[i64]) -> Result<Vec<TokenFrequencyEntry>> {
        let mut found: Vec<TokenFrequencyEntry> = tokens
            .iter()
            .filter_map(|t| self.frequencies.get(t).copied())
            .collect();
        found.sort_unstable_by_key(|e| e.token);
        found.dedup_by_key(|e| e.token);
        Ok(found)
    }
}
