//! Token table: translates a raw query into canonical token ids,
//! duplicate-group ids, and per-token global frequencies.
//!
//! Two implementations are substitutable behind the same [`TokenTable`]
//! capability trait — an in-memory one that holds its own hash-to-token
//! vocabulary, and a disk-resident one that delegates the lookup to the
//! [`StorageAdapter`] in a single batched call. Both must return identical
//! `(tokens, counts, gids)` for the same input; the storage handle itself
//! never leaks into the search engine, which only ever sees this trait.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::error::Result;
use crate::minhash::{MinHash, MinHashSignature, MINHASH_SEED, MINHASH_SIZE};
use crate::query::RawTokenSet;
use crate::storage::StorageAdapter;

/// `process`'s result: three vectors of equal length, sorted ascending by
/// token, with equal-gid runs contiguous.
pub struct ProcessedQuery {
    pub tokens: Vec<i64>,
    pub counts: Vec<i64>,
    pub gids: Vec<i64>,
}

/// `process_and_minhash`'s result: the resolved token ids (ascending, not
/// deduplicated by gid) and a MinHash signature over the raw tokens — the
/// primitive the external LSH Ensemble collaborator needs.
pub struct ProcessedQueryWithSignature {
    pub tokens: Vec<i64>,
    pub signature: MinHashSignature,
}

/// The capability every query-preprocessing backend must provide.
pub trait TokenTable {
    fn process(&self, query: &RawTokenSet) -> Result<ProcessedQuery>;
    fn process_and_minhash(&self, query: &RawTokenSet) -> Result<ProcessedQueryWithSignature>;
}

/// A vocabulary entry: the canonical token id and duplicate-group id a raw
/// token hashes to.
#[derive(Debug, Clone, Copy)]
struct TokenMapEntry {
    token: i64,
    gid: i64,
}

/// FNV-1a 64-bit, matching the hash the original used to key its
/// raw-token-to-entry map.
fn fnv1a_64(bytes: &[u8]) -> u64 {
    const OFFSET_BASIS: u64 = 0xcbf29ce484222325;
    const PRIME: u64 = 0x100000001b3;
    let mut hash = OFFSET_BASIS;
    for &b in bytes {
        hash ^= b as u64;
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}

/// Memory-resident token table: the whole vocabulary (raw-token hash to
/// `(token, gid)`, and per-gid frequency) lives in process memory. Building
/// this map from a corpus is external infrastructure (out of scope); what
/// this type owns is the map itself plus the `process`/`process_and_minhash`
/// methods queries are run through.
pub struct TokenTableMem {
    token_map: FxHashMap<u64, TokenMapEntry>,
    /// Indexed by gid.
    frequencies: Vec<i64>,
    ignore_self: bool,
}

impl TokenTableMem {
    pub fn new(
        token_map: FxHashMap<u64, (i64, i64)>,
        frequencies: Vec<i64>,
        ignore_self: bool,
    ) -> Self {
        let token_map = token_map
            .into_iter()
            .map(|(hash, (token, gid))| (hash, TokenMapEntry { token, gid }))
            .collect();
        Self {
            token_map,
            frequencies,
            ignore_self,
        }
    }

    fn lookup(&self, raw_token: &[u8]) -> Option<(TokenMapEntry, i64)> {
        let entry = *self.token_map.get(&fnv1a_64(raw_token))?;
        let frequency = *self.frequencies.get(entry.gid as usize)?;
        Some((entry, frequency))
    }
}

impl TokenTable for TokenTableMem {
    fn process(&self, query: &RawTokenSet) -> Result<ProcessedQuery> {
        let mut tokens = Vec::new();
        let mut counts = Vec::new();
        let mut gids = Vec::new();

        for raw_token in &query.raw_tokens {
            let Some((entry, frequency)) = self.lookup(raw_token) else {
                continue;
            };
            // A post-decrement frequency of 0 means the token only exists
            // in the query itself: drop it rather than keep a zero-count
            // entry.
            if self.ignore_self && frequency < 2 {
                continue;
            }
            tokens.push(entry.token);
            counts.push(frequency - 1);
            gids.push(entry.gid);
        }

        let mut order: Vec<usize> = (0..tokens.len()).collect();
        order.sort_unstable_by_key(|&i| tokens[i]);
        Ok(ProcessedQuery {
            tokens: order.iter().map(|&i| tokens[i]).collect(),
            counts: order.iter().map(|&i| counts[i]).collect(),
            gids: order.iter().map(|&i| gids[i]).collect(),
        })
    }

    fn process_and_minhash(&self, query: &RawTokenSet) -> Result<ProcessedQueryWithSignature> {
        let mut tokens = Vec::new();
        let mut mh = MinHash::new(MINHASH_SEED, MINHASH_SIZE);

        for raw_token in &query.raw_tokens {
            let Some((entry, frequency)) = self.lookup(raw_token) else {
                continue;
            };
            if self.ignore_self && frequency < 2 {
                continue;
            }
            tokens.push(entry.token);
            mh.push(raw_token);
        }

        tokens.sort_unstable();
        Ok(ProcessedQueryWithSignature {
            tokens,
            signature: mh.signature(),
        })
    }
}

/// Disk-resident token table: issues one batched frequency/gid lookup
/// through the storage adapter per query instead of holding the whole
/// vocabulary in memory.
pub struct TokenTableDisk {
    storage: Arc<dyn StorageAdapter + Send + Sync>,
    ignore_self: bool,
}

impl TokenTableDisk {
    pub fn new(storage: Arc<dyn StorageAdapter + Send + Sync>, ignore_self: bool) -> Self {
        Self {
            storage,
            ignore_self,
        }
    }
}

impl TokenTable for TokenTableDisk {
    fn process(&self, query: &RawTokenSet) -> Result<ProcessedQuery> {
        let entries = self.storage.lookup_token_frequencies(&query.tokens)?;
        // Already sorted ascending by token (the storage contract's single
        // range query guarantees this), so no further sort is needed here
        // — unlike the memory-resident variant, which sorts after the fact.
        let mut tokens = Vec::with_capacity(entries.len());
        let mut counts = Vec::with_capacity(entries.len());
        let mut gids = Vec::with_capacity(entries.len());
        for e in entries {
            if self.ignore_self && e.frequency <= 1 {
                continue;
            }
            tokens.push(e.token);
            counts.push(e.frequency - 1);
            gids.push(e.gid);
        }
        Ok(ProcessedQuery {
            tokens,
            counts,
            gids,
        })
    }

    fn process_and_minhash(&self, query: &RawTokenSet) -> Result<ProcessedQueryWithSignature> {
        let entries = self.storage.lookup_token_frequencies(&query.tokens)?;
        let qualifies: FxHashMap<i64, i64> =
            entries.into_iter().map(|e| (e.token, e.frequency)).collect();

        let mut tokens = Vec::new();
        let mut mh = MinHash::new(MINHASH_SEED, MINHASH_SIZE);
        for (token, raw_token) in query.tokens.iter().zip(&query.raw_tokens) {
            let Some(&frequency) = qualifies.get(token) else {
                continue;
            };
            if self.ignore_self && frequency <= 1 {
                continue;
            }
            tokens.push(*token);
            mh.push(raw_token);
        }
        tokens.sort_unstable();
        Ok(ProcessedQueryWithSignature {
            tokens,
            signature: mh.signature(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vocab() -> (FxHashMap<u64, (i64, i64)>, Vec<i64>) {
        // tokens "a"->1(gid0), "b"->2(gid1), "c"->3(gid1) (b,c share a gid)
        let mut map = FxHashMap::default();
        map.insert(fnv1a_64(b"a"), (1, 0));
        map.insert(fnv1a_64(b"b"), (2, 1));
        map.insert(fnv1a_64(b"c"), (3, 1));
        let frequencies = vec![3, 5]; // gid0 freq 3, gid1 freq 5
        (map, frequencies)
    }

    #[test]
    fn mem_table_sorts_by_token_and_shares_gid_frequency() {
        let (map, freqs) = vocab();
        let tb = TokenTableMem::new(map, freqs, false);
        let query = RawTokenSet {
            id: 0,
            tokens: vec![],
            raw_tokens: vec![b"c".to_vec(), b"a".to_vec(), b"b".to_vec()],
        };
        let out = tb.process(&query).unwrap();
        assert_eq!(out.tokens, vec![1, 2, 3]);
        assert_eq!(out.counts, vec![2, 4, 4]);
        assert_eq!(out.gids, vec![0, 1, 1]);
    }

    #[test]
    fn mem_table_drops_self_only_tokens_when_ignoring_self() {
        let mut map = FxHashMap::default();
        map.insert(fnv1a_64(b"solo"), (9, 0));
        let tb = TokenTableMem::new(map, vec![1], true);
        let query = RawTokenSet {
            id: 0,
            tokens: vec![],
            raw_tokens: vec![b"solo".to_vec()],
        };
        let out = tb.process(&query).unwrap();
        assert!(out.tokens.is_empty());
    }

    #[test]
    fn unknown_raw_tokens_are_skipped() {
        let (map, freqs) = vocab();
        let tb = TokenTableMem::new(map, freqs, false);
        let query = RawTokenSet {
            id: 0,
            tokens: vec![],
            raw_tokens: vec![b"a".to_vec(), b"not-in-vocab".to_vec()],
        };
        let out = tb.process(&query).unwrap();
        assert_eq!(out.tokens, vec![1]);
    }
}
