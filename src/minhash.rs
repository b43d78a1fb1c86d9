//! A small, deterministic MinHash sketch.
//!
//! The token table's `process_and_minhash` exists to feed an external LSH
//! Ensemble index (out of scope — approximate search is not this crate's
//! job). This module only supplies the primitive that contract needs: a
//! fixed-size signature built from a seeded family of hash functions, one
//! minimum per function, updated token by token.

/// The random seed the original's signatures were built with.
pub const MINHASH_SEED: u64 = 41;
/// The number of hash functions (signature length) the original used.
pub const MINHASH_SIZE: usize = 128;

/// A MinHash signature: one minimum hash value per hash function.
pub type MinHashSignature = Vec<u64>;

/// An in-progress MinHash sketch over a stream of raw tokens.
pub struct MinHash {
    // (multiplier, increment) pairs for a family of `size` independent
    // affine hash functions over a 64-bit hash of each pushed token.
    coefficients: Vec<(u64, u64)>,
    minimums: Vec<u64>,
}

impl MinHash {
    pub fn new(seed: u64, size: usize) -> Self {
        let mut state = seed ^ 0x9e3779b97f4a7c15;
        let mut coefficients = Vec::with_capacity(size);
        for _ in 0..size {
            state = splitmix64(state);
            let a = state | 1; // must be odd to stay a permutation mod 2^64
            state = splitmix64(state);
            let b = state;
            coefficients.push((a, b));
        }
        Self {
            coefficients,
            minimums: vec![u64::MAX; size],
        }
    }

    /// Folds one raw token into the sketch.
    pub fn push(&mut self, raw_token: &[u8]) {
        let base = fnv1a_64(raw_token);
        for (i, &(a, b)) in self.coefficients.iter().enumerate() {
            let h = a.wrapping_mul(base).wrapping_add(b);
            if h < self.minimums[i] {
                self.minimums[i] = h;
            }
        }
    }

    /// The signature accumulated so far.
    pub fn signature(&self) -> MinHashSignature {
        self.minimums.clone()
    }
}

fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9e3779b97f4a7c15);
    let mut z = x;
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58476d1ce4e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d049bb133111eb);
    z ^ (z >> 31)
}

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

/// Estimated Jaccard similarity between two signatures of equal length:
/// the fraction of hash functions whose minimums agree.
pub fn estimate_jaccard(a: &MinHashSignature, b: &MinHashSignature) -> f64 {
    debug_assert_eq!(a.len(), b.len());
    let agree = a.iter().zip(b).filter(|(x, y)| x == y).count();
    agree as f64 / a.len().max(1) as f64
}
