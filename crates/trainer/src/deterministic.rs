//! Deterministic utilities for reproducible training
//!
//! Row hashing for seed-driven shuffles and the tie-breaking rule used when
//! ranking weak learners, so identical inputs give identical models.

use symboost_graph::{NodeId, Value};

const PRIME1: u64 = 0x9E37_79B1_85EB_CA87;
const PRIME2: u64 = 0xC2B2_AE3D_27D4_EB4F;
const PRIME3: u64 = 0x1656_67B1_9E37_79F9;
const PRIME5: u64 = 0x85EB_CA77_C2B2_AE63;

/// xxhash64-style mixing over 64-bit words.
pub fn xxhash64(words: impl IntoIterator<Item = u64>, seed: u64) -> u64 {
    let mut h = seed.wrapping_add(PRIME5);

    for word in words {
        h = h.wrapping_add(word.wrapping_mul(PRIME3));
        h = h.rotate_left(17).wrapping_mul(PRIME2);
    }

    h ^= h >> 33;
    h = h.wrapping_mul(PRIME1);
    h ^= h >> 29;
    h = h.wrapping_mul(PRIME2);
    h ^= h >> 32;

    h
}

fn value_word(value: &Value) -> u64 {
    match value {
        Value::Missing => u64::MAX,
        Value::Bool(b) => *b as u64,
        Value::Num(x) => x.to_bits(),
    }
}

/// Hash of one example; `position` keeps duplicate rows apart.
pub fn row_hash(row: &[Value], position: usize, seed: u64) -> u64 {
    let words = row
        .iter()
        .map(value_word)
        .chain(std::iter::once(position as u64));
    xxhash64(words, seed)
}

/// Relative slack under which two accumulated weight sums count as equal.
pub const SCORE_TOLERANCE: f64 = 1e-12;

/// Whether `candidate` beats `current` by more than accumulated rounding.
///
/// Scores are sums of normalized example weights, so mathematically equal
/// splits can differ in the last bits depending on summation order.
pub fn exceeds(candidate: f64, current: f64) -> bool {
    candidate > current + SCORE_TOLERANCE * current.abs().max(1.0)
}

/// Ranking key of a scored weak learner.
///
/// A higher score wins; scores equal within [`SCORE_TOLERANCE`] go to the
/// smaller node id, which is the one the universe created first.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CandidateRank {
    pub score: f64,
    pub node: NodeId,
}

impl CandidateRank {
    pub fn new(score: f64, node: NodeId) -> Self {
        Self { score, node }
    }

    pub fn outranks(&self, other: &CandidateRank) -> bool {
        exceeds(self.score, other.score)
            || (!exceeds(other.score, self.score) && self.node < other.node)
    }
}
