//! Winnowed minimizer extraction.
//!
//! Each k-mer is hashed on both strands with 32-bit MurmurHash3 and the smaller
//! value is kept, so the sketch does not depend on which strand the query came
//! from. A monotonic deque keeps the minimum over the trailing `w` k-mers.
//!
//! Any exact match of `w + k - 1` bases between two sequences guarantees at
//! least one shared minimizer.

use std::collections::VecDeque;

use murmurhash3::murmurhash3_x86_32;
use serde::{Deserialize, Serialize};

use crate::core::sequence::reverse_complement;

pub const DEFAULT_WINDOW_SIZE: usize = 100;
pub const DEFAULT_KMER_SIZE: usize = 16;
pub const DEFAULT_SEED: u32 = 42;

/// Parameters of the (w, k) winnowing scheme.
///
/// These must match the parameters the index was built with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinimizerParams {
    pub window_size: usize,
    pub kmer_size: usize,
    pub seed: u32,
}

impl Default for MinimizerParams {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_WINDOW_SIZE,
            kmer_size: DEFAULT_KMER_SIZE,
            seed: DEFAULT_SEED,
        }
    }
}

/// 32-bit MurmurHash3 of a k-mer
#[inline]
#[must_use]
pub fn kmer_hash(kmer: &[u8], seed: u32) -> u32 {
    murmurhash3_x86_32(kmer, seed)
}

/// Extract canonical (w, k)-minimizers from a nucleotide sequence.
///
/// Input is uppercased first. Consecutive windows that share a minimizer emit
/// it once. Returns an empty vector when the sequence holds fewer than `w`
/// k-mers.
#[must_use]
pub fn extract_minimizers(seq: &[u8], params: &MinimizerParams) -> Vec<u32> {
    let k = params.kmer_size;
    let w = params.window_size;
    if k == 0 || w == 0 || seq.len() < k {
        return Vec::new();
    }

    let upper: Vec<u8> = seq.iter().map(u8::to_ascii_uppercase).collect();
    let reverse = reverse_complement(&upper);
    let len = upper.len();

    let mut deque: VecDeque<(u32, usize)> = VecDeque::with_capacity(w);
    let mut minimizers = Vec::new();

    for i in 0..=(len - k) {
        let forward_hash = kmer_hash(&upper[i..i + k], params.seed);
        // Same bases as the forward k-mer, read from the other strand
        let reverse_hash = kmer_hash(&reverse[len - i - k..len - i], params.seed);
        let hash = forward_hash.min(reverse_hash);

        while deque.front().is_some_and(|&(_, offset)| offset + w <= i) {
            deque.pop_front();
        }
        while deque.back().is_some_and(|&(back, _)| back >= hash) {
            deque.pop_back();
        }
        deque.push_back((hash, i));

        if i + 1 >= w {
            if let Some(&(front, _)) = deque.front() {
                if minimizers.last() != Some(&front) {
                    minimizers.push(front);
                }
            }
        }
    }

    minimizers
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Deterministic pseudo-random sequence (64-bit LCG, bits 33-34 pick the base)
    fn lcg_sequence(len: usize, mut state: u64) -> Vec<u8> {
        (0..len)
            .map(|_| {
                state = state
                    .wrapping_mul(6_364_136_223_846_793_005)
                    .wrapping_add(1_442_695_040_888_963_407);
                b"ACGT"[((state >> 33) & 3) as usize]
            })
            .collect()
    }

    #[test]
    fn test_kmer_hash_reference_values() {
        assert_eq!(kmer_hash(b"hello", 0), 0x248b_fa47);
        assert_eq!(kmer_hash(b"", 0), 0);
    }

    #[test]
    fn test_short_sequence_is_empty() {
        let params = MinimizerParams::default();
        assert!(extract_minimizers(b"", &params).is_empty());
        assert!(extract_minimizers(b"ACGTACGTACGTACG", &params).is_empty());
        // 16 <= len < w + k - 1: k-mers exist but no full window
        assert!(extract_minimizers(&b"ACGT".repeat(20), &params).is_empty());
    }

    #[test]
    fn test_periodic_sequence_has_single_minimizer() {
        let seq = b"ACGTTGCAAGGCTTACGGATCCATGA".repeat(8);
        let seq = &seq[..200];
        let minimizers = extract_minimizers(seq, &MinimizerParams::default());
        assert_eq!(minimizers, vec![66_942_497]);
    }

    #[test]
    fn test_random_sequence_reference_output() {
        let seq = lcg_sequence(1000, 12345);
        let minimizers = extract_minimizers(&seq, &MinimizerParams::default());
        assert_eq!(minimizers.len(), 20);
        assert_eq!(
            &minimizers[..5],
            &[36_468_751, 87_928_782, 116_674_397, 35_120_948, 38_786_650]
        );
        assert!(minimizers.len() <= seq.len() - DEFAULT_KMER_SIZE + 1);
    }

    #[test]
    fn test_strand_independence() {
        let params = MinimizerParams::default();
        for state in [1, 7, 12345, 987_654_321] {
            let seq = lcg_sequence(2_500, state);
            let forward = extract_minimizers(&seq, &params);
            let reverse = extract_minimizers(&reverse_complement(&seq), &params);

            let mut expected = forward.clone();
            expected.reverse();
            assert_eq!(reverse, expected);

            let mut a = forward;
            let mut b = reverse;
            a.sort_unstable();
            b.sort_unstable();
            assert_eq!(a, b);
        }
    }

    #[test]
    fn test_case_insensitive() {
        let params = MinimizerParams::default();
        let seq = lcg_sequence(600, 42);
        let lower: Vec<u8> = seq.iter().map(u8::to_ascii_lowercase).collect();
        assert_eq!(
            extract_minimizers(&seq, &params),
            extract_minimizers(&lower, &params)
        );
    }

    #[test]
    fn test_no_adjacent_duplicates() {
        let params = MinimizerParams {
            window_size: 10,
            ..MinimizerParams::default()
        };
        let seq = lcg_sequence(3_000, 99);
        let minimizers = extract_minimizers(&seq, &params);
        assert!(!minimizers.is_empty());
        assert!(minimizers.windows(2).all(|w| w[0] != w[1]));
    }

    #[test]
    fn test_window_of_one_keeps_every_change() {
        let params = MinimizerParams {
            window_size: 1,
            ..MinimizerParams::default()
        };
        let seq = lcg_sequence(100, 5);
        let minimizers = extract_minimizers(&seq, &params);
        // Every k-mer is its own window; only identical neighbours collapse
        assert!(minimizers.len() <= 100 - 16 + 1);
        assert!(minimizers.len() > 80);
    }
}
