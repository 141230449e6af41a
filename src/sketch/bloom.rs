//! Single-hash Bloom filter over minimizers, plus the sizing policy that ties
//! the filter size to a bound on false bucket hits.
//!
//! The filter size is part of an index's identity: a query filter is only
//! comparable to an index built with exactly the same size, because its set
//! bit positions are used directly as row numbers.

use murmurhash3::murmurhash3_x86_32;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::stats::binomial::binomial_cdf;

/// Seed for the Bloom position hash (distinct role from the minimizer seed)
pub const BLOOM_SEED: u32 = 0;

/// Minimum query length (5 kbp) expressed in minimizers
pub const MIN_QUERY_MINIMIZERS: u32 = 100;

/// Upper bound on the expected number of false bucket hits per query
pub const FALSE_HIT_THRESHOLD: f64 = 1e-2;

pub const FILTER_SIZE_STEP: usize = 1_000;
pub const MAX_FILTER_SIZE: usize = 1_000_000;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum BloomError {
    #[error("Bloom filter size must be greater than zero")]
    ZeroSize,
}

/// Scheme that maps a minimizer to its Bloom position, and so to an index row.
///
/// Recorded with every index; rows filled under any other scheme cannot be
/// queried with [`MembershipFilter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BloomHash {
    /// `murmur3_x86_32` of the minimizer's decimal string with [`BLOOM_SEED`]
    #[default]
    Murmur3Decimal,
    /// Any scheme this build does not implement
    #[serde(other)]
    Unsupported,
}

impl BloomHash {
    #[must_use]
    pub fn is_supported(self) -> bool {
        self == Self::Murmur3Decimal
    }
}

impl std::fmt::Display for BloomHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Murmur3Decimal => write!(f, "murmur3_decimal"),
            Self::Unsupported => write!(f, "unsupported"),
        }
    }
}

/// Approximate membership set of minimizers, one bit per minimizer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembershipFilter {
    bits: Vec<u64>,
    size: usize,
}

impl MembershipFilter {
    /// Create an empty filter with `size` bit positions
    ///
    /// # Errors
    ///
    /// Returns `BloomError::ZeroSize` if `size` is zero.
    pub fn new(size: usize) -> Result<Self, BloomError> {
        if size == 0 {
            return Err(BloomError::ZeroSize);
        }
        Ok(Self {
            bits: vec![0u64; size.div_ceil(64)],
            size,
        })
    }

    /// Build a filter containing every minimizer in `minimizers`
    ///
    /// # Errors
    ///
    /// Returns `BloomError::ZeroSize` if `size` is zero.
    pub fn from_minimizers(minimizers: &[u32], size: usize) -> Result<Self, BloomError> {
        let mut filter = Self::new(size)?;
        for &minimizer in minimizers {
            filter.insert(minimizer);
        }
        Ok(filter)
    }

    /// Bit position of a minimizer in a filter of `size` bits.
    ///
    /// Minimizers are keyed by their decimal representation.
    #[must_use]
    pub fn position(minimizer: u32, size: usize) -> usize {
        let key = minimizer.to_string();
        murmurhash3_x86_32(key.as_bytes(), BLOOM_SEED) as usize % size
    }

    pub fn insert(&mut self, minimizer: u32) {
        let pos = Self::position(minimizer, self.size);
        self.bits[pos / 64] |= 1u64 << (pos % 64);
    }

    /// Possibly-present check (false positives, never false negatives)
    #[must_use]
    pub fn contains(&self, minimizer: u32) -> bool {
        self.is_set(Self::position(minimizer, self.size))
    }

    #[must_use]
    pub fn is_set(&self, pos: usize) -> bool {
        pos < self.size && self.bits[pos / 64] & (1u64 << (pos % 64)) != 0
    }

    /// Ascending positions of all set bits
    #[must_use]
    pub fn set_positions(&self) -> Vec<usize> {
        let mut positions = Vec::with_capacity(self.count_ones());
        for (word_idx, &word) in self.bits.iter().enumerate() {
            let mut remaining = word;
            while remaining != 0 {
                let bit = remaining.trailing_zeros() as usize;
                positions.push(word_idx * 64 + bit);
                remaining &= remaining - 1;
            }
        }
        positions
    }

    #[must_use]
    pub fn count_ones(&self) -> usize {
        self.bits.iter().map(|w| w.count_ones() as usize).sum()
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }
}

/// False positive rate of a single-hash filter: `1 - e^(-n/m)`.
///
/// A zero-sized filter reports every lookup as present.
#[must_use]
pub fn false_positive_rate(num_inserted: usize, filter_size: usize) -> f64 {
    if filter_size == 0 {
        return 1.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let ratio = num_inserted as f64 / filter_size as f64;
    1.0 - (-ratio).exp()
}

/// Probability that a minimal query reaches the containment threshold in a
/// bucket it does not occur in, from Bloom false positives alone.
#[must_use]
pub fn false_hit_probability(
    false_positive_rate: f64,
    min_query_minimizers: u32,
    containment_threshold: f64,
) -> f64 {
    let num_matching = f64::from(min_query_minimizers) * containment_threshold;
    1.0 - binomial_cdf(
        num_matching,
        u64::from(min_query_minimizers),
        false_positive_rate,
    )
}

/// Smallest filter size (multiple of 1000, up to 1,000,000) for which the
/// expected number of false bucket hits across the whole index is at most 0.01.
///
/// `max_elements` is the largest number of minimizers inserted into any one
/// bucket. Returns `None` if no size in range qualifies.
#[must_use]
pub fn compute_filter_size(
    max_elements: usize,
    containment_threshold: f64,
    total_buckets: usize,
) -> Option<usize> {
    #[allow(clippy::cast_precision_loss)]
    let buckets = total_buckets as f64;

    let size = (0..=MAX_FILTER_SIZE).step_by(FILTER_SIZE_STEP).find(|&size| {
        let fpr = false_positive_rate(max_elements, size);
        let false_hit = false_hit_probability(fpr, MIN_QUERY_MINIMIZERS, containment_threshold);
        false_hit * buckets <= FALSE_HIT_THRESHOLD
    });

    if let Some(size) = size {
        tracing::debug!("optimal bloom filter size: {size}");
    }
    size
}
