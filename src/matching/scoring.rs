use std::collections::BTreeMap;

use crate::core::types::{BucketId, HitRecord};
use crate::matching::engine::ContainmentCounts;
use crate::sketch::minimizer::DEFAULT_KMER_SIZE;
use crate::stats::binomial::binomial_quantile;

/// Two-sided confidence for the containment lower bound
pub const DEFAULT_CONFIDENCE: f64 = 0.99995;

/// Settings for turning containment counts into scored hits
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringConfig {
    /// Largest acceptable per-base error rate; 0 disables filtering
    pub substitution_rate: f64,
    pub confidence: f64,
    pub kmer_size: usize,
    /// Buckets below this raw containment are dropped (0 keeps all)
    pub min_containment: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            substitution_rate: 0.0,
            confidence: DEFAULT_CONFIDENCE,
            kmer_size: DEFAULT_KMER_SIZE,
            min_containment: 0.0,
        }
    }
}

#[inline]
fn count_to_f64(count: u64) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    {
        count as f64
    }
}

/// Conservative containment given `num_bits` query Bloom bits.
///
/// Takes the lower tail quantile of `Binomial(num_bits, containment)` at
/// `(1 - confidence) / 2`, so the result never exceeds `containment`.
#[must_use]
pub fn lower_bound_containment(containment: f64, num_bits: usize, confidence: f64) -> f64 {
    if num_bits == 0 {
        return 0.0;
    }
    let n = num_bits as u64;
    let x = binomial_quantile((1.0 - confidence) / 2.0, n, containment);
    (count_to_f64(x) / count_to_f64(n)).min(1.0)
}

/// Per-base error rate implied by k-mer containment: `max(-ln(c) / k, 0)`.
///
/// Zero containment gives an infinite error rate.
#[must_use]
pub fn error_rate(containment: f64, kmer_size: usize) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    let k = kmer_size as f64;
    (-containment.ln() / k).max(0.0)
}

/// Percent identity for an error rate
#[must_use]
pub fn percent_identity(error_rate: f64) -> f64 {
    100.0 * (1.0 - error_rate)
}

/// Score every bucket with a non-zero weight.
///
/// With a positive substitution rate the lower-bound containment is used and
/// buckets whose error rate exceeds the rate are dropped. With a rate of zero
/// raw containment is scored and nothing is filtered.
#[must_use]
pub fn score_and_filter(
    counts: &ContainmentCounts,
    config: &ScoringConfig,
) -> BTreeMap<BucketId, HitRecord> {
    let threshold_active = config.substitution_rate > 0.0;
    let mut hits = BTreeMap::new();

    for &bucket in counts.weights.keys() {
        let containment = counts.containment(bucket);
        if containment < config.min_containment {
            continue;
        }

        let scored = if threshold_active {
            lower_bound_containment(containment, counts.selected_rows, config.confidence)
        } else {
            containment
        };
        let rate = error_rate(scored, config.kmer_size);
        if threshold_active && rate > config.substitution_rate {
            continue;
        }

        hits.insert(
            bucket,
            HitRecord::Containment {
                containment,
                score: percent_identity(rate),
            },
        );
    }

    tracing::debug!(
        "{} of {} candidate buckets passed scoring",
        hits.len(),
        counts.weights.len()
    );
    hits
}
