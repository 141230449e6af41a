//! Window size estimation for MashMap-style refinement.
//!
//! After a bucket is found, the query is mapped against the bucket sequence with
//! an external MashMap run. MashMap's sensitivity depends on its sketch window;
//! this module picks the smallest sketch that keeps the expected number of
//! random mappings under a p-value cutoff, for a given identity and query length.
//! Distances follow the Mash model: `d = -ln(2j / (1 + j)) / k`.

use crate::stats::binomial::binomial_cdf;

/// Confidence used when relaxing the minimum hit count
pub const RELAXED_CONFIDENCE_INTERVAL: f64 = 0.75;

#[inline]
fn count_to_f64(count: u64) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    {
        count as f64
    }
}

/// Jaccard estimate to Mash distance in `[0, 1]`
#[must_use]
pub fn jaccard_to_mash_distance(jaccard: f64, kmer_size: u32) -> f64 {
    if jaccard <= 0.0 {
        return 1.0;
    }
    if jaccard >= 1.0 {
        return 0.0;
    }
    (-1.0 / f64::from(kmer_size)) * (2.0 * jaccard / (1.0 + jaccard)).ln()
}

/// Mash distance to Jaccard estimate
#[must_use]
pub fn mash_distance_to_jaccard(distance: f64, kmer_size: u32) -> f64 {
    1.0 / (2.0 * (f64::from(kmer_size) * distance).exp() - 1.0)
}

/// Lower bound on a Mash distance `d` within the confidence interval `ci`,
/// for a sketch of `sketch_size` minimizers.
///
/// Searches upward from the expected shared count for the largest count whose
/// upper-tail probability is still above `(1 - ci) / 2`.
#[must_use]
pub fn distance_lower_bound(distance: f64, sketch_size: u64, kmer_size: u32, ci: f64) -> f64 {
    let one_sided = (1.0 - ci) / 2.0;
    let jaccard = mash_distance_to_jaccard(distance, kmer_size);

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let mut x = ((count_to_f64(sketch_size) * jaccard).ceil() as u64).max(1);
    while x <= sketch_size {
        let at_least_x = 1.0 - binomial_cdf(count_to_f64(x - 1), sketch_size, jaccard);
        if at_least_x < one_sided {
            x -= 1;
            break;
        }
        x += 1;
    }
    let x = x.min(sketch_size);

    jaccard_to_mash_distance(count_to_f64(x) / count_to_f64(sketch_size), kmer_size)
}

/// Minimum number of shared minimizers needed to reach `identity` percent
#[must_use]
pub fn estimate_minimum_hits(sketch_size: u64, kmer_size: u32, identity: f64) -> u64 {
    let distance = 1.0 - identity / 100.0;
    let jaccard = mash_distance_to_jaccard(distance, kmer_size);
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let hits = (count_to_f64(sketch_size) * jaccard).ceil() as u64;
    hits
}

/// Minimum shared minimizers such that the upper identity bound at 75%
/// confidence still reaches `identity`.
#[must_use]
pub fn estimate_minimum_hits_relaxed(sketch_size: u64, kmer_size: u32, identity: f64) -> u64 {
    let start = estimate_minimum_hits(sketch_size, kmer_size, identity);
    let mut relaxed = start;

    for i in (0..=start).rev() {
        let distance = jaccard_to_mash_distance(
            count_to_f64(i) / count_to_f64(sketch_size),
            kmer_size,
        );
        let lower = distance_lower_bound(
            distance,
            sketch_size,
            kmer_size,
            RELAXED_CONFIDENCE_INTERVAL,
        );
        if 100.0 * (1.0 - lower) >= identity {
            relaxed = i;
        } else {
            break;
        }
    }

    relaxed
}

/// Expected number of random mappings of a query of `query_length` against a
/// reference of `reference_length` at the given sketch size and identity.
#[must_use]
pub fn estimate_p_value(
    sketch_size: u64,
    kmer_size: u32,
    alphabet_size: u32,
    identity: f64,
    query_length: u64,
    reference_length: f64,
) -> f64 {
    let kmer_space = f64::from(alphabet_size).powi(i32::try_from(kmer_size).unwrap_or(i32::MAX));

    // Chance of a random k-mer hit in a query-sized sequence
    let p = 1.0 / (1.0 + kmer_space / count_to_f64(query_length));
    let random_jaccard = p * p / (p + p - p * p);

    let x = estimate_minimum_hits_relaxed(sketch_size, kmer_size, identity);
    let at_least_x = if x == 0 {
        1.0
    } else {
        1.0 - binomial_cdf(count_to_f64(x - 1), sketch_size, random_jaccard)
    };

    reference_length * at_least_x
}

/// Window size for a reference sketch so that a `segment_length` query at
/// `identity` percent maps with p-value at most `p_value_cutoff`.
///
/// Candidate sketch sizes are 1, 2, 5, then every multiple of 10 below the
/// segment length. The result is `2 * segment_length / sketch` clamped to
/// `[1, segment_length]`, or `None` if no candidate meets the cutoff.
#[must_use]
pub fn estimate_window_size(
    p_value_cutoff: f64,
    kmer_size: u32,
    alphabet_size: u32,
    identity: f64,
    segment_length: u64,
    reference_length: f64,
) -> Option<f64> {
    let candidates = [1, 2, 5]
        .into_iter()
        .chain((10..segment_length).step_by(10));

    for sketch_size in candidates {
        let p_value = estimate_p_value(
            sketch_size,
            kmer_size,
            alphabet_size,
            identity,
            segment_length,
            reference_length,
        );
        if p_value <= p_value_cutoff {
            let window = 2.0 * count_to_f64(segment_length) / count_to_f64(sketch_size);
            return Some(window.clamp(1.0, count_to_f64(segment_length)));
        }
    }

    None
}
