use clap::Args;

use crate::cli::OutputFormat;
use crate::index::builder::DEFAULT_CONTAINMENT_THRESHOLD;
use crate::sketch::bloom::{
    compute_filter_size, false_hit_probability, false_positive_rate, MAX_FILTER_SIZE,
    MIN_QUERY_MINIMIZERS,
};
use crate::stats::window::estimate_window_size;

/// Helper function to convert usize count to f64 with explicit precision loss allowance
#[inline]
fn count_to_f64(count: usize) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    {
        count as f64
    }
}

#[derive(Args)]
pub struct FilterSizeArgs {
    /// Largest number of minimizers inserted into one bucket
    #[arg(long, required = true)]
    pub max_elements: usize,

    /// Number of buckets (columns) in the index
    #[arg(long, required = true)]
    pub buckets: usize,

    /// Containment a false hit would have to reach
    #[arg(long, default_value_t = DEFAULT_CONTAINMENT_THRESHOLD)]
    pub containment: f64,
}

#[derive(Args)]
pub struct WindowSizeArgs {
    /// Minimum percent identity of a mapping
    #[arg(long, default_value = "95")]
    pub identity: f64,

    /// Query segment length in bases
    #[arg(long, default_value = "5000")]
    pub segment_length: u64,

    /// Reference length in bases
    #[arg(long, default_value = "3e9")]
    pub reference_length: f64,

    /// Largest acceptable p-value of a random mapping
    #[arg(long, default_value = "1e-3")]
    pub p_value: f64,

    #[arg(long, default_value = "16")]
    pub kmer_size: u32,

    #[arg(long, default_value = "4")]
    pub alphabet_size: u32,
}

/// Run the filter-size command
///
/// # Errors
///
/// Returns an error if no filter size up to the maximum qualifies.
pub fn run_filter_size(args: &FilterSizeArgs, format: OutputFormat) -> anyhow::Result<()> {
    let Some(size) = compute_filter_size(args.max_elements, args.containment, args.buckets) else {
        anyhow::bail!(
            "No Bloom filter size up to {MAX_FILTER_SIZE} keeps expected false hits below 0.01 \
             for {} minimizers per bucket across {} buckets",
            args.max_elements,
            args.buckets
        );
    };

    let fpr = false_positive_rate(args.max_elements, size);
    let expected_false_hits = false_hit_probability(fpr, MIN_QUERY_MINIMIZERS, args.containment)
        * count_to_f64(args.buckets);

    match format {
        OutputFormat::Text => {
            println!("Bloom filter size: {size}");
            println!("False positive rate: {fpr:.6}");
            println!("Expected false bucket hits per query: {expected_false_hits:.3e}");
        }
        OutputFormat::Json => {
            let json = serde_json::json!({
                "filter_size": size,
                "false_positive_rate": fpr,
                "expected_false_hits": expected_false_hits,
            });
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        OutputFormat::Tsv => {
            println!("filter_size\tfalse_positive_rate\texpected_false_hits");
            println!("{size}\t{fpr}\t{expected_false_hits}");
        }
    }
    Ok(())
}

/// Run the window-size command
///
/// # Errors
///
/// Returns an error if no sketch size meets the p-value cutoff.
pub fn run_window_size(args: &WindowSizeArgs, format: OutputFormat) -> anyhow::Result<()> {
    let Some(window) = estimate_window_size(
        args.p_value,
        args.kmer_size,
        args.alphabet_size,
        args.identity,
        args.segment_length,
        args.reference_length,
    ) else {
        anyhow::bail!(
            "No sketch size reaches p-value {} for {} bp segments at {}% identity",
            args.p_value,
            args.segment_length,
            args.identity
        );
    };

    match format {
        OutputFormat::Text => println!("Window size: {window}"),
        OutputFormat::Json => {
            let json = serde_json::json!({
                "window_size": window,
                "identity": args.identity,
                "segment_length": args.segment_length,
                "reference_length": args.reference_length,
                "p_value": args.p_value,
            });
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        OutputFormat::Tsv => {
            println!("window_size\tidentity\tsegment_length");
            println!("{window}\t{}\t{}", args.identity, args.segment_length);
        }
    }
    Ok(())
}
