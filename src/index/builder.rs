//! Build a bit-sliced index from reference sequences.
//!
//! Each contig is cut into buckets of `bucket_size` bases. A bucket's minimizers
//! are taken from its interval extended by `overlap` bases into the next one, so
//! a query straddling a boundary is still wholly contained in one bucket.

use std::path::Path;

use thiserror::Error;

use crate::core::types::{Bucket, BucketId};
use crate::index::buckets::BucketMap;
use crate::index::matrix::{BitSlicedIndex, WORD_BITS};
use crate::index::store::{IndexEntry, IndexFormat};
use crate::index::IndexError;
use crate::parsing::fasta::{read_fasta_file, ParseError, SequenceRecord};
use crate::sketch::bloom::{compute_filter_size, MembershipFilter, MAX_FILTER_SIZE};
use crate::sketch::minimizer::{extract_minimizers, MinimizerParams};

pub const DEFAULT_BUCKET_SIZE: usize = 10_000_000;
pub const DEFAULT_CONTAINMENT_THRESHOLD: f64 = 0.8;

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("Failed to read reference: {0}")]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error("Bucket size must be greater than zero")]
    ZeroBucketSize,

    #[error("No Bloom filter size up to {MAX_FILTER_SIZE} bounds false hits for {max_elements} minimizers per bucket; use smaller buckets")]
    NoFilterSize { max_elements: usize },

    #[error("Reference contains no sequence to index")]
    Empty,
}

#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub bucket_size: usize,
    pub overlap: usize,
    /// Fixed Bloom filter size; computed from the largest bucket when `None`
    pub filter_size: Option<usize>,
    /// Containment level the computed filter size is tuned for
    pub containment_threshold: f64,
    pub params: MinimizerParams,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            bucket_size: DEFAULT_BUCKET_SIZE,
            overlap: 0,
            filter_size: None,
            containment_threshold: DEFAULT_CONTAINMENT_THRESHOLD,
            params: MinimizerParams::default(),
        }
    }
}

/// A freshly built index and the metadata describing its columns
#[derive(Debug, Clone)]
pub struct BuiltIndex {
    pub index: BitSlicedIndex,
    pub buckets: BucketMap,
    /// Distinct minimizers in the fullest bucket
    pub max_bucket_minimizers: usize,
}

impl BuiltIndex {
    #[must_use]
    pub fn num_buckets(&self) -> usize {
        self.buckets.len()
    }

    /// Write the index file and, if given, the bucket map JSON
    ///
    /// # Errors
    ///
    /// Returns an error if either file cannot be written.
    pub fn write(&self, index_path: &Path, bucket_map_path: Option<&Path>) -> Result<(), BuildError> {
        self.index.write_to(index_path)?;
        if let Some(path) = bucket_map_path {
            std::fs::write(path, self.buckets.to_json()?).map_err(IndexError::from)?;
        }
        Ok(())
    }

    /// Catalog entry pointing at the written files
    #[must_use]
    pub fn catalog_entry(
        &self,
        name: &str,
        display_name: &str,
        index_path: &str,
        bucket_map_path: Option<&str>,
    ) -> IndexEntry {
        let mut entry = IndexEntry::new(name, display_name, index_path);
        entry.format = IndexFormat::Framed;
        entry.num_cols = Some(self.index.num_cols());
        entry.bloom_filter_size = Some(self.index.num_rows());
        entry.bucket_map = bucket_map_path.map(str::to_string);
        entry.minimizer = *self.index.params();
        entry.bloom_hash = Some(self.index.bloom_hash());
        entry
    }
}

/// Build an index from a FASTA file
///
/// # Errors
///
/// Returns an error if the file cannot be parsed or the index cannot be sized.
pub fn build_from_fasta(path: &Path, options: &BuildOptions) -> Result<BuiltIndex, BuildError> {
    let records = read_fasta_file(path)?;
    tracing::info!("read {} sequences from {}", records.len(), path.display());
    build_index(&records, options)
}

/// Build an index from in-memory sequences
///
/// # Errors
///
/// Returns `BuildError::ZeroBucketSize`, `BuildError::Empty` when every record is
/// empty, or `BuildError::NoFilterSize` when no filter size qualifies.
pub fn build_index(
    records: &[SequenceRecord],
    options: &BuildOptions,
) -> Result<BuiltIndex, BuildError> {
    if options.bucket_size == 0 {
        return Err(BuildError::ZeroBucketSize);
    }

    let mut buckets = BucketMap::new();
    let mut bucket_minimizers: Vec<Vec<u32>> = Vec::new();

    for record in records {
        let len = record.sequence.len();
        let mut start = 0;
        while start < len {
            let end = (start + options.bucket_size).min(len);
            let extended_end = (end + options.overlap).min(len);

            let mut minimizers =
                extract_minimizers(&record.sequence[start..extended_end], &options.params);
            minimizers.sort_unstable();
            minimizers.dedup();

            let id: BucketId = bucket_minimizers.len();
            buckets.insert(id, Bucket::new(&record.name, start as u64, end as u64));
            bucket_minimizers.push(minimizers);
            start = end;
        }
    }

    if bucket_minimizers.is_empty() {
        return Err(BuildError::Empty);
    }

    let num_buckets = bucket_minimizers.len();
    let max_elements = bucket_minimizers.iter().map(Vec::len).max().unwrap_or(0);
    let filter_size = match options.filter_size {
        Some(size) => size,
        None => compute_filter_size(max_elements, options.containment_threshold, num_buckets)
            .filter(|&size| size > 0)
            .ok_or(BuildError::NoFilterSize { max_elements })?,
    };
    let num_cols = num_buckets.div_ceil(WORD_BITS) * WORD_BITS;
    tracing::info!(
        "indexing {num_buckets} buckets (max {max_elements} minimizers) into {filter_size} x {num_cols} matrix"
    );

    let mut index = BitSlicedIndex::zeroed(filter_size, num_cols, options.params)?;
    for (bucket, minimizers) in bucket_minimizers.iter().enumerate() {
        for &minimizer in minimizers {
            index.set(MembershipFilter::position(minimizer, filter_size), bucket);
        }
    }
    index.seal();

    Ok(BuiltIndex {
        index,
        buckets,
        max_bucket_minimizers: max_elements,
    })
}
