//! Refinement of bucket hits with an external aligner.
//!
//! A bucket hit says a query lies somewhere inside a multi-megabase interval.
//! Mapping the query against just that interval's sequence recovers its exact
//! position. The aligner is treated as a black box behind [`SequenceAligner`].

pub mod mashmap;

use serde::Serialize;
use thiserror::Error;

use crate::core::types::Bucket;

#[derive(Error, Debug)]
pub enum RefineError {
    #[error("Failed to run aligner: {0}")]
    Io(#[from] std::io::Error),

    #[error("Aligner exited with {status}: {stderr}")]
    AlignerFailed { status: String, stderr: String },

    #[error("Malformed aligner output on line {line}: {reason}")]
    MalformedOutput { line: usize, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Strand {
    #[serde(rename = "+")]
    Forward,
    #[serde(rename = "-")]
    Reverse,
}

impl std::fmt::Display for Strand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Forward => write!(f, "+"),
            Self::Reverse => write!(f, "-"),
        }
    }
}

/// One mapping reported by the aligner, in bucket-local coordinates
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlignmentHit {
    pub query_name: String,
    pub query_length: u64,
    pub query_start: u64,
    pub query_end: u64,
    pub strand: Strand,
    pub ref_name: String,
    pub ref_length: u64,
    pub ref_start: u64,
    pub ref_end: u64,
    /// Estimated percent identity
    pub identity: f64,
}

/// Maps a query against a reference sequence
pub trait SequenceAligner {
    /// # Errors
    ///
    /// Returns `RefineError` if the aligner cannot be run or its output
    /// cannot be read.
    fn align(&self, reference: &[u8], query: &[u8]) -> Result<Vec<AlignmentHit>, RefineError>;
}

/// A refined hit placed back on the genome
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MappedRegion {
    pub ref_name: String,
    pub start: u64,
    pub end: u64,
    pub query_start: u64,
    pub query_end: u64,
    pub strand: Strand,
    pub identity: f64,
}

impl MappedRegion {
    /// Display name in `ref:start-end` form
    #[must_use]
    pub fn name(&self) -> String {
        format!("{}:{}-{}", self.ref_name, self.start, self.end)
    }
}

/// Shift a bucket-local hit to genome coordinates
#[must_use]
pub fn to_mapped_region(bucket: &Bucket, hit: &AlignmentHit) -> MappedRegion {
    MappedRegion {
        ref_name: bucket.ref_name.clone(),
        start: bucket.bucket_start + hit.ref_start,
        end: bucket.bucket_start + hit.ref_end,
        query_start: hit.query_start,
        query_end: hit.query_end,
        strand: hit.strand,
        identity: hit.identity,
    }
}
