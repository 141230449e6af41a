//! Bit-sliced index storage, configuration and construction.
//!
//! An index is a bit matrix with one row per Bloom filter position and one
//! column per bucket (a fixed-size interval of the reference). Bit `(r, b)` is
//! set when some minimizer of bucket `b` hashes to Bloom position `r`. A query's
//! Bloom filter therefore selects rows, and the columns of those rows say which
//! buckets share its minimizers.
//!
//! - [`matrix`]: the in-memory matrix and its self-describing file format
//! - [`store`]: the JSON catalog naming the available indexes
//! - [`loader`]: async, cancellable fetching of index files (local or HTTP)
//! - [`buckets`]: bucket metadata (`row -> refName:start-end`) for presentation
//! - [`builder`]: building an index from a FASTA file
//!
//! ## Example
//!
//! ```rust,no_run
//! use flashmap::index::store::IndexCatalog;
//! use flashmap::core::types::IndexName;
//!
//! let catalog = IndexCatalog::load_embedded().unwrap();
//! let entry = catalog.get(&IndexName::new("hg38")).unwrap();
//! println!("{} -> {}", entry.name, entry.path);
//! ```

pub mod buckets;
pub mod builder;
pub mod loader;
pub mod matrix;
pub mod store;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Index not found: {0}")]
    NotFound(String),

    #[error("Malformed index: {0}")]
    Malformed(String),

    #[error("Index checksum mismatch (expected {expected}, found {found})")]
    ChecksumMismatch { expected: String, found: String },

    #[error("Failed to read index: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to fetch index: {0}")]
    Fetch(String),

    #[error("Index fetch cancelled")]
    Cancelled,

    #[error("Failed to encode or decode index header: {0}")]
    Header(#[from] bincode::Error),

    #[error("Failed to parse index metadata: {0}")]
    Json(#[from] serde_json::Error),
}
