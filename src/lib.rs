//! # flashmap
//!
//! Approximate search of long DNA sequences against a large reference.
//!
//! The reference is cut into fixed-size buckets. Each bucket's minimizers are
//! inserted into a single-hash Bloom filter, and the filters are stored as the
//! columns of a bit-sliced matrix: row `r` holds bit `r` of every bucket's
//! filter. A query is sketched the same way, and only the rows its own filter
//! sets need to be read to score every bucket at once.
//!
//! ## Features
//!
//! - **Containment search**: fraction of query minimizers present per bucket,
//!   converted to an estimated percent identity
//! - **Fragment voting**: count of fixed-size query fragments fully present per bucket
//! - **Index building**: FASTA in, framed index file and bucket map out
//! - **Local or remote indexes**: catalog entries may point to files or URLs
//! - **Refinement**: optional MashMap alignment of the best buckets
//!
//! ## Example
//!
//! ```rust,no_run
//! use flashmap::{IndexCatalog, SearchEngine, SearchRequest};
//! use flashmap::index::loader::CancelToken;
//!
//! # async fn demo(query: String) -> anyhow::Result<()> {
//! let catalog = IndexCatalog::load_embedded()?;
//! let engine = SearchEngine::new(catalog);
//!
//! let request = SearchRequest::new(query, "hg38").with_substitution_rate(0.05);
//! let response = engine.search(&request, &CancelToken::never()).await?;
//!
//! for (bucket, hit) in response.ranked() {
//!     println!("bucket {bucket}: {}", hit.score_label());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`core`]: Sequence helpers and shared types
//! - [`sketch`]: Minimizers and Bloom filters
//! - [`stats`]: Binomial and Mash-distance statistics
//! - [`index`]: Bit-sliced index format, catalog, loading and building
//! - [`matching`]: Query engine, scoring and end-to-end search
//! - [`refine`]: Alignment of top hits with an external mapper
//! - [`parsing`]: FASTA input
//! - [`cli`]: Command-line interface implementation
//! - [`web`]: HTTP search API

pub mod cli;
pub mod core;
pub mod index;
pub mod matching;
pub mod parsing;
pub mod refine;
pub mod sketch;
pub mod stats;
pub mod utils;
pub mod web;

// Re-export commonly used types for convenience
pub use crate::core::types::*;
pub use index::matrix::BitSlicedIndex;
pub use index::store::{IndexCatalog, IndexEntry};
pub use matching::search::{SearchEngine, SearchError, SearchRequest, SearchResponse};
