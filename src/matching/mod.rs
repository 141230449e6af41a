//! Query evaluation against a bit-sliced index.
//!
//! - [`engine`]: row selection, column Hamming weights and fragment AND-reduction
//! - [`scoring`]: containment lower bounds, error rates and threshold filtering
//! - [`search`]: the orchestration entry point ([`SearchEngine`])
//!
//! ## Query modes
//!
//! 1. **Containment**: the whole query becomes one Bloom filter; each bucket is
//!    scored by the fraction of the query's set bits it also has, converted to
//!    an estimated percent identity
//! 2. **Fragment vote**: the query is cut into fixed-size fragments; a bucket
//!    gets one vote for every fragment whose bits it has all of
//!
//! ## Example
//!
//! ```rust,no_run
//! use flashmap::index::loader::CancelToken;
//! use flashmap::index::store::IndexCatalog;
//! use flashmap::matching::search::{SearchEngine, SearchRequest};
//!
//! # async fn run(query: String) -> anyhow::Result<()> {
//! let engine = SearchEngine::new(IndexCatalog::load_embedded()?);
//! let request = SearchRequest::new(query, "hg38").with_substitution_rate(0.05);
//! let response = engine.search(&request, &CancelToken::never()).await?;
//!
//! for (bucket, hit) in response.ranked() {
//!     println!("{bucket}\t{}", hit.score_label());
//! }
//! # Ok(())
//! # }
//! ```

pub mod engine;
pub mod scoring;
pub mod search;

pub use search::{SearchEngine, SearchError, SearchRequest, SearchResponse};
