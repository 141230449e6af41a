//! End-to-end search: query text in, scored buckets out.

use std::collections::BTreeMap;

use serde::Serialize;
use thiserror::Error;

use crate::core::sequence::{clean_sequence, fragments, normalize, SequenceError};
use crate::core::types::{Bucket, BucketId, HitRecord, IndexName, QueryMode};
use crate::index::loader::{CancelToken, IndexLoader, IndexSource, LocalOrRemoteSource};
use crate::index::matrix::BitSlicedIndex;
use crate::index::store::IndexCatalog;
use crate::index::IndexError;
use crate::matching::engine::{EngineError, QueryEngine};
use crate::matching::scoring::{score_and_filter, ScoringConfig, DEFAULT_CONFIDENCE};
use crate::sketch::bloom::{BloomError, MembershipFilter};
use crate::sketch::minimizer::extract_minimizers;
use crate::utils::validation::{validate_substitution_rate, LengthPolicy, ValidationError};

#[derive(Error, Debug)]
pub enum SearchError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Sequence(#[from] SequenceError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Bloom(#[from] BloomError),

    #[error("Search task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl SearchError {
    /// True when the request itself was at fault
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::Sequence(_) | Self::Index(IndexError::NotFound(_))
        )
    }
}

/// One search against a named index
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub query_sequence: String,
    pub index_name: IndexName,
    /// Expected per-base divergence; 0 turns scoring thresholds off
    pub substitution_rate: f64,
    pub mode: QueryMode,
}

impl SearchRequest {
    pub fn new(query_sequence: impl Into<String>, index_name: impl Into<String>) -> Self {
        Self {
            query_sequence: query_sequence.into(),
            index_name: IndexName::new(index_name),
            substitution_rate: 0.0,
            mode: QueryMode::Containment,
        }
    }

    #[must_use]
    pub fn with_substitution_rate(mut self, rate: f64) -> Self {
        self.substitution_rate = rate;
        self
    }

    #[must_use]
    pub fn with_mode(mut self, mode: QueryMode) -> Self {
        self.mode = mode;
        self
    }
}

/// Hits of one query against one index
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryOutcome {
    pub hits: BTreeMap<BucketId, HitRecord>,
    pub num_fragments: usize,
    pub num_query_minimizers: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResponse {
    pub index: IndexName,
    pub mode: QueryMode,
    pub query_length: usize,
    pub num_fragments: usize,
    pub num_query_minimizers: usize,
    pub hits: BTreeMap<BucketId, HitRecord>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub locations: BTreeMap<BucketId, Bucket>,
}

impl SearchResponse {
    /// Hits ordered best first, ties by bucket number
    #[must_use]
    pub fn ranked(&self) -> Vec<(BucketId, &HitRecord)> {
        let mut ranked: Vec<_> = self.hits.iter().map(|(&id, hit)| (id, hit)).collect();
        ranked.sort_by(|a, b| b.1.rank_value().total_cmp(&a.1.rank_value()).then(a.0.cmp(&b.0)));
        ranked
    }
}

/// Engine-wide knobs
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchConfig {
    pub confidence: f64,
    pub min_containment: f64,
    /// Attach bucket coordinates when the index has a bucket map
    pub annotate: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            confidence: DEFAULT_CONFIDENCE,
            min_containment: 0.0,
            annotate: true,
        }
    }
}

/// Match a prepared (cleaned, uppercased) query against a loaded index.
///
/// # Errors
///
/// Returns an error if fragmenting fails or the index is incompatible with
/// the query filters.
pub fn search_index(
    index: &BitSlicedIndex,
    query: &[u8],
    mode: QueryMode,
    scoring: &ScoringConfig,
) -> Result<QueryOutcome, SearchError> {
    let params = index.params();
    let engine = QueryEngine::new(index);
    let filter_size = index.num_rows();

    let containment_of = |seq: &[u8]| -> Result<QueryOutcome, SearchError> {
        let minimizers = extract_minimizers(seq, params);
        let filter = MembershipFilter::from_minimizers(&minimizers, filter_size)?;
        let counts = engine.containment(&filter)?;
        Ok(QueryOutcome {
            hits: score_and_filter(&counts, scoring),
            num_fragments: 1,
            num_query_minimizers: minimizers.len(),
        })
    };

    match mode {
        QueryMode::Containment => containment_of(query),
        QueryMode::FragmentVote { fragment_size } => {
            let pieces = fragments(query, fragment_size)?;
            if let [only] = pieces.as_slice() {
                return containment_of(*only);
            }

            let mut num_query_minimizers = 0;
            let mut filters = Vec::with_capacity(pieces.len());
            for piece in &pieces {
                let minimizers = extract_minimizers(piece, params);
                num_query_minimizers += minimizers.len();
                filters.push(MembershipFilter::from_minimizers(&minimizers, filter_size)?);
            }

            let num_fragments = pieces.len();
            let hits = engine
                .fragment_votes(&filters)?
                .into_iter()
                .map(|(bucket, votes)| (bucket, HitRecord::votes(votes, num_fragments)))
                .collect();
            Ok(QueryOutcome {
                hits,
                num_fragments,
                num_query_minimizers,
            })
        }
    }
}

/// Searches the indexes of a catalog
#[derive(Debug)]
pub struct SearchEngine<S = LocalOrRemoteSource> {
    catalog: IndexCatalog,
    loader: IndexLoader<S>,
    config: SearchConfig,
}

impl SearchEngine<LocalOrRemoteSource> {
    pub fn new(catalog: IndexCatalog) -> Self {
        Self::with_loader(catalog, IndexLoader::new())
    }
}

impl<S: IndexSource> SearchEngine<S> {
    pub fn with_loader(catalog: IndexCatalog, loader: IndexLoader<S>) -> Self {
        Self {
            catalog,
            loader,
            config: SearchConfig::default(),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: SearchConfig) -> Self {
        self.config = config;
        self
    }

    pub fn catalog(&self) -> &IndexCatalog {
        &self.catalog
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Run one search.
    ///
    /// Input is validated before anything is fetched. Cancelling `cancel`
    /// abandons the index fetch with `IndexError::Cancelled`.
    ///
    /// # Errors
    ///
    /// Returns `SearchError` on invalid input, an unknown index, a failed or
    /// cancelled fetch, or a malformed index.
    pub async fn search(
        &self,
        request: &SearchRequest,
        cancel: &CancelToken,
    ) -> Result<SearchResponse, SearchError> {
        let query = normalize(&clean_sequence(&request.query_sequence))?;
        let substitution_rate = validate_substitution_rate(request.substitution_rate)?;
        if matches!(request.mode, QueryMode::FragmentVote { fragment_size: 0 }) {
            return Err(ValidationError::ZeroFragmentSize.into());
        }

        let entry = self.catalog.require(&request.index_name)?;
        LengthPolicy::for_mode(request.mode, entry.min_query_length, entry.max_query_length)
            .check(query.len())?;

        tracing::info!(
            "searching {} bp against '{}' ({})",
            query.len(),
            entry.name,
            request.mode
        );
        let index = self.loader.load(&self.catalog, entry, cancel).await?;

        let scoring = ScoringConfig {
            substitution_rate,
            confidence: self.config.confidence,
            kmer_size: index.params().kmer_size,
            min_containment: self.config.min_containment,
        };
        let query_length = query.len();
        let mode = request.mode;
        // Row reduction and scoring are CPU bound; keep them off the async workers
        let outcome =
            tokio::task::spawn_blocking(move || search_index(&index, &query, mode, &scoring))
                .await??;
        tracing::info!("{} buckets hit", outcome.hits.len());

        let mut locations = BTreeMap::new();
        if self.config.annotate && !outcome.hits.is_empty() {
            match self.loader.load_bucket_map(&self.catalog, entry, cancel).await {
                Ok(Some(map)) => {
                    for &bucket in outcome.hits.keys() {
                        if let Some(location) = map.describe(bucket) {
                            locations.insert(bucket, location.clone());
                        }
                    }
                }
                Ok(None) => {}
                Err(IndexError::Cancelled) => return Err(IndexError::Cancelled.into()),
                Err(e) => tracing::warn!("bucket map for '{}' unavailable: {e}", entry.name),
            }
        }

        Ok(SearchResponse {
            index: entry.name.clone(),
            mode,
            query_length,
            num_fragments: outcome.num_fragments,
            num_query_minimizers: outcome.num_query_minimizers,
            hits: outcome.hits,
            locations,
        })
    }
}
