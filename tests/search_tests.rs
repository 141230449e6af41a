//! End-to-end search tests
//!
//! Builds a small index on disk, describes it in a catalog file, and runs the
//! search engine against it the way the CLI and web server do.

mod common;

use std::path::Path;

use common::{fixture, text};
use flashmap::index::loader::CancelToken;
use flashmap::index::store::IndexCatalog;
use flashmap::index::IndexError;
use flashmap::utils::validation::ValidationError;
use flashmap::{HitRecord, QueryMode, SearchEngine, SearchError, SearchRequest};

fn engine(catalog_path: &Path) -> SearchEngine {
    SearchEngine::new(IndexCatalog::load_from_file(catalog_path).unwrap())
}

#[tokio::test]
async fn test_containment_search_from_catalog() {
    let fx = fixture();
    let engine = engine(&fx.catalog_path);

    let request = SearchRequest::new(text(&fx.chr1[22_000..32_000]), "demo");
    let response = engine.search(&request, &CancelToken::never()).await.unwrap();

    assert_eq!(response.query_length, 10_000);
    let (best, hit) = response.ranked()[0];
    assert_eq!(best, 1);
    assert!((hit.rank_value() - 100.0).abs() < f64::EPSILON);
    assert_eq!(response.locations[&1].name(), "chr1:20000-40000");
}

#[tokio::test]
async fn test_fasta_header_and_lowercase_are_accepted() {
    let fx = fixture();
    let engine = engine(&fx.catalog_path);

    let body = text(&fx.chr1[42_000..48_000]).to_lowercase();
    let wrapped: Vec<&str> = body
        .as_bytes()
        .chunks(60)
        .map(|c| std::str::from_utf8(c).unwrap())
        .collect();
    let query = format!(">query some description\n{}\n", wrapped.join("\n"));

    let response = engine
        .search(&SearchRequest::new(query, "demo"), &CancelToken::never())
        .await
        .unwrap();
    assert_eq!(response.ranked()[0].0, 2);
}

#[tokio::test]
async fn test_substitution_rate_filters_background() {
    let fx = fixture();
    let engine = engine(&fx.catalog_path);

    let request = SearchRequest::new(text(&fx.chr1[2_000..12_000]), "demo")
        .with_substitution_rate(0.05);
    let response = engine.search(&request, &CancelToken::never()).await.unwrap();
    assert_eq!(response.hits.keys().copied().collect::<Vec<_>>(), vec![0]);
}

#[tokio::test]
async fn test_fragment_vote_search() {
    let fx = fixture();
    let engine = engine(&fx.catalog_path);

    // Below the containment minimum, but five whole fragments
    let request = SearchRequest::new(text(&fx.chr1[1_000..3_600]), "demo")
        .with_mode(QueryMode::fragment_vote());
    let response = engine.search(&request, &CancelToken::never()).await.unwrap();

    assert_eq!(response.num_fragments, 5);
    assert_eq!(response.hits[&0], HitRecord::votes(5, 5));
    let json = serde_json::to_value(&response.hits[&0]).unwrap();
    assert_eq!(json["score"], "5/5");
}

#[tokio::test]
async fn test_short_query_is_rejected_before_loading() {
    let fx = fixture();
    // Remove the index file: validation must fail without touching it
    std::fs::remove_file(fx.path("demo.fmi")).unwrap();
    let engine = engine(&fx.catalog_path);

    let request = SearchRequest::new(text(&fx.chr1[..1_000]), "demo");
    let err = engine
        .search(&request, &CancelToken::never())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SearchError::Validation(ValidationError::QueryLength { len: 1_000, .. })
    ));
    assert_eq!(
        err.to_string(),
        "Query length must be between 5kbp and 300kbp (got 1000 bp)"
    );
    assert!(err.is_client_error());
}

#[tokio::test]
async fn test_unknown_index() {
    let fx = fixture();
    let engine = engine(&fx.catalog_path);

    let request = SearchRequest::new(text(&fx.chr1[..6_000]), "mm39");
    let err = engine
        .search(&request, &CancelToken::never())
        .await
        .unwrap_err();
    assert!(matches!(err, SearchError::Index(IndexError::NotFound(_))));
}

#[tokio::test]
async fn test_missing_index_file() {
    let fx = fixture();
    std::fs::remove_file(fx.path("demo.fmi")).unwrap();
    let engine = engine(&fx.catalog_path);

    let request = SearchRequest::new(text(&fx.chr1[..6_000]), "demo");
    let err = engine
        .search(&request, &CancelToken::never())
        .await
        .unwrap_err();
    assert!(matches!(err, SearchError::Index(IndexError::NotFound(_))));
}

#[tokio::test]
async fn test_corrupted_index_is_reported() {
    let fx = fixture();
    let path = fx.path("demo.fmi");
    let mut bytes = std::fs::read(&path).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0xff;
    std::fs::write(&path, bytes).unwrap();
    let engine = engine(&fx.catalog_path);

    let request = SearchRequest::new(text(&fx.chr1[..6_000]), "demo");
    let err = engine
        .search(&request, &CancelToken::never())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SearchError::Index(IndexError::ChecksumMismatch { .. })
    ));
}

#[tokio::test]
async fn test_cancelled_search() {
    let fx = fixture();
    let engine = engine(&fx.catalog_path);

    let (handle, cancel) = CancelToken::pair();
    handle.cancel();
    let request = SearchRequest::new(text(&fx.chr1[..6_000]), "demo");
    let err = engine.search(&request, &cancel).await.unwrap_err();
    assert!(matches!(err, SearchError::Index(IndexError::Cancelled)));
}

#[tokio::test]
async fn test_missing_bucket_map_still_returns_hits() {
    let fx = fixture();
    std::fs::remove_file(fx.path("demo.buckets.json")).unwrap();
    let engine = engine(&fx.catalog_path);

    let request = SearchRequest::new(text(&fx.chr1[22_000..32_000]), "demo");
    let response = engine.search(&request, &CancelToken::never()).await.unwrap();
    assert!(response.hits.contains_key(&1));
    assert!(response.locations.is_empty());
}

#[tokio::test(flavor = "current_thread")]
async fn test_concurrent_searches_on_single_threaded_runtime() {
    let fx = fixture();
    let engine = engine(&fx.catalog_path);

    let containment = SearchRequest::new(text(&fx.chr1[22_000..32_000]), "demo");
    let votes = SearchRequest::new(text(&fx.chr1[19_000..21_000]), "demo")
        .with_mode(QueryMode::fragment_vote());
    let never = CancelToken::never();

    let (first, second) = tokio::join!(
        engine.search(&containment, &never),
        engine.search(&votes, &never)
    );
    assert_eq!(first.unwrap().ranked()[0].0, 1);
    let second = second.unwrap();
    assert_eq!(second.num_fragments, 4);
    assert_eq!(second.hits[&0], HitRecord::votes(2, 4));
    assert_eq!(second.hits[&1], HitRecord::votes(2, 4));
}
