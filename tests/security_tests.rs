//! Security Test Suite
//!
//! Validates the hardening of the HTTP API: input validation, error
//! sanitization and response headers.

mod common;

use std::net::SocketAddr;

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{header, Request, StatusCode};
use common::{fixture, text};
use flashmap::web::server::create_router_with;
use flashmap::SearchEngine;
use tower::ServiceExt;

fn search_request(body: String) -> Request<Body> {
    let mut request = Request::post("/api/search")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body))
        .unwrap();
    request
        .extensions_mut()
        .insert(ConnectInfo(SocketAddr::from(([10, 0, 0, 1], 50_000))));
    request
}

/// Test index name validation
#[test]
fn test_index_name_validation_security() {
    use flashmap::utils::validation::{validate_index_name, ValidationError};

    assert!(validate_index_name("hg38").is_ok());
    assert!(validate_index_name("GRCh38_no-alt.v2").is_ok());

    // Test directory traversal prevention
    assert_eq!(
        validate_index_name("../etc/passwd"),
        Err(ValidationError::InvalidIndexName)
    );
    assert_eq!(
        validate_index_name("/etc/passwd"),
        Err(ValidationError::InvalidIndexName)
    );
    assert_eq!(
        validate_index_name("hg38\0"),
        Err(ValidationError::InvalidIndexName)
    );

    // Test empty and oversized names
    assert_eq!(validate_index_name(""), Err(ValidationError::EmptyIndexName));
    assert_eq!(
        validate_index_name(&"a".repeat(1_000)),
        Err(ValidationError::IndexNameTooLong)
    );
}

/// Test error message sanitization
#[test]
fn test_error_sanitization() {
    use flashmap::web::server::create_safe_error_response;

    // Test that internal error details are not exposed
    let error_response = create_safe_error_response(
        "index_error",
        "The index could not be searched",
        Some("/srv/indexes/hg38.bin: payload checksum mismatch"),
    );

    assert_eq!(error_response.error, "The index could not be searched");
    assert_eq!(error_response.error_type, "index_error");
    assert!(
        error_response.details.is_none(),
        "Internal details should never be exposed"
    );

    let error_response = create_safe_error_response("invalid_query", "User message", None);
    assert!(error_response.details.is_none());
}

/// Path traversal through the index name never reaches the catalog
#[tokio::test]
async fn test_traversal_index_name_rejected() {
    let fx = fixture();
    let app = create_router_with(SearchEngine::new(fx.catalog())).unwrap();

    let body = serde_json::json!({
        "querySequence": text(&fx.chr1[..6_000]),
        "indexName": "../../etc/passwd",
    });
    let response = app.oneshot(search_request(body.to_string())).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

/// Corrupted indexes produce a generic message without paths or checksums
#[tokio::test]
async fn test_internal_errors_are_not_disclosed() {
    let fx = fixture();
    let path = fx.path("demo.fmi");
    let mut bytes = std::fs::read(&path).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0xff;
    std::fs::write(&path, bytes).unwrap();
    let app = create_router_with(SearchEngine::new(fx.catalog())).unwrap();

    let body = serde_json::json!({
        "querySequence": text(&fx.chr1[..6_000]),
        "indexName": "demo",
    });
    let response = app.oneshot(search_request(body.to_string())).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8_lossy(&bytes);
    assert!(!text.contains("demo.fmi"));
    assert!(!text.to_lowercase().contains("checksum"));
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert!(json["details"].is_null());
}

/// Malformed JSON is rejected with a structured error
#[tokio::test]
async fn test_malformed_json_rejected() {
    let fx = fixture();
    let app = create_router_with(SearchEngine::new(fx.catalog())).unwrap();

    let response = app
        .oneshot(search_request("{\"querySequence\": ".to_string()))
        .await
        .unwrap();
    assert!(response.status().is_client_error());

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["error_type"], "invalid_request");
}

/// Test security headers on every response
#[tokio::test]
async fn test_security_headers() {
    let fx = fixture();
    let app = create_router_with(SearchEngine::new(fx.catalog())).unwrap();

    let mut request = Request::get("/api/health").body(Body::empty()).unwrap();
    request
        .extensions_mut()
        .insert(ConnectInfo(SocketAddr::from(([10, 0, 0, 2], 50_000))));
    let response = app.oneshot(request).await.unwrap();

    let headers = response.headers();
    assert_eq!(headers["x-content-type-options"], "nosniff");
    assert_eq!(headers["x-frame-options"], "DENY");
    assert_eq!(
        headers["referrer-policy"],
        "strict-origin-when-cross-origin"
    );
}
