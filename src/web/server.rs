use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, State},
    http::{HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower::limit::ConcurrencyLimitLayer;
use tower::ServiceBuilder;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::timeout::TimeoutLayer;

use crate::cli::ServeArgs;
use crate::core::types::{QueryMode, DEFAULT_FRAGMENT_SIZE};
use crate::index::loader::CancelToken;
use crate::index::store::IndexCatalog;
use crate::index::IndexError;
use crate::matching::search::{SearchEngine, SearchError, SearchRequest};
use crate::utils::validation::{validate_index_name, MAX_QUERY_LENGTH};

/// Largest accepted request body: a maximal query plus FASTA/JSON overhead
pub const MAX_REQUEST_BODY_SIZE: usize = 4 * MAX_QUERY_LENGTH;

/// Index fetches can be slow; allow more than a typical API call
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Shared application state
pub struct AppState {
    pub engine: SearchEngine,
}

/// Enhanced error response
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub error_type: String,
    pub details: Option<String>,
}

/// Body of `POST /api/search`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchBody {
    pub query_sequence: String,
    pub index_name: String,
    #[serde(default)]
    pub substitution_rate: f64,
    /// `containment` (default) or `fragment_vote`
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub fragment_size: Option<usize>,
}

impl SearchBody {
    fn query_mode(&self) -> Option<QueryMode> {
        match self.mode.as_deref() {
            None | Some("containment") => Some(QueryMode::Containment),
            Some("fragment_vote" | "fragment" | "fragments") => Some(QueryMode::FragmentVote {
                fragment_size: self.fragment_size.unwrap_or(DEFAULT_FRAGMENT_SIZE),
            }),
            Some(_) => None,
        }
    }
}

/// Create a safe error response that prevents information disclosure
/// while logging detailed errors server-side for debugging
pub fn create_safe_error_response(
    error_type: &str,
    user_message: &str,
    internal_error: Option<&str>,
) -> ErrorResponse {
    // Log detailed error server-side for debugging (not exposed to client)
    if let Some(internal_msg) = internal_error {
        tracing::error!("Internal error ({}): {}", error_type, internal_msg);
    }

    ErrorResponse {
        error: user_message.to_string(),
        error_type: error_type.to_string(),
        details: None, // Never expose internal details to prevent information disclosure
    }
}

fn error_reply(status: StatusCode, error: ErrorResponse) -> Response {
    (status, Json(error)).into_response()
}

/// Map a search failure to a status code and client-safe message
fn search_error_reply(err: &SearchError) -> Response {
    match err {
        SearchError::Validation(_) | SearchError::Sequence(_) => error_reply(
            StatusCode::BAD_REQUEST,
            create_safe_error_response("invalid_query", &err.to_string(), None),
        ),
        SearchError::Index(IndexError::NotFound(_)) => error_reply(
            StatusCode::NOT_FOUND,
            create_safe_error_response("index_not_found", &err.to_string(), None),
        ),
        SearchError::Index(IndexError::Cancelled) => error_reply(
            StatusCode::SERVICE_UNAVAILABLE,
            create_safe_error_response("cancelled", "Search was cancelled", None),
        ),
        SearchError::Index(IndexError::Fetch(_)) => error_reply(
            StatusCode::BAD_GATEWAY,
            create_safe_error_response(
                "index_unavailable",
                "The index could not be fetched",
                Some(&err.to_string()),
            ),
        ),
        _ => error_reply(
            StatusCode::INTERNAL_SERVER_ERROR,
            create_safe_error_response(
                "index_error",
                "The index could not be searched",
                Some(&err.to_string()),
            ),
        ),
    }
}

/// Run the web server
///
/// # Errors
///
/// Returns an error if the tokio runtime cannot be created or the server fails to start.
pub fn run(args: ServeArgs) -> anyhow::Result<()> {
    // Build tokio runtime
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async move { run_server(args).await })
}

/// Create the application router over the embedded catalog.
///
/// # Errors
///
/// Returns an error if the catalog cannot be loaded.
pub fn create_router() -> anyhow::Result<Router> {
    let catalog = IndexCatalog::load_embedded()?;
    create_router_with(SearchEngine::new(catalog))
}

/// Create the application router with all routes and middleware configured.
///
/// # Errors
///
/// Returns an error if the rate limiter configuration is rejected.
pub fn create_router_with(engine: SearchEngine) -> anyhow::Result<Router> {
    let state = Arc::new(AppState { engine });

    // Configure IP-based rate limiting
    let governor_conf = GovernorConfigBuilder::default()
        .per_second(10) // 10 requests per second per IP
        .burst_size(50) // Allow bursts of 50 requests
        .finish()
        .ok_or_else(|| anyhow::anyhow!("invalid rate limit configuration"))?;

    // Build router with comprehensive security layers
    let app = Router::new()
        .route("/api/search", post(search_handler))
        .route("/api/indexes", get(indexes_handler))
        .route("/api/health", get(health_handler))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                // Security headers for browser protection
                .layer(SetResponseHeaderLayer::if_not_present(
                    HeaderName::from_static("x-content-type-options"),
                    HeaderValue::from_static("nosniff"),
                ))
                .layer(SetResponseHeaderLayer::if_not_present(
                    HeaderName::from_static("x-frame-options"),
                    HeaderValue::from_static("DENY"),
                ))
                .layer(SetResponseHeaderLayer::if_not_present(
                    HeaderName::from_static("referrer-policy"),
                    HeaderValue::from_static("strict-origin-when-cross-origin"),
                ))
                // IP-based rate limiting to prevent abuse
                .layer(GovernorLayer {
                    config: Arc::new(governor_conf),
                })
                // Request timeout to prevent slow client attacks
                .layer(TimeoutLayer::with_status_code(
                    StatusCode::REQUEST_TIMEOUT,
                    REQUEST_TIMEOUT,
                ))
                // Limit concurrent requests to prevent DOS
                .layer(ConcurrencyLimitLayer::new(100))
                .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_SIZE)),
        );

    Ok(app)
}

async fn run_server(args: ServeArgs) -> anyhow::Result<()> {
    let app = match &args.catalog {
        Some(path) => create_router_with(SearchEngine::new(IndexCatalog::load_from_file(path)?))?,
        None => create_router()?,
    };

    let addr = format!("{}:{}", args.address, args.port);
    println!("Starting flashmap server at http://{addr}");

    if args.open {
        let _ = open::that(format!("http://{addr}/api/indexes"));
    }

    let listener = TcpListener::bind(&addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

/// Run a search against a catalog index
async fn search_handler(
    State(state): State<Arc<AppState>>,
    body: Result<Json<SearchBody>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => {
            return error_reply(
                rejection.status(),
                create_safe_error_response("invalid_request", &rejection.body_text(), None),
            )
        }
    };

    if let Err(e) = validate_index_name(&body.index_name) {
        return error_reply(
            StatusCode::BAD_REQUEST,
            create_safe_error_response("invalid_index_name", &e.to_string(), None),
        );
    }
    let Some(mode) = body.query_mode() else {
        return error_reply(
            StatusCode::BAD_REQUEST,
            create_safe_error_response(
                "invalid_mode",
                "Mode must be 'containment' or 'fragment_vote'",
                None,
            ),
        );
    };

    let request = SearchRequest::new(body.query_sequence, body.index_name)
        .with_substitution_rate(body.substitution_rate)
        .with_mode(mode);

    let start_time = std::time::Instant::now();
    match state.engine.search(&request, &CancelToken::never()).await {
        Ok(response) => {
            tracing::info!(
                "search against '{}' finished in {:?} with {} hits",
                response.index,
                start_time.elapsed(),
                response.hits.len()
            );
            Json(response).into_response()
        }
        Err(e) => search_error_reply(&e),
    }
}

/// Return list of indexes in catalog
async fn indexes_handler(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let indexes: Vec<serde_json::Value> = state
        .engine
        .catalog()
        .indexes
        .iter()
        .map(|entry| {
            serde_json::json!({
                "name": entry.name,
                "display_name": entry.display_name,
                "format": entry.format,
                "num_cols": entry.num_cols,
                "bloom_filter_size": entry.bloom_filter_size,
                "min_query_length": entry.min_query_length,
                "max_query_length": entry.max_query_length,
            })
        })
        .collect();

    Json(serde_json::json!({
        "count": indexes.len(),
        "indexes": indexes,
    }))
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
