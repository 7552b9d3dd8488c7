//! HTTP surface: lookup, search, health, a yt-dlp self-test and static
//! assets.
//!
//! The resolver itself is synchronous, so each handler moves its work onto
//! the blocking pool and waits for it there.

use std::{
    path::{Component, Path, PathBuf},
    sync::Arc,
};

use axum::{
    Json, Router,
    body::{Body, Bytes},
    extract::State,
    http::{Request, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use mime_guess::MimeGuess;
use serde::Serialize;
use serde_json::{Value, json};
use tokio::fs::File;
use tokio_util::io::ReaderStream;
use tracing::{error, info};

use crate::backoff::FixedBackoff;
use crate::config::RuntimeSettings;
use crate::discovery::EndpointDiscovery;
use crate::error::{SearchError, ValidationError};
use crate::extractor::{Extractor, SelfTest};
use crate::http::{HttpClient, UreqClient};
use crate::mirror::MirrorClient;
use crate::models::{SearchOutcome, VideoMetadata};
use crate::runner::{CommandRunner, SystemRunner};
use crate::search::SearchOrchestrator;
use crate::validate::is_valid_source_url;

#[derive(Clone)]
pub struct AppState {
    extractor: Arc<Extractor>,
    search: Arc<SearchOrchestrator>,
    www_root: Option<Arc<PathBuf>>,
}

impl AppState {
    pub fn new(
        extractor: Arc<Extractor>,
        search: Arc<SearchOrchestrator>,
        www_root: Option<PathBuf>,
    ) -> Self {
        Self {
            extractor,
            search,
            www_root: www_root.map(Arc::new),
        }
    }

    /// Wires the real process runner, ureq client and fixed pacing.
    pub fn from_settings(settings: &RuntimeSettings) -> Self {
        let runner: Arc<dyn CommandRunner> = Arc::new(SystemRunner);
        let http: Arc<dyn HttpClient> = Arc::new(UreqClient::new());
        let extractor = Arc::new(Extractor::new(runner, settings.ytdlp_bin.clone()));
        let search = SearchOrchestrator::new(
            extractor.clone(),
            EndpointDiscovery::new(http.clone(), settings.directory_url.clone()),
            MirrorClient::new(http),
            Arc::new(FixedBackoff::new(settings.pacing)),
        );
        Self::new(extractor, Arc::new(search), settings.www_root.clone())
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/extract", post(extract_video))
        .route("/search-videos", post(search_videos))
        .route("/health", get(health))
        .route("/test-ytdlp", get(test_ytdlp))
        .fallback(static_fallback)
        .with_state(state)
}

/// Error payload returned to clients as `{"error": message}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    /// Creates a 400 error with the provided message.
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    /// Creates a 404 error with the provided message.
    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    /// Creates a 500 error with the provided message.
    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        Self::bad_request(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

#[derive(Serialize)]
struct LookupResponse {
    success: bool,
    video: VideoMetadata,
}

#[derive(Serialize)]
struct SearchResponse {
    success: bool,
    #[serde(flatten)]
    outcome: SearchOutcome,
}

/// JSON request body read field by field, so one badly typed field does not
/// hide the others.
struct RequestBody(Value);

impl RequestBody {
    /// A missing or unparseable body reads as an empty object.
    fn parse(body: &Bytes) -> Self {
        Self(serde_json::from_slice(body).unwrap_or(Value::Null))
    }

    /// String value of `key`; absent when missing or not a string.
    fn string(&self, key: &str) -> Option<String> {
        self.0.get(key).and_then(Value::as_str).map(str::to_owned)
    }
}

/// Runs synchronous resolver work on the blocking pool.
async fn run_blocking<T, F>(task: F) -> ApiResult<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task).await.map_err(|err| {
        error!(error = %err, "blocking task failed");
        ApiError::internal("internal error")
    })
}

/// `POST /extract`: validates the URL, then resolves it through `yt-dlp`.
/// Any extraction failure is a 400 carrying the extractor's message.
async fn extract_video(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<Json<LookupResponse>> {
    let url = RequestBody::parse(&body)
        .string("url")
        .ok_or(ValidationError::MissingUrl)?;
    let url = url.trim().to_string();
    if url.is_empty() {
        return Err(ValidationError::EmptyUrl.into());
    }
    if !is_valid_source_url(Some(&url)) {
        return Err(ValidationError::InvalidUrl.into());
    }

    info!(url = %url, "extracting video");
    let extractor = state.extractor.clone();
    let video = run_blocking(move || extractor.extract_metadata(&url))
        .await?
        .map_err(|err| ApiError::bad_request(err.to_string()))?;

    Ok(Json(LookupResponse {
        success: true,
        video,
    }))
}

/// `POST /search-videos`: runs the search chain. A blank query is a 400 and
/// exhausting every source is a 500.
async fn search_videos(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<Json<SearchResponse>> {
    let request = RequestBody::parse(&body);
    let query = request.string("query").ok_or(ValidationError::MissingQuery)?;
    // A non-string instance counts as no preference.
    let instance = request.string("instance");

    info!(query = %query, instance = ?instance, "searching videos");
    let search = state.search.clone();
    let outcome = run_blocking(move || search.search(&query, instance.as_deref())).await?;

    match outcome {
        Ok(outcome) => Ok(Json(SearchResponse {
            success: true,
            outcome,
        })),
        Err(err @ SearchError::EmptyQuery) => Err(ApiError::bad_request(err.to_string())),
        Err(err @ SearchError::Exhausted) => Err(ApiError::internal(err.to_string())),
    }
}

/// `GET /health`: liveness only, touches nothing external.
async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}

/// `GET /test-ytdlp`: raw diagnostics from a fixed lookup. Tool failures are
/// reported in the body with a 200.
async fn test_ytdlp(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let extractor = state.extractor.clone();
    let report = match run_blocking(move || extractor.self_test()).await? {
        SelfTest::Completed(diagnostics) => json!(diagnostics),
        SelfTest::Failed { error, kind } => json!({ "error": error, "type": kind }),
    };
    Ok(Json(report))
}

/// Everything unrouted is served from the web root when one is configured.
async fn static_fallback(State(state): State<AppState>, req: Request<Body>) -> Response {
    let Some(root) = state.www_root.as_deref() else {
        return ApiError::not_found("endpoint not found").into_response();
    };
    match serve_www_path(root, req.uri().path()).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

async fn serve_www_path(root: &Path, request_path: &str) -> ApiResult<Response> {
    let target = resolve_www_path(root, request_path)?;
    match tokio::fs::metadata(&target).await {
        Ok(meta) if meta.is_dir() => stream_file(root.join("index.html")).await,
        Ok(_) => stream_file(target).await,
        Err(_) if should_fallback_to_index(request_path) => {
            stream_file(root.join("index.html")).await
        }
        Err(_) => Err(ApiError::not_found("file not found")),
    }
}

/// Maps a request path under `root`, rejecting `..` and absolute segments.
fn resolve_www_path(root: &Path, request_path: &str) -> ApiResult<PathBuf> {
    let trimmed = request_path.trim_start_matches('/');
    if trimmed.is_empty() {
        return Ok(root.join("index.html"));
    }
    let candidate = Path::new(trimmed);
    if candidate
        .components()
        .any(|component| !matches!(component, Component::Normal(_)))
    {
        return Err(ApiError::not_found("file not found"));
    }
    Ok(root.join(candidate))
}

/// Extension-less paths are page routes and get `index.html`.
fn should_fallback_to_index(request_path: &str) -> bool {
    Path::new(request_path.trim_start_matches('/'))
        .extension()
        .is_none()
}

async fn stream_file(path: PathBuf) -> ApiResult<Response> {
    let file = File::open(&path)
        .await
        .map_err(|_| ApiError::not_found("file not found"))?;
    let mut response = Body::from_stream(ReaderStream::new(file)).into_response();
    if let Some(mime) = MimeGuess::from_path(&path).first()
        && let Ok(value) = mime.to_string().parse()
    {
        response.headers_mut().insert(header::CONTENT_TYPE, value);
    }
    Ok(response)
}
