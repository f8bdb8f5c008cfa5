//! HTTP request handlers for the compression GUI.
//!
//! # Endpoints
//!
//! - `GET /` - The GUI page
//! - `GET /health` - Health check
//! - `GET /api/browse?path=` - Directory listing for the path picker
//! - `POST /api/compress` - Compress, verify and retain a file or folder
//! - `GET /api/progress` - Progress of the running operation
//! - `POST /api/verify` - Verify an original/compressed pair
//! - `GET /api/diff?original=&compressed=&frame=` - Verification plot (PNG)

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, error, info, warn};

use crate::batch::{BatchReport, FileManager, ProgressEvent, ProgressSink, Retention};
use crate::compress::{is_compressed_output, CompressionMethod};
use crate::error::{
    BatchError, CompressError, FormatError, IoError, StackError, TiffError, VerifyError,
};
use crate::format::has_tiff_extension;
use crate::verify::{TiffVerifier, VerificationReport};

// =============================================================================
// Application State
// =============================================================================

/// Shared state passed to all handlers via Axum's State extractor.
#[derive(Clone)]
pub struct AppState {
    /// Held for the duration of a compress or verify operation
    pub job_lock: Arc<tokio::sync::Mutex<()>>,

    /// Progress of the current (or last) compress operation
    pub progress: Arc<Mutex<ProgressState>>,

    /// Directory the path picker opens in
    pub start_dir: PathBuf,
}

impl AppState {
    pub fn new(start_dir: impl Into<PathBuf>) -> Self {
        Self {
            job_lock: Arc::new(tokio::sync::Mutex::new(())),
            progress: Arc::new(Mutex::new(ProgressState::default())),
            start_dir: start_dir.into(),
        }
    }

    pub fn progress(&self) -> MutexGuard<'_, ProgressState> {
        lock(&self.progress)
    }

    /// Take the job lock, or fail with `409 Conflict`.
    fn try_begin_job(&self) -> Result<OwnedMutexGuard<()>, ApiError> {
        Arc::clone(&self.job_lock)
            .try_lock_owned()
            .map_err(|_| ApiError::Busy)
    }
}

fn lock(progress: &Mutex<ProgressState>) -> MutexGuard<'_, ProgressState> {
    progress.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Snapshot served by `GET /api/progress`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProgressState {
    pub running: bool,
    pub percent: u8,
    pub status: String,
    pub current: Option<PathBuf>,
    pub log: Vec<String>,
}

impl ProgressState {
    /// Clear the previous run and mark a new one as started.
    pub fn begin(&mut self) {
        *self = ProgressState {
            running: true,
            status: "Processing...".to_string(),
            ..ProgressState::default()
        };
    }

    pub fn apply(&mut self, event: ProgressEvent) {
        match event {
            ProgressEvent::Started { .. } => self.running = true,
            ProgressEvent::FileStarted { index, total, path } => {
                self.status = format!("Processing file {index} of {total}");
                self.current = Some(path);
            }
            ProgressEvent::Percent(percent) => self.percent = percent,
            ProgressEvent::Log(line) => self.log.push(line),
            ProgressEvent::Finished => {
                self.running = false;
                self.percent = 100;
                self.current = None;
                self.status = "Compression completed!".to_string();
            }
        }
    }

    pub fn fail(&mut self, message: &str) {
        self.running = false;
        self.current = None;
        self.status = "Error occurred!".to_string();
        self.log.push(format!("An error occurred: {message}"));
    }
}

/// Feeds batch progress into the shared [`ProgressState`].
struct SharedProgress(Arc<Mutex<ProgressState>>);

impl ProgressSink for SharedProgress {
    fn emit(&mut self, event: ProgressEvent) {
        lock(&self.0).apply(event);
    }
}

// =============================================================================
// Request Parameters
// =============================================================================

/// Query parameters for `GET /api/browse`.
#[derive(Debug, Deserialize)]
pub struct BrowseQuery {
    /// Directory to list (defaults to the start directory)
    #[serde(default)]
    pub path: Option<String>,
}

/// Body of `POST /api/compress`.
#[derive(Debug, Deserialize)]
pub struct CompressRequest {
    /// File or directory to process
    pub path: String,

    /// `zip` (default), `lzw` or `packbits`
    #[serde(default)]
    pub method: Option<String>,

    /// `delete` (default), `backup` or `keep-both`
    #[serde(default)]
    pub retention: Option<String>,

    /// Required with `backup` retention
    #[serde(default)]
    pub backup_dir: Option<String>,
}

/// Body of `POST /api/verify`.
#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    pub original: String,
    pub compressed: String,
}

/// Query parameters for `GET /api/diff`.
#[derive(Debug, Deserialize)]
pub struct DiffQuery {
    pub original: String,
    pub compressed: String,
    #[serde(default)]
    pub frame: usize,
}

// =============================================================================
// Response Types
// =============================================================================

/// JSON error response returned for all error conditions.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error type identifier (e.g., "not_found", "busy")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// HTTP status code
    pub status: u16,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>, status: StatusCode) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: status.as_u16(),
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// One row of the path picker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BrowseEntry {
    pub name: String,
    pub path: PathBuf,
    /// `"dir"` or `"tiff"`
    pub kind: &'static str,
    /// Already an output of a compression run
    pub compressed: bool,
}

/// Response from `GET /api/browse`.
#[derive(Debug, Serialize)]
pub struct BrowseResponse {
    pub path: PathBuf,
    pub parent: Option<PathBuf>,
    pub entries: Vec<BrowseEntry>,
}

/// Response from `POST /api/verify`.
#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub passed: bool,
    pub failed_checks: Vec<&'static str>,
    pub report: VerificationReport,
}

// =============================================================================
// Error Mapping
// =============================================================================

/// Errors returned by the API handlers.
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    UnsupportedMedia(String),
    Busy,
    Conflict(String),
    Internal(String),
}

impl ApiError {
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            ApiError::NotFound(m) => (StatusCode::NOT_FOUND, "not_found", m.clone()),
            ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, "invalid_request", m.clone()),
            ApiError::UnsupportedMedia(m) => (
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                "unsupported_format",
                m.clone(),
            ),
            ApiError::Busy => (
                StatusCode::CONFLICT,
                "busy",
                "Another operation is already running".to_string(),
            ),
            ApiError::Conflict(m) => (StatusCode::CONFLICT, "conflict", m.clone()),
            ApiError::Internal(m) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", m.clone()),
        }
    }
}

/// Convert ApiError to HTTP response.
///
/// - 5xx errors are logged at ERROR level
/// - 404s at DEBUG level, other 4xx at WARN level
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = self.parts();

        if status.is_server_error() {
            error!(error_type, status = status.as_u16(), "Server error: {}", message);
        } else if status == StatusCode::NOT_FOUND {
            debug!(error_type, status = status.as_u16(), "Resource not found: {}", message);
        } else if status.is_client_error() {
            warn!(error_type, status = status.as_u16(), "Client error: {}", message);
        }

        let body = ErrorResponse::new(error_type, message, status);
        (status, Json(body)).into_response()
    }
}

impl From<IoError> for ApiError {
    fn from(err: IoError) -> Self {
        match err {
            IoError::NotFound(path) => ApiError::NotFound(format!("Path not found: {path}")),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<TiffError> for ApiError {
    fn from(err: TiffError) -> Self {
        match err {
            TiffError::Io(io) => io.into(),
            other => ApiError::UnsupportedMedia(other.to_string()),
        }
    }
}

impl From<FormatError> for ApiError {
    fn from(err: FormatError) -> Self {
        match err {
            FormatError::Io(io) => io.into(),
            FormatError::Tiff(tiff) => tiff.into(),
            FormatError::UnsupportedFormat { reason } => ApiError::UnsupportedMedia(reason),
        }
    }
}

impl From<StackError> for ApiError {
    fn from(err: StackError) -> Self {
        match err {
            StackError::Io(io) => io.into(),
            StackError::Tiff(tiff) => tiff.into(),
            StackError::Encode { .. } => ApiError::Internal(err.to_string()),
            other => ApiError::UnsupportedMedia(other.to_string()),
        }
    }
}

impl From<CompressError> for ApiError {
    fn from(err: CompressError) -> Self {
        match err {
            CompressError::Io(io) => io.into(),
            CompressError::Format(format) => format.into(),
            CompressError::OutputExists(_) => ApiError::Conflict(err.to_string()),
            CompressError::UnknownMethod(_) => ApiError::BadRequest(err.to_string()),
            CompressError::Read { source, .. } => source.into(),
            CompressError::Write { .. } => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<VerifyError> for ApiError {
    fn from(err: VerifyError) -> Self {
        match err {
            VerifyError::PixelComparison(e) | VerifyError::Statistics(e) => e.into(),
            VerifyError::FileHash(e) => e.into(),
            VerifyError::Dimensions(e) | VerifyError::Metadata(e) => e.into(),
            VerifyError::ShapeMismatch { .. } | VerifyError::FrameOutOfRange { .. } => {
                ApiError::BadRequest(err.to_string())
            }
            VerifyError::Render { .. } => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<BatchError> for ApiError {
    fn from(err: BatchError) -> Self {
        match err {
            BatchError::Io(e) => e.into(),
            BatchError::Compress(e) => e.into(),
            BatchError::Verify(e) => e.into(),
        }
    }
}

fn existing_path(raw: &str) -> Result<PathBuf, ApiError> {
    if raw.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "Please select a file or folder first".to_string(),
        ));
    }
    let path = PathBuf::from(raw);
    if !path.exists() {
        return Err(ApiError::NotFound(format!("Path not found: {raw}")));
    }
    Ok(path)
}

async fn run_blocking<T, F>(task: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|e| ApiError::Internal(format!("Worker task failed: {e}")))?
}

// =============================================================================
// Handlers
// =============================================================================

/// Serve the GUI page.
///
/// # Endpoint
///
/// `GET /`
pub async fn index_handler(State(state): State<AppState>) -> Html<String> {
    Html(super::ui::render_index(&state.start_dir))
}

/// Handle health check requests.
///
/// # Response
///
/// `200 OK` with `{"status": "healthy", "version": "0.1.0"}`
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// List subdirectories and TIFF files of a directory.
///
/// # Endpoint
///
/// `GET /api/browse?path=/data/scans`
///
/// # Errors
///
/// - `400 Bad Request`: Path is not a directory
/// - `404 Not Found`: Path does not exist
pub async fn browse_handler(
    State(state): State<AppState>,
    Query(query): Query<BrowseQuery>,
) -> Result<Json<BrowseResponse>, ApiError> {
    let dir = match query.path.as_deref() {
        Some(p) if !p.trim().is_empty() => existing_path(p)?,
        _ => state.start_dir.clone(),
    };
    if !dir.is_dir() {
        return Err(ApiError::BadRequest(format!(
            "Not a directory: {}",
            dir.display()
        )));
    }

    run_blocking(move || {
        let read = std::fs::read_dir(&dir).map_err(|e| IoError::read(&dir, e))?;
        let mut entries: Vec<BrowseEntry> = read
            .filter_map(Result::ok)
            .filter_map(|entry| {
                let path = entry.path();
                let name = entry.file_name().to_string_lossy().into_owned();
                if name.starts_with('.') {
                    return None;
                }
                let kind = if path.is_dir() {
                    "dir"
                } else if path.is_file() && has_tiff_extension(&path) {
                    "tiff"
                } else {
                    return None;
                };
                Some(BrowseEntry {
                    compressed: kind == "tiff" && is_compressed_output(&path),
                    name,
                    path,
                    kind,
                })
            })
            .collect();
        entries.sort_by(|a, b| (a.kind, &a.name).cmp(&(b.kind, &b.name)));

        Ok(Json(BrowseResponse {
            parent: dir.parent().map(|p| p.to_path_buf()),
            path: dir,
            entries,
        }))
    })
    .await
}

/// Compress, verify and retain a file or every TIFF below a folder.
///
/// # Endpoint
///
/// `POST /api/compress` with `{"path": "...", "method": "zip", "retention": "delete"}`
///
/// The batch runs on a blocking worker and the request waits for it.
/// Progress can be polled from `GET /api/progress` meanwhile.
///
/// # Errors
///
/// - `400 Bad Request`: Unknown method or retention
/// - `404 Not Found`: Path does not exist
/// - `409 Conflict`: Another operation is running
/// - `415 Unsupported Media Type`: A single input file is not a readable TIFF
pub async fn compress_handler(
    State(state): State<AppState>,
    Json(request): Json<CompressRequest>,
) -> Result<Json<BatchReport>, ApiError> {
    let method = match request.method.as_deref() {
        Some(m) => m.parse::<CompressionMethod>()?,
        None => CompressionMethod::default(),
    };
    let retention = Retention::from_parts(
        request.retention.as_deref().unwrap_or("delete"),
        request.backup_dir.map(PathBuf::from),
    )
    .map_err(ApiError::BadRequest)?;
    let path = existing_path(&request.path)?;

    let guard = state.try_begin_job()?;
    state.progress().begin();
    info!(path = %path.display(), %method, retention = retention.name(), "Starting compression");

    let progress = Arc::clone(&state.progress);
    let manager = FileManager::new(method).with_retention(retention);
    let result = run_blocking(move || {
        let _guard = guard;
        let mut sink = SharedProgress(progress);
        manager.process_path(&path, &mut sink).map_err(ApiError::from)
    })
    .await;

    if let Err(e) = &result {
        state.progress().fail(&e.parts().2);
    }
    Ok(Json(result?))
}

/// Current progress state and log lines.
///
/// # Endpoint
///
/// `GET /api/progress`
pub async fn progress_handler(State(state): State<AppState>) -> Json<ProgressState> {
    Json(state.progress().clone())
}

/// Run the five verification checks on a pair of files.
///
/// # Endpoint
///
/// `POST /api/verify` with `{"original": "...", "compressed": "..."}`
///
/// # Errors
///
/// - `404 Not Found`: Either file does not exist
/// - `409 Conflict`: Another operation is running
/// - `415 Unsupported Media Type`: Either file is not a readable TIFF
pub async fn verify_handler(
    State(state): State<AppState>,
    Json(request): Json<VerifyRequest>,
) -> Result<Json<VerifyResponse>, ApiError> {
    let original = existing_path(&request.original)?;
    let compressed = existing_path(&request.compressed)?;
    let guard = state.try_begin_job()?;

    run_blocking(move || {
        let _guard = guard;
        let report = TiffVerifier::new(original, compressed).verify_all()?;
        Ok(Json(VerifyResponse {
            passed: report.passed(),
            failed_checks: report.failed_checks(),
            report,
        }))
    })
    .await
}

/// Render the verification plot for one frame.
///
/// # Endpoint
///
/// `GET /api/diff?original=...&compressed=...&frame=0`
///
/// # Response
///
/// `200 OK` with `Content-Type: image/png`
///
/// # Errors
///
/// - `400 Bad Request`: Frame out of range or shapes differ
/// - `404 Not Found`: Either file does not exist
/// - `409 Conflict`: Another operation is running
pub async fn diff_handler(
    State(state): State<AppState>,
    Query(query): Query<DiffQuery>,
) -> Result<Response, ApiError> {
    let original = existing_path(&query.original)?;
    let compressed = existing_path(&query.compressed)?;
    let frame = query.frame;
    let guard = state.try_begin_job()?;

    let png = run_blocking(move || {
        let _guard = guard;
        Ok(TiffVerifier::new(original, compressed).plot_verification(frame)?)
    })
    .await?;

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "image/png")
        .header(header::CACHE_CONTROL, "no-store")
        .body(Body::from(png))
        .map_err(|e| ApiError::Internal(e.to_string()))
}
