//! HTTP surface of the daemon
//!
//! | route                      | handler              |
//! |----------------------------|----------------------|
//! | `POST /api/download`       | download pipeline    |
//! | `GET  /downloads/:file`    | artifact retrieval   |
//! | `GET  /api/qualities`      | quality tier labels  |
//! | `POST /api/convert`        | image conversion     |
//! | `GET  /api/health`         | liveness             |
//! | `GET  /api/metrics`        | counters             |

use std::io::ErrorKind;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::{Body, Bytes},
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio_util::io::ReaderStream;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, warn};

use crate::fetch::DownloadRequest;
use crate::image::{convert, converted_file_name, looks_like_image, ImageOutputFormat};
use crate::metrics::{Metrics, Operation, Timer};
use crate::pipeline::{public_message, DownloadOutcome, DownloadPipeline};
use crate::quality::{options, MediaFormat};
use crate::scratch::parse_file_name;

/// Upload limit for the conversion endpoint.
pub const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pipeline: DownloadPipeline,
    metrics: Arc<Metrics>,
    started: Instant,
}

impl AppState {
    pub fn new(pipeline: DownloadPipeline, metrics: Arc<Metrics>) -> Self {
        Self {
            pipeline,
            metrics,
            started: Instant::now(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorBody { error: self.message })).into_response()
    }
}

/// Creates the service router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/download", post(start_download))
        .route("/downloads/:file", get(serve_artifact))
        .route("/api/qualities", get(list_qualities))
        .route("/api/convert", post(convert_image))
        .route("/api/health", get(health_check))
        .route("/api/metrics", get(get_metrics))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct DownloadBody {
    #[serde(default)]
    url: String,
    #[serde(default)]
    format: String,
    #[serde(default)]
    quality: String,
}

#[derive(Debug, Serialize)]
struct DownloadResponse {
    file: String,
    title: String,
    expires_at: String,
}

async fn start_download(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<DownloadResponse>, ApiError> {
    let timer = Timer::new();
    let result = run_download(&state, &headers, &body).await;
    state
        .metrics
        .record_request(Operation::Download, result.is_ok(), timer.elapsed_ms());
    result.map(Json)
}

async fn run_download(
    state: &AppState,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<DownloadResponse, ApiError> {
    let payload: DownloadBody = serde_json::from_slice(body).map_err(|e| {
        debug!("rejecting download body: {}", e);
        ApiError::bad_request("Invalid request body")
    })?;

    let request = DownloadRequest::new(&payload.url, &payload.format, &payload.quality)
        .map_err(|e| ApiError::bad_request(public_message(&e)))?;

    let outcome = state.pipeline.run(&request).await.map_err(|e| {
        error!("Download error: {}", e);
        if e.is_client_error() {
            ApiError::bad_request(public_message(&e))
        } else {
            ApiError::internal(public_message(&e))
        }
    })?;

    Ok(download_response(state, headers, &outcome))
}

fn download_response(state: &AppState, headers: &HeaderMap, outcome: &DownloadOutcome) -> DownloadResponse {
    let base = match &state.pipeline.config().public_base_url {
        Some(base) => base.trim_end_matches('/').to_string(),
        None => headers
            .get(header::HOST)
            .and_then(|host| host.to_str().ok())
            .map(|host| format!("http://{host}"))
            .unwrap_or_default(),
    };

    let expires_at = chrono::Duration::from_std(outcome.expires_in)
        .map(|ttl| chrono::Utc::now() + ttl)
        .unwrap_or_else(|_| chrono::Utc::now());

    DownloadResponse {
        file: format!("{}/downloads/{}", base, outcome.artifact.file_name()),
        title: outcome.artifact.display_name.clone(),
        expires_at: expires_at.to_rfc3339(),
    }
}

async fn serve_artifact(
    State(state): State<AppState>,
    Path(file): Path<String>,
) -> Result<Response, ApiError> {
    let not_found = || ApiError::not_found("File not found");

    let (id, ext) = parse_file_name(&file).ok_or_else(not_found)?;
    let pending = state.pipeline.registry().get(id).await.ok_or_else(not_found)?;
    let artifact = pending.artifact;
    if artifact.format.extension() != ext {
        return Err(not_found());
    }

    let handle = match tokio::fs::File::open(&artifact.path).await {
        Ok(handle) => handle,
        Err(e) if e.kind() == ErrorKind::NotFound => return Err(not_found()),
        Err(e) => {
            error!("could not open {}: {}", artifact.path.display(), e);
            return Err(ApiError::internal("Internal server error"));
        }
    };
    let length = handle
        .metadata()
        .await
        .map(|metadata| metadata.len())
        .map_err(|_| ApiError::internal("Internal server error"))?;

    let content_type = match artifact.format {
        MediaFormat::Audio => "audio/mpeg",
        MediaFormat::Video => "video/mp4",
    };

    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(length));
    headers.insert(
        header::CONTENT_DISPOSITION,
        attachment(&artifact.display_name)?,
    );

    let body = Body::from_stream(ReaderStream::new(handle));
    Ok((headers, body).into_response())
}

/// `Content-Disposition` for `file_name`, reduced to printable ASCII.
fn attachment(file_name: &str) -> Result<HeaderValue, ApiError> {
    let safe: String = file_name
        .chars()
        .map(|c| if c.is_ascii_graphic() || c == ' ' { c } else { '_' })
        .filter(|c| *c != '"' && *c != '\\')
        .collect();
    HeaderValue::from_str(&format!("attachment; filename=\"{safe}\""))
        .map_err(|_| ApiError::internal("Internal server error"))
}

async fn list_qualities() -> impl IntoResponse {
    Json(json!({
        "mp4": options(MediaFormat::Video),
        "mp3": options(MediaFormat::Audio),
    }))
}

struct Upload {
    name: String,
    data: Bytes,
}

async fn convert_image(State(state): State<AppState>, multipart: Multipart) -> Result<Response, ApiError> {
    let timer = Timer::new();
    let result = run_convert(multipart).await;
    state
        .metrics
        .record_request(Operation::Convert, result.is_ok(), timer.elapsed_ms());
    result
}

async fn run_convert(mut multipart: Multipart) -> Result<Response, ApiError> {
    let mut upload: Option<Upload> = None;
    let mut format: Option<String> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                warn!("malformed multipart body: {}", e);
                return Err(ApiError::bad_request("Invalid input"));
            }
        };

        let field_name = field.name().map(str::to_string);
        match field_name.as_deref() {
            Some("file") => {
                let name = field.file_name().unwrap_or_default().to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|_| ApiError::bad_request("Invalid input"))?;
                upload = Some(Upload { name, data });
            }
            Some("format") => {
                let text = field
                    .text()
                    .await
                    .map_err(|_| ApiError::bad_request("Invalid input"))?;
                format = Some(text);
            }
            _ => {}
        }
    }

    let (upload, format) = match (upload, format) {
        (Some(upload), Some(format)) if !upload.data.is_empty() && !format.is_empty() => {
            (upload, format)
        }
        _ => return Err(ApiError::bad_request("Invalid input")),
    };

    let target = ImageOutputFormat::parse(&format)
        .ok_or_else(|| ApiError::bad_request("Unsupported format"))?;

    if !looks_like_image(&upload.data) {
        return Err(ApiError::bad_request("Unsupported format"));
    }

    let data = upload.data;
    let converted = tokio::task::spawn_blocking(move || convert(&data, target))
        .await
        .map_err(|e| {
            error!("conversion task panicked: {}", e);
            ApiError::internal("Internal server error")
        })?
        .map_err(|e| {
            error!("Error processing image: {}", e);
            ApiError::internal("Internal server error")
        })?;

    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(target.mime_type()));
    headers.insert(
        header::CONTENT_DISPOSITION,
        attachment(&converted_file_name(&upload.name, target))?,
    );

    Ok((StatusCode::OK, headers, converted).into_response())
}

async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "service": "toolverse_media",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_ms": state.started.elapsed().as_millis() as u64,
        "pending_artifacts": state.pipeline.registry().pending().await,
    }))
}

async fn get_metrics(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.metrics.snapshot())
}
