use crate::error::AppError;
use crate::state::AppState;
use crate::types::*;
use axum::{
    Router,
    body::Body,
    extract::{
        DefaultBodyLimit, Query, State,
        multipart::{Field, Multipart, MultipartError},
    },
    http::{HeaderName, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, put},
};
use depot_artifact::VersionSelector;
use depot_telemetry::attributes::{DEPOT_SIZE_BYTES, DEPOT_VERSION};
use depot_telemetry::{trace_download, trace_upload};
use futures::TryStreamExt;
use std::io::{self, ErrorKind};
use tokio_util::io::{ReaderStream, StreamReader};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{Instrument, Level};

pub fn create_router(state: AppState) -> Router {
    let body_limit = usize::try_from(state.settings.max_upload_bytes).unwrap_or(usize::MAX);
    let request_timeout = state.settings.request_timeout;

    Router::new()
        // Health check endpoints
        .route("/health", get(health_check))
        .route("/readiness", get(readiness_check))
        // Artifact endpoints
        .route("/upload", put(upload_artifact).fallback(not_found))
        .route("/download", get(download_artifact).fallback(not_found))
        .fallback(not_found)
        // Middleware layers (applied in reverse order)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TimeoutLayer::new(request_timeout))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state)
}

/// Health check endpoint - returns OK if the service is running
async fn health_check() -> impl IntoResponse {
    tracing::debug!("Health check requested");
    (StatusCode::OK, "OK")
}

/// Readiness check endpoint - verifies the storage root is usable
async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.health_check().await {
        Ok(()) => (StatusCode::OK, "READY"),
        Err(e) => {
            tracing::warn!(error = %e, "Storage not ready");
            (StatusCode::SERVICE_UNAVAILABLE, "NOT READY")
        }
    }
}

async fn not_found() -> AppError {
    AppError::NotFound
}

fn authorize(state: &AppState, provided: Option<&str>) -> Result<(), AppError> {
    if state.guard.check(provided) {
        Ok(())
    } else {
        Err(AppError::Unauthorized)
    }
}

async fn upload_artifact(
    State(state): State<AppState>,
    Query(query): Query<UploadQuery>,
    mut multipart: Multipart,
) -> Result<Response, AppError> {
    if state.settings.protect_uploads {
        authorize(&state, query.access_key.as_deref())?;
    }

    let limit = state.settings.max_upload_bytes;
    let mut meta: Option<UploadMeta> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::from_multipart(e, limit))?
    {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("meta") => {
                let bytes =
                    read_small_field(field, state.settings.max_form_memory_bytes, limit).await?;
                meta = Some(UploadMeta::from_json(&bytes)?);
            }
            Some("file") => {
                // The file is streamed straight to storage, so its key must already be known
                let meta = meta.as_ref().ok_or_else(|| {
                    AppError::InvalidMetadata("meta field must precede the file field".to_string())
                })?;
                return store_file(&state, meta, field).await;
            }
            other => {
                tracing::debug!(field = ?other, "Ignoring unexpected multipart field");
            }
        }
    }

    Err(match meta {
        None => AppError::InvalidMetadata("meta field is required".to_string()),
        Some(_) => AppError::BadRequest("file field is required".to_string()),
    })
}

async fn store_file(
    state: &AppState,
    meta: &UploadMeta,
    field: Field<'_>,
) -> Result<Response, AppError> {
    let key = meta.key()?;
    if meta.version.is_some() {
        tracing::debug!(key = %key, "Ignoring version requested on upload");
    }

    let file_name = field.file_name().unwrap_or_default().to_string();
    let limit = state.settings.max_upload_bytes;
    let span = trace_upload(&meta.span_attributes());

    let stream = field.map_err(multipart_io_error);
    let mut reader = StreamReader::new(Box::pin(stream));

    let stored = state
        .store
        .put(&key, &file_name, &mut reader, limit)
        .instrument(span.clone())
        .await?;

    span.record(DEPOT_VERSION, stored.file_name.as_str());
    span.record(DEPOT_SIZE_BYTES, stored.bytes_written);
    tracing::info!(
        parent: &span,
        key = %key,
        file_name = %stored.file_name,
        bytes = stored.bytes_written,
        "Artifact uploaded"
    );

    Ok((
        StatusCode::CREATED,
        [(ARTIFACT_VERSION_HEADER, stored.file_name)],
        format!("Successfully Uploaded File: {} bytes\n", stored.bytes_written),
    )
        .into_response())
}

/// Read a non-file field into memory, refusing anything over `limit` bytes.
///
/// `body_limit` is the whole-request cap, reported if the body overruns it
/// while this field is being read.
async fn read_small_field(
    mut field: Field<'_>,
    limit: u64,
    body_limit: u64,
) -> Result<Vec<u8>, AppError> {
    let mut buf = Vec::new();
    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| AppError::from_multipart(e, body_limit))?
    {
        if (buf.len() + chunk.len()) as u64 > limit {
            return Err(depot_artifact::ArtifactError::PayloadTooLarge { limit }.into());
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(buf)
}

fn multipart_io_error(err: MultipartError) -> io::Error {
    let kind = if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ErrorKind::FileTooLarge
    } else {
        ErrorKind::InvalidData
    };
    io::Error::new(kind, err.body_text())
}

async fn download_artifact(
    State(state): State<AppState>,
    Query(query): Query<DownloadQuery>,
) -> Result<Response, AppError> {
    // Checked first, so a bad key learns nothing about what exists
    authorize(&state, query.access_key.as_deref())?;

    let key = query.key()?;
    VersionSelector::parse(query.version.as_deref())?;

    let span = trace_download(&query.span_attributes());
    let latest = state
        .store
        .get_latest(&key)
        .instrument(span.clone())
        .await?;

    span.record(DEPOT_VERSION, latest.file_name.as_str());
    span.record(DEPOT_SIZE_BYTES, latest.size_bytes);
    tracing::info!(
        parent: &span,
        key = %key,
        file_name = %latest.file_name,
        bytes = latest.size_bytes,
        "Serving artifact"
    );

    // The body owns the file handle and closes it once streamed or dropped
    let body = Body::from_stream(ReaderStream::new(latest.reader));

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, state.settings.content_type.clone()),
            (header::CONTENT_LENGTH, latest.size_bytes.to_string()),
            (HeaderName::from_static(ARTIFACT_VERSION_HEADER), latest.file_name),
        ],
        body,
    )
        .into_response())
}
