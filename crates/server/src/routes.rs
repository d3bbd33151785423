use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::multipart::MultipartRejection;
use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tower_http::cors::CorsLayer;

use faceswap_core::pipeline::swap_error::ImageSide;

use crate::error::ApiError;
use crate::state::AppState;
use crate::uploads::{StagedFile, UploadKind, UploadStore};

pub fn router(state: Arc<AppState>, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/", get(liveness))
        .route("/health", get(health))
        .route("/swap", post(swap_uploaded))
        .route("/faceswap_with_list/{target_name}", post(swap_with_gallery))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn liveness() -> &'static str {
    "Face swap service is running"
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    policy: String,
    queue_depth: usize,
    queue_capacity: usize,
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        policy: state.policy.to_string(),
        queue_depth: state.worker.queued(),
        queue_capacity: state.worker.capacity(),
    })
}

/// `POST /swap` with multipart fields `source` and `target`.
async fn swap_uploaded(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, ApiError> {
    let fields = read_fields(multipart).await?;
    let source = fields.source.ok_or(ApiError::MissingInput(ImageSide::Source))?;
    let target = fields.target.ok_or(ApiError::MissingInput(ImageSide::Target))?;

    let _staged_source = stage(&state.uploads, UploadKind::Source, source.clone()).await?;
    let _staged_target = stage(&state.uploads, UploadKind::Target, target.clone()).await?;
    run_swap(&state, source, target).await
}

/// `POST /faceswap_with_list/{target_name}` with multipart field `source`;
/// the target comes from the reference gallery.
async fn swap_with_gallery(
    State(state): State<Arc<AppState>>,
    Path(target_name): Path<String>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, ApiError> {
    let fields = read_fields(multipart).await?;
    let source = fields.source.ok_or(ApiError::MissingInput(ImageSide::Source))?;

    let target_path = state
        .gallery
        .resolve(&target_name)
        .ok_or(ApiError::TargetNotFound)?;
    let target = tokio::fs::read(&target_path).await.map_err(|e| {
        log::warn!("Failed to read gallery image {}: {e}", target_path.display());
        ApiError::TargetNotFound
    })?;

    let _staged_source = stage(&state.uploads, UploadKind::Source, source.clone()).await?;
    run_swap(&state, source, Bytes::from(target)).await
}

async fn run_swap(state: &AppState, source: Bytes, target: Bytes) -> Result<Response, ApiError> {
    let result = Bytes::from(state.worker.submit(source, target).await?);
    if state.uploads.keeps_files() {
        let kept = stage(&state.uploads, UploadKind::Result, result.clone()).await?;
        log::info!("Result kept at {}", kept.path().display());
    }
    Ok(([(header::CONTENT_TYPE, state.content_type)], result).into_response())
}

#[derive(Default)]
struct UploadFields {
    source: Option<Bytes>,
    target: Option<Bytes>,
}

/// Collect the `source` and `target` parts. Unknown parts are ignored and
/// empty parts count as absent. A body that is not multipart at all is
/// treated as carrying no source.
async fn read_fields(
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<UploadFields, ApiError> {
    let mut multipart = multipart.map_err(|rejection| {
        log::debug!("Not a multipart upload: {rejection}");
        ApiError::MissingInput(ImageSide::Source)
    })?;

    let mut fields = UploadFields::default();
    while let Some(field) = multipart.next_field().await? {
        let slot = match field.name() {
            Some("source") => &mut fields.source,
            Some("target") => &mut fields.target,
            _ => continue,
        };
        let bytes = field.bytes().await?;
        if !bytes.is_empty() {
            *slot = Some(bytes);
        }
    }
    Ok(fields)
}

async fn stage(store: &UploadStore, kind: UploadKind, bytes: Bytes) -> Result<StagedFile, ApiError> {
    let store = store.clone();
    tokio::task::spawn_blocking(move || store.stage(kind, &bytes))
        .await
        .map_err(|e| ApiError::Internal(format!("staging task failed: {e}")))?
        .map_err(|e| ApiError::Internal(format!("failed to stage {kind:?} upload: {e}")))
}
