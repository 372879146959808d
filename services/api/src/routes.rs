//! API service routes

use axum::{
    Json, Router,
    body::Bytes,
    extract::{
        DefaultBodyLimit, Multipart, State,
        multipart::MultipartRejection,
        rejection::BytesRejection,
    },
    http::{StatusCode, header},
    response::IntoResponse,
    routing::{delete, get, post},
};
use common::editor::{CopyField, CopyTracker};
use common::export::{EXPORT_FILENAME, render_csv};
use common::intake::{UploadedFile, intake};
use common::store::MetadataEdit;
use common::{MediaId, MediaItemView, StoreError};
use serde_json::json;
use std::sync::{MutexGuard, PoisonError};
use tracing::info;
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult},
    extract::{ApiJson, ApiPath},
    models::{
        AddApiKeyRequest, AddKeywordRequest, CopyResponse, GenerateRequest, GenerateResponse,
        GenerationStatusResponse, MediaItemResponse, MediaListResponse, RewriteTitlesRequest,
        RewriteTitlesResponse,
    },
    state::AppState,
};

/// Create the router for the API service
pub fn create_router(state: AppState) -> Router {
    let upload_limit = DefaultBodyLimit::max(state.max_request_bytes);

    Router::new()
        .route("/health", get(health_check))
        .route("/media", get(list_media).post(upload_media).layer(upload_limit))
        .route(
            "/media/:id",
            get(get_media_item)
                .patch(update_media_item)
                .delete(delete_media_item),
        )
        .route("/media/:id/keywords", post(add_keyword))
        .route("/media/:id/keywords/:index", delete(remove_keyword))
        .route("/media/:id/copy/:field", post(copy_field))
        .route("/titles/rewrite", post(rewrite_titles))
        .route("/generate", post(start_generation))
        .route("/generate/status", get(generation_status))
        .route("/export.csv", get(export_csv))
        .route("/previews/:token", get(get_preview))
        .route("/api-keys", get(list_api_keys).post(add_api_key))
        .route("/api-keys/:id", delete(remove_api_key))
        .with_state(state)
}

/// Copy tracker, recovered if a previous holder panicked
fn copy_tracker(state: &AppState) -> MutexGuard<'_, CopyTracker> {
    state.copies.lock().unwrap_or_else(PoisonError::into_inner)
}

fn with_copied(state: &AppState, item: MediaItemView) -> MediaItemResponse {
    let copied = copy_tracker(state).active(&item.id);
    MediaItemResponse { item, copied }
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "matanest-api"
    }))
}

/// List all media items in upload order
pub async fn list_media(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let items = state
        .store
        .snapshot()
        .await
        .into_iter()
        .map(|item| with_copied(&state, item))
        .collect();

    Ok(Json(MediaListResponse {
        items,
        generating: state.orchestrator.is_generating(),
    }))
}

/// Accept uploaded files as pending media items
///
/// Every multipart field carrying a filename is treated as one file.
pub async fn upload_media(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<impl IntoResponse> {
    let mut multipart = multipart?;
    let mut files = Vec::new();

    while let Some(field) = multipart.next_field().await? {
        let Some(name) = field.file_name().map(str::to_string) else {
            continue;
        };
        let content_type = field.content_type().map(str::to_string);
        let data = field.bytes().await?.to_vec();

        files.push(UploadedFile {
            name,
            content_type,
            data,
        });
    }

    if files.is_empty() {
        return Err(ApiError::BadRequest("No files in upload".to_string()));
    }

    let report = intake(&state.store, &state.intake_policy, files).await;
    let status = if report.accepted.is_empty() {
        StatusCode::UNPROCESSABLE_ENTITY
    } else {
        StatusCode::CREATED
    };

    Ok((status, Json(report)))
}

/// Get a media item by ID
pub async fn get_media_item(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
) -> ApiResult<impl IntoResponse> {
    let item = state.store.get(&MediaId::from(id)).await?;
    Ok(Json(with_copied(&state, item)))
}

/// Commit edited title and/or description
pub async fn update_media_item(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
    ApiJson(edit): ApiJson<MetadataEdit>,
) -> ApiResult<impl IntoResponse> {
    let item = state.store.update_fields(&MediaId::from(id), edit).await?;
    Ok(Json(with_copied(&state, item)))
}

/// Delete a media item and release its preview
pub async fn delete_media_item(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
) -> ApiResult<impl IntoResponse> {
    let id = MediaId::from(id);
    state.store.delete(&id).await?;

    copy_tracker(&state).forget(&id);

    Ok(Json(json!({"message": "Media item deleted successfully"})))
}

/// Add a keyword; committed immediately
pub async fn add_keyword(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
    ApiJson(payload): ApiJson<AddKeywordRequest>,
) -> ApiResult<impl IntoResponse> {
    let item = state
        .store
        .add_keyword(&MediaId::from(id), &payload.keyword)
        .await?;
    Ok(Json(with_copied(&state, item)))
}

/// Remove the keyword at an index; committed immediately
pub async fn remove_keyword(
    State(state): State<AppState>,
    ApiPath((id, index)): ApiPath<(String, usize)>,
) -> ApiResult<impl IntoResponse> {
    let item = state
        .store
        .remove_keyword(&MediaId::from(id), index)
        .await?;
    Ok(Json(with_copied(&state, item)))
}

/// Return a field's text for the clipboard and mark it copied
pub async fn copy_field(
    State(state): State<AppState>,
    ApiPath((id, field)): ApiPath<(String, String)>,
) -> ApiResult<impl IntoResponse> {
    let field: CopyField = field.parse().map_err(ApiError::BadRequest)?;
    let item = state.store.get(&MediaId::from(id)).await?;

    let Some(metadata) = &item.metadata else {
        return Err(StoreError::NotEditable {
            id: item.id.clone(),
            status: item.status,
        }
        .into());
    };

    let text = field.text(metadata);
    copy_tracker(&state).mark(&item.id, field);

    Ok(Json(CopyResponse { field, text }))
}

/// Prefix and suffix every completed title
pub async fn rewrite_titles(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<RewriteTitlesRequest>,
) -> ApiResult<impl IntoResponse> {
    let updated = state
        .store
        .rewrite_titles(&payload.prefix, &payload.suffix)
        .await;
    Ok(Json(RewriteTitlesResponse { updated }))
}

/// Start generating metadata for every pending item
///
/// The body is optional; an empty body runs with the configured defaults.
pub async fn start_generation(
    State(state): State<AppState>,
    body: Result<Bytes, BytesRejection>,
) -> ApiResult<impl IntoResponse> {
    let body = body?;
    let payload: GenerateRequest = if body.iter().all(u8::is_ascii_whitespace) {
        GenerateRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::BadRequest(format!("Invalid generate request: {}", e)))?
    };
    let settings = payload
        .settings
        .unwrap_or_else(|| state.default_settings.clone());

    let run = state.orchestrator.spawn(settings).await?;
    info!("Generation started for {} items", run.queued);

    Ok((
        StatusCode::ACCEPTED,
        Json(GenerateResponse { queued: run.queued }),
    ))
}

/// Whether a generation run is in progress
pub async fn generation_status(State(state): State<AppState>) -> impl IntoResponse {
    Json(GenerationStatusResponse {
        generating: state.orchestrator.is_generating(),
    })
}

/// Download completed items as CSV
pub async fn export_csv(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let export = render_csv(&state.store.snapshot().await)?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", EXPORT_FILENAME),
            ),
        ],
        export.content,
    ))
}

/// Serve preview bytes
pub async fn get_preview(
    State(state): State<AppState>,
    ApiPath(token): ApiPath<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let preview = state
        .store
        .resolve_preview(token)
        .await
        .ok_or_else(|| ApiError::NotFound("Preview not found".to_string()))?;

    Ok((
        [(header::CONTENT_TYPE, preview.mime_type)],
        preview.data.as_ref().clone(),
    ))
}

/// List API keys (secrets masked)
pub async fn list_api_keys(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.store.api_keys().await)
}

/// Add an API key to the list
pub async fn add_api_key(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<AddApiKeyRequest>,
) -> ApiResult<impl IntoResponse> {
    let key = state
        .store
        .add_api_key(&payload.key)
        .await
        .ok_or_else(|| ApiError::BadRequest("API key must not be empty".to_string()))?;

    Ok((StatusCode::CREATED, Json(key)))
}

/// Remove an API key by ID
pub async fn remove_api_key(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<impl IntoResponse> {
    if state.store.remove_api_key(id).await {
        Ok(Json(json!({"message": "API key removed successfully"})))
    } else {
        Err(ApiError::NotFound("API key not found".to_string()))
    }
}
