//! Video handlers

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use moments_core::{file_extension, validate_label, UploadKind, Video};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::DeletedResponse;
use crate::db::{CreateVideo, VideoRow};
use crate::error::ApiError;
use crate::multipart::MultipartFields;
use crate::state::AppState;
use crate::validation::require_label;

/// A stored video
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct VideoResponse {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    #[schema(example = "Grandpa's birthday")]
    pub title: String,
    pub video_url: String,
}

impl From<Video> for VideoResponse {
    fn from(video: Video) -> Self {
        Self {
            id: video.id,
            created_at: video.created_at,
            title: video.title,
            video_url: video.video_url,
        }
    }
}

impl From<VideoRow> for VideoResponse {
    fn from(row: VideoRow) -> Self {
        Video::from(row).into()
    }
}

/// Body of `PATCH /api/videos/{id}`
#[derive(Debug, Deserialize, ToSchema)]
pub struct RetitleVideoRequest {
    pub title: String,
}

/// List all videos, newest first
#[utoipa::path(
    get,
    path = "/api/videos",
    tag = "Videos",
    responses(
        (status = 200, description = "All videos", body = Vec<VideoResponse>)
    )
)]
pub async fn list_videos_handler(State(state): State<AppState>) -> Result<Json<Vec<VideoResponse>>, ApiError> {
    let rows = state.catalog.list_videos().await?;
    Ok(Json(rows.into_iter().map(VideoResponse::from).collect()))
}

/// Upload a new video
///
/// Accepts multipart/form-data with:
/// - **title** (required): Video title
/// - **file** (required): MP4, WebM or QuickTime video, max 50 MB
#[utoipa::path(
    post,
    path = "/api/videos",
    tag = "Videos",
    request_body(
        content_type = "multipart/form-data",
        description = "Video title and file"
    ),
    responses(
        (status = 201, description = "Video created", body = VideoResponse),
        (status = 400, description = "Missing title or file"),
        (status = 413, description = "Video larger than 50 MB"),
        (status = 415, description = "Video type not allowed")
    )
)]
pub async fn upload_video_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<VideoResponse>), ApiError> {
    let kind = UploadKind::Video;
    let fields = MultipartFields::parse(&mut multipart, kind).await?;
    let title = require_label(kind, fields.get_text("title"))?;
    let file = fields.into_file()?;

    let content_type = file
        .content_type
        .clone()
        .unwrap_or_else(|| "application/octet-stream".to_string());
    let extension = file_extension(file.file_name.as_deref(), file.content_type.as_deref());
    let size = file.data.len();

    let bucket = kind.bucket();
    let stored = state
        .storage
        .upload(bucket, &extension, file.data, &content_type)
        .await?;

    let row = match state
        .catalog
        .insert_video(CreateVideo {
            title,
            video_key: stored.key.clone(),
            video_url: stored.url.clone(),
        })
        .await
    {
        Ok(row) => row,
        Err(e) => {
            state.storage.remove_quietly(bucket, &[stored.key.as_str()]).await;
            return Err(e.into());
        }
    };

    tracing::info!(video_id = %row.id, title = %row.title, size, "Video uploaded");
    Ok((StatusCode::CREATED, Json(row.into())))
}

/// Change a video's title
#[utoipa::path(
    patch,
    path = "/api/videos/{id}",
    tag = "Videos",
    params(("id" = Uuid, Path, description = "Video id")),
    request_body = RetitleVideoRequest,
    responses(
        (status = 200, description = "Video retitled", body = VideoResponse),
        (status = 400, description = "Empty title"),
        (status = 404, description = "Video not found")
    )
)]
pub async fn retitle_video_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<RetitleVideoRequest>,
) -> Result<Json<VideoResponse>, ApiError> {
    let title = validate_label(UploadKind::Video.label_field(), &request.title)?;
    let row = state.catalog.retitle_video(id, &title).await?;
    Ok(Json(row.into()))
}

/// Delete a video and its stored file
#[utoipa::path(
    delete,
    path = "/api/videos/{id}",
    tag = "Videos",
    params(("id" = Uuid, Path, description = "Video id")),
    responses(
        (status = 200, description = "Video deleted", body = DeletedResponse),
        (status = 404, description = "Video not found"),
        (status = 409, description = "Video is still associated with a stamp")
    )
)]
pub async fn delete_video_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DeletedResponse>, ApiError> {
    let row = state.catalog.delete_video(id, state.delete_policy).await?;
    state
        .storage
        .remove_quietly(UploadKind::Video.bucket(), &[row.video_key.as_str()])
        .await;

    tracing::info!(video_id = %id, policy = %state.delete_policy, "Video deleted");
    Ok(Json(DeletedResponse { id, deleted: true }))
}
