//! Stamp handlers
//!
//! Upload stores three things for every stamp: the original image, its
//! enhanced PNG variant and the fingerprint of that variant. Objects are
//! stored before the record is inserted; if a later step fails, the objects
//! already stored are removed again.

use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use moments_core::{
    enhance_bytes, file_extension, validate_label, Fingerprinter, MomentsError, Stamp, StampSummary, UploadKind,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use super::videos::VideoResponse;
use super::DeletedResponse;
use crate::db::{CreateStamp, StampRow};
use crate::error::ApiError;
use crate::multipart::MultipartFields;
use crate::state::AppState;
use crate::validation::require_label;

/// A stored stamp
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StampResponse {
    #[schema(example = "550e8400-e29b-41d4-a716-446655440000")]
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    #[schema(example = "Blue Bird 1998")]
    pub name: String,
    /// Public URL of the uploaded image
    pub image_url: String,
    /// Public URL of the enhanced PNG variant used for recognition
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed_image_url: Option<String>,
    /// Hex-encoded 64-bit fingerprint of the processed variant
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(example = "a1b2c3d4e5f67890")]
    pub fingerprint: Option<String>,
}

impl From<Stamp> for StampResponse {
    fn from(stamp: Stamp) -> Self {
        Self {
            id: stamp.id,
            created_at: stamp.created_at,
            name: stamp.name,
            image_url: stamp.image_url,
            processed_image_url: stamp.processed_image_url,
            fingerprint: stamp.fingerprint,
        }
    }
}

impl From<StampRow> for StampResponse {
    fn from(row: StampRow) -> Self {
        Stamp::from(row).into()
    }
}

/// Name lookup result
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StampSummaryResponse {
    pub id: Uuid,
    pub name: String,
}

impl From<StampSummary> for StampSummaryResponse {
    fn from(summary: StampSummary) -> Self {
        Self {
            id: summary.id,
            name: summary.name,
        }
    }
}

/// Body of `PATCH /api/stamps/{id}`
#[derive(Debug, Deserialize, ToSchema)]
pub struct RenameStampRequest {
    #[schema(example = "Blue Bird 1998")]
    pub name: String,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SearchQuery {
    /// Text to look for inside stamp names (case-insensitive)
    pub text: Option<String>,
}

/// What to play for a recognized stamp
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PlaybackResponse {
    pub stamp_id: Uuid,
    /// Video of the newest association, absent when the stamp has none
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video: Option<VideoResponse>,
}

/// List all stamps, newest first
#[utoipa::path(
    get,
    path = "/api/stamps",
    tag = "Stamps",
    responses(
        (status = 200, description = "All stamps", body = Vec<StampResponse>)
    )
)]
pub async fn list_stamps_handler(State(state): State<AppState>) -> Result<Json<Vec<StampResponse>>, ApiError> {
    let rows = state.catalog.list_stamps().await?;
    Ok(Json(rows.into_iter().map(StampResponse::from).collect()))
}

/// Upload a new stamp
///
/// Accepts multipart/form-data with:
/// - **name** (required): Stamp name
/// - **file** (required): JPEG, PNG or WebP image, max 5 MB
#[utoipa::path(
    post,
    path = "/api/stamps",
    tag = "Stamps",
    request_body(
        content_type = "multipart/form-data",
        description = "Stamp name and image"
    ),
    responses(
        (status = 201, description = "Stamp created", body = StampResponse),
        (status = 400, description = "Missing name or file, or undecodable image"),
        (status = 413, description = "Image larger than 5 MB"),
        (status = 415, description = "Image type not allowed")
    )
)]
pub async fn upload_stamp_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<StampResponse>), ApiError> {
    let kind = UploadKind::StampImage;
    let fields = MultipartFields::parse(&mut multipart, kind).await?;
    let name = require_label(kind, fields.get_text("name"))?;
    let file = fields.into_file()?;

    let content_type = file
        .content_type
        .clone()
        .unwrap_or_else(|| "application/octet-stream".to_string());
    let extension = file_extension(file.file_name.as_deref(), file.content_type.as_deref());

    // Decode and enhance on the blocking pool; an undecodable image never reaches storage
    let original = file.data;
    let (original, processed, fingerprint) = tokio::task::spawn_blocking(move || {
        let processed = enhance_bytes(&original)?;
        let fingerprint = Fingerprinter.fingerprint_bytes(&processed)?;
        Ok::<_, MomentsError>((original, processed, fingerprint))
    })
    .await
    .map_err(|e| ApiError::internal(format!("Image processing task failed: {}", e)))??;

    let bucket = kind.bucket();
    let stored_original = state
        .storage
        .upload(bucket, &extension, original, &content_type)
        .await?;

    let stored_processed = match state.storage.upload(bucket, "png", processed, "image/png").await {
        Ok(stored) => stored,
        Err(e) => {
            state.storage.remove_quietly(bucket, &[stored_original.key.as_str()]).await;
            return Err(e.into());
        }
    };

    let insert = state
        .catalog
        .insert_stamp(CreateStamp {
            name,
            image_key: stored_original.key.clone(),
            image_url: stored_original.url.clone(),
            processed_image_key: Some(stored_processed.key.clone()),
            processed_image_url: Some(stored_processed.url.clone()),
            fingerprint: Some(fingerprint.to_hex()),
        })
        .await;

    let row = match insert {
        Ok(row) => row,
        Err(e) => {
            state
                .storage
                .remove_quietly(bucket, &[stored_original.key.as_str(), stored_processed.key.as_str()])
                .await;
            return Err(e.into());
        }
    };

    tracing::info!(
        stamp_id = %row.id,
        name = %row.name,
        fingerprint = %fingerprint,
        "Stamp uploaded"
    );

    Ok((StatusCode::CREATED, Json(row.into())))
}

/// Rename a stamp
#[utoipa::path(
    patch,
    path = "/api/stamps/{id}",
    tag = "Stamps",
    params(("id" = Uuid, Path, description = "Stamp id")),
    request_body = RenameStampRequest,
    responses(
        (status = 200, description = "Stamp renamed", body = StampResponse),
        (status = 400, description = "Empty name"),
        (status = 404, description = "Stamp not found")
    )
)]
pub async fn rename_stamp_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<RenameStampRequest>,
) -> Result<Json<StampResponse>, ApiError> {
    let name = validate_label(UploadKind::StampImage.label_field(), &request.name)?;
    let row = state.catalog.rename_stamp(id, &name).await?;
    tracing::info!(stamp_id = %id, name = %row.name, "Stamp renamed");
    Ok(Json(row.into()))
}

/// Delete a stamp and its stored images
///
/// With the `restrict` delete policy a stamp that is still associated with a
/// video cannot be deleted (409). With `cascade` its associations go too.
#[utoipa::path(
    delete,
    path = "/api/stamps/{id}",
    tag = "Stamps",
    params(("id" = Uuid, Path, description = "Stamp id")),
    responses(
        (status = 200, description = "Stamp deleted", body = DeletedResponse),
        (status = 404, description = "Stamp not found"),
        (status = 409, description = "Stamp is still associated with a video")
    )
)]
pub async fn delete_stamp_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DeletedResponse>, ApiError> {
    let row = state.catalog.delete_stamp(id, state.delete_policy).await?;
    state
        .storage
        .remove_quietly(UploadKind::StampImage.bucket(), &row.object_keys())
        .await;

    tracing::info!(stamp_id = %id, policy = %state.delete_policy, "Stamp deleted");
    Ok(Json(DeletedResponse { id, deleted: true }))
}

/// Look up stamps whose name contains the given text
#[utoipa::path(
    get,
    path = "/api/stamps/search",
    tag = "Stamps",
    params(SearchQuery),
    responses(
        (status = 200, description = "Matching stamps (empty for empty text)", body = Vec<StampSummaryResponse>)
    )
)]
pub async fn search_stamps_handler(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<StampSummaryResponse>>, ApiError> {
    let text = query.text.unwrap_or_default();
    let matches = state.catalog.search_stamps(&text).await?;
    Ok(Json(matches.into_iter().map(StampSummaryResponse::from).collect()))
}

/// Video to play for a recognized stamp
#[utoipa::path(
    get,
    path = "/api/stamps/{id}/playback",
    tag = "Stamps",
    params(("id" = Uuid, Path, description = "Stamp id")),
    responses(
        (status = 200, description = "Playback target", body = PlaybackResponse),
        (status = 404, description = "Stamp not found")
    )
)]
pub async fn playback_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<PlaybackResponse>, ApiError> {
    let video = state.catalog.playback_for_stamp(id).await?;
    Ok(Json(PlaybackResponse {
        stamp_id: id,
        video: video.map(VideoResponse::from),
    }))
}
