//! Association handlers
//!
//! An association links one stamp to one video. Associations are created and
//! deleted on their own; deleting one never touches the stamp or the video.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use moments_core::{AssociationDetail, NewAssociation};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::stamps::StampResponse;
use super::videos::VideoResponse;
use super::DeletedResponse;
use crate::error::ApiError;
use crate::state::AppState;

/// An association with its stamp and video expanded when they still exist
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AssociationResponse {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub stamp_id: Uuid,
    pub video_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stamp: Option<StampResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video: Option<VideoResponse>,
}

impl From<AssociationDetail> for AssociationResponse {
    fn from(detail: AssociationDetail) -> Self {
        Self {
            id: detail.association.id,
            created_at: detail.association.created_at,
            stamp_id: detail.association.stamp_id,
            video_id: detail.association.video_id,
            stamp: detail.stamp.map(StampResponse::from),
            video: detail.video.map(VideoResponse::from),
        }
    }
}

/// Body of `POST /api/associations`
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateAssociationRequest {
    pub stamp_id: Uuid,
    pub video_id: Uuid,
}

/// List all associations, newest first
#[utoipa::path(
    get,
    path = "/api/associations",
    tag = "Associations",
    responses(
        (status = 200, description = "All associations", body = Vec<AssociationResponse>)
    )
)]
pub async fn list_associations_handler(
    State(state): State<AppState>,
) -> Result<Json<Vec<AssociationResponse>>, ApiError> {
    let details = state.catalog.list_associations().await?;
    Ok(Json(details.into_iter().map(AssociationResponse::from).collect()))
}

/// Link a stamp to a video
#[utoipa::path(
    post,
    path = "/api/associations",
    tag = "Associations",
    request_body = CreateAssociationRequest,
    responses(
        (status = 201, description = "Association created", body = AssociationResponse),
        (status = 404, description = "Stamp or video not found"),
        (status = 409, description = "This stamp is already linked to this video")
    )
)]
pub async fn create_association_handler(
    State(state): State<AppState>,
    Json(request): Json<CreateAssociationRequest>,
) -> Result<(StatusCode, Json<AssociationResponse>), ApiError> {
    let row = state
        .catalog
        .create_association(NewAssociation {
            stamp_id: request.stamp_id,
            video_id: request.video_id,
        })
        .await?;

    tracing::info!(
        association_id = %row.id,
        stamp_id = %row.stamp_id,
        video_id = %row.video_id,
        "Association created"
    );

    let stamp = state.catalog.get_stamp(row.stamp_id).await.ok();
    let video = state.catalog.get_video(row.video_id).await.ok();

    Ok((
        StatusCode::CREATED,
        Json(AssociationResponse {
            id: row.id,
            created_at: row.created_at,
            stamp_id: row.stamp_id,
            video_id: row.video_id,
            stamp: stamp.map(StampResponse::from),
            video: video.map(VideoResponse::from),
        }),
    ))
}

/// Delete one association
#[utoipa::path(
    delete,
    path = "/api/associations/{id}",
    tag = "Associations",
    params(("id" = Uuid, Path, description = "Association id")),
    responses(
        (status = 200, description = "Association deleted", body = DeletedResponse),
        (status = 404, description = "Association not found")
    )
)]
pub async fn delete_association_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DeletedResponse>, ApiError> {
    state.catalog.delete_association(id).await?;
    tracing::info!(association_id = %id, "Association deleted");
    Ok(Json(DeletedResponse { id, deleted: true }))
}
