//! HTTP request handlers
//!
//! This module contains all the request handlers for the API endpoints.

pub mod associations;
pub mod health;
pub mod media;
pub mod recognize;
pub mod stamps;
pub mod videos;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

pub use crate::state::AppState;
pub use associations::{
    create_association_handler, delete_association_handler, list_associations_handler, AssociationResponse,
    CreateAssociationRequest,
};
pub use health::{health, ready, HealthResponse, ReadyResponse};
pub use media::media_handler;
pub use recognize::{recognize_handler, DetectionResponse, RecognizeResponse, RegionResponse};
pub use stamps::{
    delete_stamp_handler, list_stamps_handler, playback_handler, rename_stamp_handler, search_stamps_handler,
    upload_stamp_handler, PlaybackResponse, RenameStampRequest, StampResponse, StampSummaryResponse,
};
pub use videos::{
    delete_video_handler, list_videos_handler, retitle_video_handler, upload_video_handler, RetitleVideoRequest,
    VideoResponse,
};

/// Response for a successful delete
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DeletedResponse {
    pub id: Uuid,
    pub deleted: bool,
}
