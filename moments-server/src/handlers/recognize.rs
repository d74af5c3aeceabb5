//! Server-side stamp recognition
//!
//! Runs one recognition cycle over an uploaded camera frame, matching the
//! whole frame against the stored stamp fingerprints, and resolves each
//! detected stamp to the video that should play.

use std::sync::Arc;

use axum::{
    extract::{Multipart, State},
    Json,
};
use moments_core::recognition::{
    BoundingBox, DetectedStamp, FingerprintMatcher, RecognitionPipeline, WholeFrameDetector,
};
use moments_core::UploadKind;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::videos::VideoResponse;
use crate::db::CatalogError;
use crate::error::ApiError;
use crate::multipart::MultipartFields;
use crate::state::AppState;

/// Pixel rectangle inside the submitted frame
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema)]
pub struct RegionResponse {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl From<BoundingBox> for RegionResponse {
    fn from(b: BoundingBox) -> Self {
        Self {
            x: b.x,
            y: b.y,
            width: b.width,
            height: b.height,
        }
    }
}

/// A stamp recognized in the frame
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DetectionResponse {
    pub stamp_id: Uuid,
    pub name: String,
    /// `1 - distance / 64` for fingerprint matches
    #[schema(example = 0.95)]
    pub confidence: f32,
    pub bounding_box: RegionResponse,
    /// Video to play, absent when the stamp has no association
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video: Option<VideoResponse>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RecognizeResponse {
    /// Matching strategy used
    #[schema(example = "fingerprint")]
    pub strategy: String,
    /// Number of stamps the frame was compared against
    pub candidates: usize,
    pub detections: Vec<DetectionResponse>,
}

/// Recognize stamps in a camera frame
///
/// Accepts multipart/form-data with:
/// - **file** (required): JPEG, PNG or WebP frame, max 5 MB
#[utoipa::path(
    post,
    path = "/api/recognize",
    tag = "Recognition",
    request_body(
        content_type = "multipart/form-data",
        description = "Camera frame"
    ),
    responses(
        (status = 200, description = "Recognition result (possibly empty)", body = RecognizeResponse),
        (status = 400, description = "Missing or undecodable frame"),
        (status = 413, description = "Frame larger than 5 MB"),
        (status = 415, description = "Frame type not allowed")
    )
)]
pub async fn recognize_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<RecognizeResponse>, ApiError> {
    let fields = MultipartFields::parse(&mut multipart, UploadKind::StampImage).await?;
    let file = fields.into_file()?;

    let frame = tokio::task::spawn_blocking(move || image::load_from_memory(&file.data).map(|img| img.to_rgba8()))
        .await
        .map_err(|e| ApiError::internal(format!("Frame decoding task failed: {}", e)))?
        .map_err(|e| ApiError::bad_request(format!("Failed to decode frame: {}", e)))?;

    let targets = state.catalog.fingerprint_targets().await?;
    let matcher = FingerprintMatcher::new(targets, state.recognition_max_distance);
    let candidates = matcher.target_count();

    let pipeline = RecognitionPipeline::new(Arc::new(WholeFrameDetector), Arc::new(matcher));
    let strategy = pipeline.strategy_name().to_string();

    let detections = pipeline
        .run_cycle(frame)
        .await
        .map_err(|e| ApiError::internal(format!("Recognition failed: {}", e)))?;

    let mut responses = Vec::with_capacity(detections.len());
    for detection in detections {
        responses.push(resolve_playback(&state, detection).await?);
    }

    tracing::info!(
        strategy = %strategy,
        candidates,
        detections = responses.len(),
        "Frame recognized"
    );

    Ok(Json(RecognizeResponse {
        strategy,
        candidates,
        detections: responses,
    }))
}

async fn resolve_playback(state: &AppState, detection: DetectedStamp) -> Result<DetectionResponse, ApiError> {
    let video = match state.catalog.playback_for_stamp(detection.stamp_id).await {
        Ok(video) => video,
        // Deleted between target load and lookup
        Err(CatalogError::NotFound { .. }) => None,
        Err(e) => return Err(e.into()),
    };

    Ok(DetectionResponse {
        stamp_id: detection.stamp_id,
        name: detection.name,
        confidence: detection.confidence,
        bounding_box: detection.bounding_box.into(),
        video: video.map(VideoResponse::from),
    })
}
