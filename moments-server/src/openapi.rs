//! OpenAPI documentation configuration
//!
//! Generates the OpenAPI 3 document for the Epic Moments API.

use utoipa::OpenApi;

use crate::handlers::{
    AssociationResponse, CreateAssociationRequest, DeletedResponse, DetectionResponse, HealthResponse,
    PlaybackResponse, ReadyResponse, RecognizeResponse, RegionResponse, RenameStampRequest, RetitleVideoRequest,
    StampResponse, StampSummaryResponse, VideoResponse,
};

/// Epic Moments API - OpenAPI Documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Epic Moments API",
        version = "0.1.0",
        description = r#"
## Stamps that play videos

Upload reference **stamps** (images) and **videos**, then **associate** them.
When a camera recognizes a stamp, the associated video plays.

### How It Works

1. Upload a stamp via `POST /api/stamps`; the server stores the original, an
   edge-enhanced PNG variant and a 64-bit perceptual fingerprint
2. Upload a video via `POST /api/videos`
3. Link them via `POST /api/associations`
4. Send camera frames to `POST /api/recognize`, or look up a recognized stamp's
   video via `GET /api/stamps/{id}/playback`

Uploaded objects are served from `/media/{bucket}/{key}`.
"#,
        license(
            name = "MIT OR Apache-2.0",
            url = "https://github.com/epic-moments/epic-moments/blob/main/LICENSE"
        ),
        contact(
            name = "Epic Moments Team",
            url = "https://github.com/epic-moments/epic-moments"
        )
    ),
    servers(
        (url = "http://localhost:3000", description = "Local development server")
    ),
    tags(
        (name = "Stamps", description = "Reference images the scanner recognizes"),
        (name = "Videos", description = "Videos played when a stamp is recognized"),
        (name = "Associations", description = "Stamp to video links"),
        (name = "Recognition", description = "Recognize stamps in camera frames"),
        (name = "Media", description = "Stored images and videos"),
        (name = "Health", description = "Service health and readiness endpoints")
    ),
    paths(
        crate::handlers::health::health,
        crate::handlers::health::ready,
        crate::handlers::stamps::list_stamps_handler,
        crate::handlers::stamps::upload_stamp_handler,
        crate::handlers::stamps::rename_stamp_handler,
        crate::handlers::stamps::delete_stamp_handler,
        crate::handlers::stamps::search_stamps_handler,
        crate::handlers::stamps::playback_handler,
        crate::handlers::videos::list_videos_handler,
        crate::handlers::videos::upload_video_handler,
        crate::handlers::videos::retitle_video_handler,
        crate::handlers::videos::delete_video_handler,
        crate::handlers::associations::list_associations_handler,
        crate::handlers::associations::create_association_handler,
        crate::handlers::associations::delete_association_handler,
        crate::handlers::recognize::recognize_handler,
        crate::handlers::media::media_handler,
    ),
    components(
        schemas(
            HealthResponse,
            ReadyResponse,
            StampResponse,
            StampSummaryResponse,
            RenameStampRequest,
            PlaybackResponse,
            VideoResponse,
            RetitleVideoRequest,
            AssociationResponse,
            CreateAssociationRequest,
            DeletedResponse,
            RecognizeResponse,
            DetectionResponse,
            RegionResponse,
        )
    )
)]
pub struct ApiDoc;
