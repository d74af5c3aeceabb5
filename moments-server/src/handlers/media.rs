//! Public media serving
//!
//! Stored objects are reachable at `/media/{bucket}/{key}`, the URL form the
//! object store hands out.

use axum::{
    extract::{Path, State},
    http::header,
    response::IntoResponse,
};

use crate::error::ApiError;
use crate::state::AppState;

/// Serve a stored image or video
#[utoipa::path(
    get,
    path = "/media/{bucket}/{key}",
    tag = "Media",
    params(
        ("bucket" = String, Path, description = "`stamps` or `videos`"),
        ("key" = String, Path, description = "Object key")
    ),
    responses(
        (status = 200, description = "Object bytes"),
        (status = 400, description = "Unknown bucket or malformed key"),
        (status = 404, description = "Object not found")
    )
)]
pub async fn media_handler(
    State(state): State<AppState>,
    Path((bucket, key)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let object = state.storage.fetch(&bucket, &key).await?;
    Ok((
        [
            (header::CONTENT_TYPE, object.content_type),
            (header::CACHE_CONTROL, "public, max-age=31536000, immutable".to_string()),
        ],
        object.data,
    ))
}
