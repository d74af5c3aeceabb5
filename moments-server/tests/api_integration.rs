//! API integration tests for moments-server.
//!
//! These tests drive the router with realistic multipart and JSON requests
//! against in-memory catalog and storage backends.

use std::io::Cursor;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    response::Response,
    Router,
};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use moments_core::{MAX_STAMP_IMAGE_SIZE, MAX_VIDEO_SIZE};
use moments_server::{create_router, create_router_with_state, AppState, Catalog, Config, DeletePolicy, ObjectStore};
use serde_json::{json, Value};
use tower::ServiceExt;

const BOUNDARY: &str = "----TestBoundary7MA4YWxkTrZu0gW";

/// A file part for a multipart body
struct FilePart<'a> {
    file_name: &'a str,
    content_type: &'a str,
    data: &'a [u8],
}

/// Helper to create a multipart body with text fields and an optional file
fn create_multipart(text_fields: &[(&str, &str)], file: Option<FilePart<'_>>) -> (String, Vec<u8>) {
    let mut body = Vec::new();

    for (name, value) in text_fields {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        body.extend_from_slice(format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes());
        body.extend_from_slice(value.as_bytes());
        body.extend_from_slice(b"\r\n");
    }

    if let Some(file) = file {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\n",
                file.file_name
            )
            .as_bytes(),
        );
        body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", file.content_type).as_bytes());
        body.extend_from_slice(file.data);
        body.extend_from_slice(b"\r\n");
    }

    // End boundary
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

    (format!("multipart/form-data; boundary={}", BOUNDARY), body)
}

fn multipart_request(uri: &str, (content_type, body): (String, Vec<u8>)) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("Content-Type", content_type)
        .body(Body::from(body))
        .unwrap()
}

fn json_request(method: &str, uri: &str, value: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("Content-Type", "application/json")
        .body(Body::from(value.to_string()))
        .unwrap()
}

fn empty_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn body_json(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

/// Router plus a handle on its state, for inspecting storage and catalog
fn create_test_app(policy: DeletePolicy) -> (Router, AppState) {
    let config = Config {
        delete_policy: policy,
        ..Config::default()
    };
    let state = AppState::in_memory(&config);
    (create_router_with_state(&config, state.clone()), state)
}

/// Diagonal gradient with a bright square, encoded as PNG
fn stamp_png() -> Vec<u8> {
    let img = RgbImage::from_fn(96, 96, |x, y| {
        if (30..60).contains(&x) && (30..60).contains(&y) {
            Rgb([250, 240, 20])
        } else {
            let v = ((x + y) * 255 / 190) as u8;
            Rgb([v, 255 - v, v / 2])
        }
    });
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut out, ImageFormat::Png)
        .unwrap();
    out.into_inner()
}

/// A decodable JPEG padded with APP15 segments up to roughly `target` bytes
fn padded_jpeg(target: usize) -> Vec<u8> {
    let img = RgbImage::from_fn(64, 64, |x, y| Rgb([(x * 4) as u8, (y * 4) as u8, 128]));
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut out, ImageFormat::Jpeg)
        .unwrap();
    let encoded = out.into_inner();

    // SOI, then padding segments, then the rest of the stream
    let mut jpeg = encoded[..2].to_vec();
    while jpeg.len() + encoded.len() < target {
        let payload = (target - jpeg.len() - encoded.len()).min(65_533);
        let length = (payload + 2) as u16;
        jpeg.extend_from_slice(&[0xFF, 0xEF]);
        jpeg.extend_from_slice(&length.to_be_bytes());
        jpeg.extend(std::iter::repeat(0u8).take(payload));
    }
    jpeg.extend_from_slice(&encoded[2..]);
    jpeg
}

async fn upload_stamp(app: &Router, name: &str, data: &[u8]) -> Value {
    let body = create_multipart(
        &[("name", name)],
        Some(FilePart {
            file_name: "stamp.png",
            content_type: "image/png",
            data,
        }),
    );
    let response = app
        .clone()
        .oneshot(multipart_request("/api/stamps", body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await
}

async fn upload_video(app: &Router, title: &str) -> Value {
    let body = create_multipart(
        &[("title", title)],
        Some(FilePart {
            file_name: "clip.mp4",
            content_type: "video/mp4",
            data: b"\x00\x00\x00\x18ftypmp42 not a real movie",
        }),
    );
    let response = app
        .clone()
        .oneshot(multipart_request("/api/videos", body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await
}

async fn associate(app: &Router, stamp_id: &Value, video_id: &Value) -> Response {
    app.clone()
        .oneshot(json_request(
            "POST",
            "/api/associations",
            json!({ "stamp_id": stamp_id, "video_id": video_id }),
        ))
        .await
        .unwrap()
}

// ============================================================================
// Health & Documentation Tests
// ============================================================================

#[tokio::test]
async fn test_health_endpoint_returns_ok() {
    let app = create_router();

    let response = app.oneshot(empty_request("GET", "/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["service"], "moments-server");
    assert_eq!(json["persistent_catalog"], false);
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn test_ready_endpoint_returns_ok() {
    let app = create_router();
    let response = app.oneshot(empty_request("GET", "/ready")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_responses_carry_request_id() {
    let app = create_router();
    let response = app.oneshot(empty_request("GET", "/health")).await.unwrap();
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn test_openapi_spec_endpoint() {
    let app = create_router();

    let response = app
        .oneshot(empty_request("GET", "/api-docs/openapi.json"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert!(json["openapi"].as_str().unwrap().starts_with("3."));
    assert!(json["paths"]["/api/stamps"].is_object());
    assert!(json["paths"]["/api/associations"].is_object());
    assert!(json["paths"]["/api/recognize"].is_object());
    assert!(json["paths"]["/health"].is_object());
}

#[tokio::test]
async fn test_swagger_ui_endpoint() {
    let app = create_router();

    let response = app.oneshot(empty_request("GET", "/docs/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let html = String::from_utf8_lossy(&body);
    assert!(html.contains("swagger") || html.contains("Swagger"));
}

// ============================================================================
// Upload Validation Tests
// ============================================================================

#[tokio::test]
async fn test_two_megabyte_jpeg_is_accepted() {
    let (app, state) = create_test_app(DeletePolicy::Restrict);
    let jpeg = padded_jpeg(2 * 1024 * 1024);
    assert!(jpeg.len() >= 2 * 1024 * 1024);
    assert!(jpeg.len() <= MAX_STAMP_IMAGE_SIZE);

    let body = create_multipart(
        &[("name", "Big Stamp")],
        Some(FilePart {
            file_name: "big.jpg",
            content_type: "image/jpeg",
            data: &jpeg,
        }),
    );
    let response = app.oneshot(multipart_request("/api/stamps", body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let json = body_json(response).await;
    assert_eq!(json["name"], "Big Stamp");
    assert!(json["image_url"].as_str().unwrap().ends_with(".jpg"));
    assert!(json["processed_image_url"].as_str().unwrap().ends_with(".png"));
    assert_eq!(json["fingerprint"].as_str().unwrap().len(), 16);

    // Original plus processed variant
    assert_eq!(state.storage.object_count(), 2);
}

#[tokio::test]
async fn test_oversized_stamp_image_is_rejected() {
    let (app, state) = create_test_app(DeletePolicy::Restrict);
    let data = vec![0u8; MAX_STAMP_IMAGE_SIZE + 1];

    let body = create_multipart(
        &[("name", "Too Big")],
        Some(FilePart {
            file_name: "huge.png",
            content_type: "image/png",
            data: &data,
        }),
    );
    let response = app.oneshot(multipart_request("/api/stamps", body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);

    let json = body_json(response).await;
    assert_eq!(json["code"], "FILE_TOO_LARGE");
    assert_eq!(state.storage.object_count(), 0);
    assert!(state.catalog.list_stamps().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_oversized_video_is_rejected() {
    let (app, state) = create_test_app(DeletePolicy::Restrict);
    let data = vec![0u8; MAX_VIDEO_SIZE + 1];

    let body = create_multipart(
        &[("title", "Too Long")],
        Some(FilePart {
            file_name: "long.mp4",
            content_type: "video/mp4",
            data: &data,
        }),
    );
    let response = app.oneshot(multipart_request("/api/videos", body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(state.storage.object_count(), 0);
    assert!(state.catalog.list_videos().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_unsupported_type_never_reaches_storage() {
    let (app, state) = create_test_app(DeletePolicy::Restrict);

    let body = create_multipart(
        &[("name", "Animated")],
        Some(FilePart {
            file_name: "anim.gif",
            content_type: "image/gif",
            data: b"GIF89a",
        }),
    );
    let response = app
        .clone()
        .oneshot(multipart_request("/api/stamps", body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert_eq!(body_json(response).await["code"], "UNSUPPORTED_MEDIA_TYPE");

    let body = create_multipart(
        &[("title", "Old format")],
        Some(FilePart {
            file_name: "clip.avi",
            content_type: "video/x-msvideo",
            data: b"RIFF",
        }),
    );
    let response = app.oneshot(multipart_request("/api/videos", body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);

    assert_eq!(state.storage.object_count(), 0);
    assert!(state.catalog.list_stamps().await.unwrap().is_empty());
    assert!(state.catalog.list_videos().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_stamp_requires_name_and_file() {
    let (app, state) = create_test_app(DeletePolicy::Restrict);
    let png = stamp_png();

    let body = create_multipart(
        &[("name", "   ")],
        Some(FilePart {
            file_name: "stamp.png",
            content_type: "image/png",
            data: &png,
        }),
    );
    let response = app
        .clone()
        .oneshot(multipart_request("/api/stamps", body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = create_multipart(&[("name", "No File")], None);
    let response = app.oneshot(multipart_request("/api/stamps", body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    assert_eq!(state.storage.object_count(), 0);
}

#[tokio::test]
async fn test_undecodable_stamp_image_is_rejected_before_storage() {
    let (app, state) = create_test_app(DeletePolicy::Restrict);

    let body = create_multipart(
        &[("name", "Broken")],
        Some(FilePart {
            file_name: "broken.png",
            content_type: "image/png",
            data: b"definitely not a png",
        }),
    );
    let response = app.oneshot(multipart_request("/api/stamps", body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "INVALID_IMAGE");
    assert_eq!(state.storage.object_count(), 0);
}

// ============================================================================
// Stamp and Video Management Tests
// ============================================================================

#[tokio::test]
async fn test_uploaded_stamp_is_listed_and_served() {
    let (app, _state) = create_test_app(DeletePolicy::Restrict);
    let png = stamp_png();
    let stamp = upload_stamp(&app, "  Blue   Bird ", &png).await;
    assert_eq!(stamp["name"], "Blue Bird");

    let response = app.clone().oneshot(empty_request("GET", "/api/stamps")).await.unwrap();
    let list = body_json(response).await;
    assert_eq!(list.as_array().unwrap().len(), 1);
    assert_eq!(list[0]["id"], stamp["id"]);

    // Public URL points at the media route
    let url = stamp["image_url"].as_str().unwrap();
    let path = &url[url.find("/media/").unwrap()..];
    let response = app.oneshot(empty_request("GET", path)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "image/png");
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(bytes.as_ref(), png.as_slice());
}

#[tokio::test]
async fn test_served_type_follows_declared_type_not_file_name() {
    let config = Config::default();
    let dir = std::env::temp_dir().join(format!("moments-media-{}", uuid::Uuid::new_v4()));
    let storage = ObjectStore::local(&dir, &config.public_base_url).await.unwrap();
    let state = AppState::new(Catalog::in_memory(), storage, &config);
    let app = create_router_with_state(&config, state);

    let png = stamp_png();
    let body = create_multipart(
        &[("name", "Misnamed")],
        Some(FilePart {
            file_name: "clip.mp4",
            content_type: "image/png",
            data: &png,
        }),
    );
    let response = app
        .clone()
        .oneshot(multipart_request("/api/stamps", body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let stamp = body_json(response).await;

    let url = stamp["image_url"].as_str().unwrap();
    assert!(url.ends_with(".png"), "unexpected key in {}", url);

    let path = &url[url.find("/media/").unwrap()..];
    let response = app.oneshot(empty_request("GET", path)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "image/png");

    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn test_media_rejects_unknown_bucket_and_missing_key() {
    let app = create_router();

    let response = app
        .clone()
        .oneshot(empty_request("GET", "/media/private/a.png"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .oneshot(empty_request("GET", "/media/stamps/missing.png"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_rename_stamp() {
    let (app, _state) = create_test_app(DeletePolicy::Restrict);
    let stamp = upload_stamp(&app, "Blue Bird", &stamp_png()).await;
    let uri = format!("/api/stamps/{}", stamp["id"].as_str().unwrap());

    let response = app
        .clone()
        .oneshot(json_request("PATCH", &uri, json!({ "name": "Red Bird" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["name"], "Red Bird");

    let response = app
        .clone()
        .oneshot(json_request("PATCH", &uri, json!({ "name": "  " })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let missing = format!("/api/stamps/{}", uuid::Uuid::new_v4());
    let response = app
        .oneshot(json_request("PATCH", &missing, json!({ "name": "Ghost" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_retitle_and_delete_video() {
    let (app, state) = create_test_app(DeletePolicy::Restrict);
    let video = upload_video(&app, "Birthday").await;
    assert_eq!(state.storage.object_count(), 1);
    let uri = format!("/api/videos/{}", video["id"].as_str().unwrap());

    let response = app
        .clone()
        .oneshot(json_request("PATCH", &uri, json!({ "title": "Birthday 2024" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["title"], "Birthday 2024");

    let response = app.oneshot(empty_request("DELETE", &uri)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(state.storage.object_count(), 0);
    assert!(state.catalog.list_videos().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_search_stamps_by_name_fragment() {
    let (app, _state) = create_test_app(DeletePolicy::Restrict);
    let png = stamp_png();
    upload_stamp(&app, "Blue Bird 1998", &png).await;
    upload_stamp(&app, "Red Fox", &png).await;

    let response = app
        .clone()
        .oneshot(empty_request("GET", "/api/stamps/search?text=BIRD"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let matches = body_json(response).await;
    assert_eq!(matches.as_array().unwrap().len(), 1);
    assert_eq!(matches[0]["name"], "Blue Bird 1998");

    let response = app
        .oneshot(empty_request("GET", "/api/stamps/search?text="))
        .await
        .unwrap();
    assert!(body_json(response).await.as_array().unwrap().is_empty());
}

// ============================================================================
// Association Tests
// ============================================================================

#[tokio::test]
async fn test_deleting_association_keeps_stamp_and_video() {
    let (app, state) = create_test_app(DeletePolicy::Restrict);
    let stamp = upload_stamp(&app, "Blue Bird", &stamp_png()).await;
    let video = upload_video(&app, "Birthday").await;

    let response = associate(&app, &stamp["id"], &video["id"]).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let association = body_json(response).await;
    assert_eq!(association["stamp"]["name"], "Blue Bird");
    assert_eq!(association["video"]["title"], "Birthday");

    let response = app
        .clone()
        .oneshot(empty_request("GET", "/api/associations"))
        .await
        .unwrap();
    let list = body_json(response).await;
    assert_eq!(list.as_array().unwrap().len(), 1);
    assert_eq!(list[0]["stamp"]["id"], stamp["id"]);

    let uri = format!("/api/associations/{}", association["id"].as_str().unwrap());
    let response = app.clone().oneshot(empty_request("DELETE", &uri)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    assert_eq!(state.catalog.list_stamps().await.unwrap().len(), 1);
    assert_eq!(state.catalog.list_videos().await.unwrap().len(), 1);
    assert!(state.catalog.list_associations().await.unwrap().is_empty());
    assert_eq!(state.storage.object_count(), 3);

    // Gone for good
    let response = app.oneshot(empty_request("DELETE", &uri)).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_association_requires_existing_records_and_unique_pair() {
    let (app, _state) = create_test_app(DeletePolicy::Restrict);
    let stamp = upload_stamp(&app, "Blue Bird", &stamp_png()).await;
    let video = upload_video(&app, "Birthday").await;

    let missing = json!(uuid::Uuid::new_v4());
    let response = associate(&app, &stamp["id"], &missing).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = associate(&app, &missing, &video["id"]).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = associate(&app, &stamp["id"], &video["id"]).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = associate(&app, &stamp["id"], &video["id"]).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(response).await["code"], "CONFLICT");
}

#[tokio::test]
async fn test_restrict_policy_blocks_deleting_referenced_stamp() {
    let (app, state) = create_test_app(DeletePolicy::Restrict);
    let stamp = upload_stamp(&app, "Blue Bird", &stamp_png()).await;
    let video = upload_video(&app, "Birthday").await;
    associate(&app, &stamp["id"], &video["id"]).await;

    let uri = format!("/api/stamps/{}", stamp["id"].as_str().unwrap());
    let response = app.clone().oneshot(empty_request("DELETE", &uri)).await.unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let uri = format!("/api/videos/{}", video["id"].as_str().unwrap());
    let response = app.oneshot(empty_request("DELETE", &uri)).await.unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    assert_eq!(state.catalog.list_associations().await.unwrap().len(), 1);
    assert_eq!(state.storage.object_count(), 3);
}

#[tokio::test]
async fn test_cascade_policy_removes_associations() {
    let (app, state) = create_test_app(DeletePolicy::Cascade);
    let stamp = upload_stamp(&app, "Blue Bird", &stamp_png()).await;
    let video = upload_video(&app, "Birthday").await;
    associate(&app, &stamp["id"], &video["id"]).await;

    let uri = format!("/api/stamps/{}", stamp["id"].as_str().unwrap());
    let response = app.oneshot(empty_request("DELETE", &uri)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    assert!(state.catalog.list_stamps().await.unwrap().is_empty());
    assert!(state.catalog.list_associations().await.unwrap().is_empty());
    assert_eq!(state.catalog.list_videos().await.unwrap().len(), 1);
    // Only the video file is left
    assert_eq!(state.storage.object_count(), 1);
}

// ============================================================================
// Playback & Recognition Tests
// ============================================================================

#[tokio::test]
async fn test_playback_resolves_newest_association() {
    let (app, _state) = create_test_app(DeletePolicy::Restrict);
    let stamp = upload_stamp(&app, "Blue Bird", &stamp_png()).await;
    let uri = format!("/api/stamps/{}/playback", stamp["id"].as_str().unwrap());

    let response = app.clone().oneshot(empty_request("GET", &uri)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_json(response).await.get("video").is_none());

    let first = upload_video(&app, "First").await;
    let second = upload_video(&app, "Second").await;
    associate(&app, &stamp["id"], &first["id"]).await;
    associate(&app, &stamp["id"], &second["id"]).await;

    let response = app.clone().oneshot(empty_request("GET", &uri)).await.unwrap();
    let playback = body_json(response).await;
    assert_eq!(playback["video"]["id"], second["id"]);

    let missing = format!("/api/stamps/{}/playback", uuid::Uuid::new_v4());
    let response = app.oneshot(empty_request("GET", &missing)).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_recognize_frame_showing_stored_stamp() {
    let (app, _state) = create_test_app(DeletePolicy::Restrict);
    let png = stamp_png();
    let stamp = upload_stamp(&app, "Blue Bird", &png).await;
    let video = upload_video(&app, "Birthday").await;
    associate(&app, &stamp["id"], &video["id"]).await;

    let body = create_multipart(
        &[],
        Some(FilePart {
            file_name: "frame.png",
            content_type: "image/png",
            data: &png,
        }),
    );
    let response = app.oneshot(multipart_request("/api/recognize", body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["strategy"], "fingerprint");
    assert_eq!(json["candidates"], 1);
    let detections = json["detections"].as_array().unwrap();
    assert_eq!(detections.len(), 1);
    assert_eq!(detections[0]["stamp_id"], stamp["id"]);
    assert_eq!(detections[0]["confidence"], 1.0);
    assert_eq!(detections[0]["video"]["id"], video["id"]);
}

#[tokio::test]
async fn test_recognize_with_empty_catalog_finds_nothing() {
    let app = create_router();

    let body = create_multipart(
        &[],
        Some(FilePart {
            file_name: "frame.png",
            content_type: "image/png",
            data: &stamp_png(),
        }),
    );
    let response = app.oneshot(multipart_request("/api/recognize", body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["candidates"], 0);
    assert!(json["detections"].as_array().unwrap().is_empty());
}
