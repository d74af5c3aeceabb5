//! Router configuration module
//!
//! Configures all routes, middleware layers, and creates the application router.

use std::{sync::Arc, time::Duration};

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderName, Method, StatusCode},
    routing::{delete, get, patch, post},
    Router,
};
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::Config;
use crate::handlers::{
    create_association_handler, delete_association_handler, delete_stamp_handler, delete_video_handler, health,
    list_associations_handler, list_stamps_handler, list_videos_handler, media_handler, playback_handler, ready,
    recognize_handler, rename_stamp_handler, retitle_video_handler, search_stamps_handler, upload_stamp_handler,
    upload_video_handler,
};
use crate::openapi::ApiDoc;
use crate::state::AppState;

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Create the application router with default config and in-memory backends (for testing)
pub fn create_router() -> Router {
    let config = Config::default();
    let state = AppState::in_memory(&config);
    create_router_with_state(&config, state)
}

/// Create the application router with custom configuration and shared state
pub fn create_router_with_state(config: &Config, state: AppState) -> Router {
    // Configure CORS based on allowed_origins
    let cors = match &config.allowed_origins {
        Some(origins) if !origins.is_empty() => {
            let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
            tracing::info!("CORS: Restricting to {} origin(s)", origins.len());
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods([
                    Method::GET,
                    Method::POST,
                    Method::PATCH,
                    Method::DELETE,
                    Method::OPTIONS,
                ])
                .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        }
        _ => {
            tracing::warn!("CORS: Allowing all origins (dev mode)");
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        }
    };

    // Request body limit (replaces axum's 2 MB extractor default)
    let body_limit = RequestBodyLimitLayer::new(config.body_limit_mb * 1024 * 1024);

    // Request timeout
    let timeout = TimeoutLayer::with_status_code(
        StatusCode::REQUEST_TIMEOUT,
        Duration::from_secs(config.timeout_secs),
    );

    let request_id_header = HeaderName::from_static(REQUEST_ID_HEADER);

    let api = Router::new()
        .route("/api/stamps", get(list_stamps_handler).post(upload_stamp_handler))
        .route("/api/stamps/search", get(search_stamps_handler))
        .route(
            "/api/stamps/{id}",
            patch(rename_stamp_handler).delete(delete_stamp_handler),
        )
        .route("/api/stamps/{id}/playback", get(playback_handler))
        .route("/api/videos", get(list_videos_handler).post(upload_video_handler))
        .route(
            "/api/videos/{id}",
            patch(retitle_video_handler).delete(delete_video_handler),
        )
        .route(
            "/api/associations",
            get(list_associations_handler).post(create_association_handler),
        )
        .route("/api/associations/{id}", delete(delete_association_handler))
        .route("/api/recognize", post(recognize_handler))
        .route("/media/{bucket}/{key}", get(media_handler))
        .route("/health", get(health))
        .route("/ready", get(ready))
        .with_state(state);

    // Base router with common layers
    let router = Router::new()
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(api)
        .layer(cors)
        .layer(DefaultBodyLimit::disable())
        .layer(body_limit)
        .layer(timeout)
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()));

    // Conditionally apply rate limiting (disabled in tests, enabled in production)
    let router = if config.rate_limit_enabled {
        match GovernorConfigBuilder::default()
            .per_second(config.rate_limit_per_sec)
            .burst_size(config.rate_limit_burst)
            .finish()
        {
            Some(governor_conf) => {
                tracing::info!(
                    "Rate limiting: {} req/s (burst: {})",
                    config.rate_limit_per_sec,
                    config.rate_limit_burst
                );
                router.layer(GovernorLayer::new(Arc::new(governor_conf)))
            }
            None => {
                tracing::error!(
                    per_second = config.rate_limit_per_sec,
                    burst = config.rate_limit_burst,
                    "Invalid rate limit settings, rate limiting DISABLED"
                );
                router
            }
        }
    } else {
        tracing::warn!("Rate limiting: DISABLED");
        router
    };

    router
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
}
