//! Targets command - build a fingerprint targets file from a running server.
//!
//! Lists the server's stamps, downloads each stamp's processed image and
//! fingerprints it locally. Transient HTTP failures are retried with
//! exponential backoff; a stamp whose image cannot be fetched falls back to
//! the fingerprint the server stored, or is skipped when there is none.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use backoff::{future::retry_notify, ExponentialBackoff};
use colored::Colorize;
use moments_core::{enhance_bytes, Fingerprinter, FingerprintTarget, Stamp};
use reqwest::{Client, StatusCode};
use tracing::{debug, info, warn};
use url::Url;

use crate::utils::write_file;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_RETRY_TIME: Duration = Duration::from_secs(10);

/// Execute the targets command.
pub async fn execute(server: Url, output: PathBuf, quiet: bool) -> Result<()> {
    let client = Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .context("Failed to create HTTP client")?;

    let stamps_url = server.join("api/stamps").context("Invalid server URL")?;
    if !quiet {
        println!("{}", format!("Fetching stamps from {}", stamps_url).dimmed());
    }

    let TargetSet { targets, skipped } = build_targets(&client, &stamps_url).await?;

    let json = serde_json::to_string_pretty(&targets).context("Failed to serialize targets")?;
    write_file(&output, json.as_bytes())?;
    info!(path = %output.display(), count = targets.len(), skipped, "Targets saved");

    if !quiet {
        println!();
        println!("{}", "Recognition targets written".green().bold());
        println!();
        println!("   {} {}", "Saved:".dimmed(), output.display());
        println!("   {} {}", "Targets:".dimmed(), targets.len());
        if skipped > 0 {
            println!("   {} {}", "Skipped:".dimmed(), skipped.to_string().yellow());
        }
    }

    Ok(())
}

/// Targets built from a server's stamps.
struct TargetSet {
    targets: Vec<FingerprintTarget>,
    /// Stamps with neither a fetchable image nor a stored fingerprint
    skipped: usize,
}

async fn build_targets(client: &Client, stamps_url: &Url) -> Result<TargetSet> {
    let body = fetch_with_retry(client, stamps_url.as_str())
        .await
        .context("Failed to list stamps from server")?;
    let stamps: Vec<Stamp> =
        serde_json::from_slice(&body).context("Failed to decode stamp list from server")?;
    info!(count = stamps.len(), "Listed stamps");

    let mut targets = Vec::with_capacity(stamps.len());
    let mut skipped = 0usize;

    for stamp in &stamps {
        match target_for(client, stamp).await {
            Ok(target) => targets.push(target),
            Err(e) => match &stamp.fingerprint {
                Some(stored) => {
                    warn!(stamp_id = %stamp.id, error = %e, "Using stored fingerprint");
                    targets.push(FingerprintTarget {
                        stamp_id: stamp.id,
                        name: stamp.name.clone(),
                        fingerprint: stored.clone(),
                    });
                }
                None => {
                    warn!(stamp_id = %stamp.id, error = %e, "Skipping stamp");
                    skipped += 1;
                }
            },
        }
    }

    Ok(TargetSet { targets, skipped })
}

/// Download and fingerprint one stamp's recognition image.
async fn target_for(client: &Client, stamp: &Stamp) -> Result<FingerprintTarget> {
    let url = stamp.recognition_image_url();
    let data = fetch_with_retry(client, url).await?;

    // Stamps without a processed variant are enhanced here so both sides match
    let data = if stamp.processed_image_url.is_some() {
        data
    } else {
        enhance_bytes(&data).context("Failed to decode stamp image")?
    };

    let fingerprint = Fingerprinter
        .fingerprint_bytes(&data)
        .context("Failed to decode stamp image")?;

    if let Some(stored) = &stamp.fingerprint {
        if stored != &fingerprint.to_hex() {
            debug!(stamp_id = %stamp.id, stored = %stored, computed = %fingerprint, "Fingerprint differs from server");
        }
    }

    Ok(FingerprintTarget {
        stamp_id: stamp.id,
        name: stamp.name.clone(),
        fingerprint: fingerprint.to_hex(),
    })
}

/// GET a URL, retrying transient failures.
async fn fetch_with_retry(client: &Client, url: &str) -> Result<Vec<u8>> {
    let start = Instant::now();
    let backoff = ExponentialBackoff {
        initial_interval: Duration::from_millis(200),
        max_interval: Duration::from_secs(5),
        max_elapsed_time: Some(MAX_RETRY_TIME),
        ..Default::default()
    };

    let result = retry_notify(
        backoff,
        || async { fetch_once(client, url).await },
        |err: anyhow::Error, duration: Duration| {
            warn!(
                error = %err,
                retry_after_ms = duration.as_millis() as u64,
                "Retry scheduled"
            );
        },
    )
    .await;

    debug!(url, latency_ms = start.elapsed().as_millis() as u64, ok = result.is_ok(), "Fetch finished");
    result
}

async fn fetch_once(client: &Client, url: &str) -> std::result::Result<Vec<u8>, backoff::Error<anyhow::Error>> {
    let response = client.get(url).send().await.map_err(|e| {
        let err = anyhow!("Request to {} failed: {}", url, e);
        if is_transient_error(&e) {
            backoff::Error::transient(err)
        } else {
            backoff::Error::permanent(err)
        }
    })?;

    let status = response.status();
    if !status.is_success() {
        let err = anyhow!("Request to {} returned status {}", url, status);
        return if is_transient_status(status) {
            Err(backoff::Error::transient(err))
        } else {
            Err(backoff::Error::permanent(err))
        };
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| backoff::Error::transient(anyhow!("Request to {} failed mid-body: {}", url, e)))?;
    Ok(bytes.to_vec())
}

fn is_transient_error(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect() || error.is_request()
}

fn is_transient_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
            | StatusCode::BAD_GATEWAY
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use axum::{
        http::header,
        response::{IntoResponse, Response},
        routing::get,
        Json, Router,
    };
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use serde_json::json;

    fn processed_png() -> Vec<u8> {
        let img = RgbImage::from_fn(64, 64, |x, y| {
            if (20..44).contains(&x) && (20..44).contains(&y) {
                Rgb([240, 240, 240])
            } else {
                let v = ((x * 3 + y) % 256) as u8;
                Rgb([v, v, v])
            }
        });
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut out, ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }

    fn png_response(png: &[u8]) -> Response {
        ([(header::CONTENT_TYPE, "image/png")], png.to_vec()).into_response()
    }

    fn serve(listener: tokio::net::TcpListener, app: Router) {
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
    }

    /// Ephemeral local port and its base URL
    async fn bind() -> (tokio::net::TcpListener, Url) {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = Url::parse(&format!("http://{}/", listener.local_addr().unwrap())).unwrap();
        (listener, base)
    }

    fn client() -> Client {
        Client::builder().timeout(REQUEST_TIMEOUT).build().unwrap()
    }

    #[test]
    fn test_transient_statuses() {
        assert!(is_transient_status(StatusCode::SERVICE_UNAVAILABLE));
        assert!(is_transient_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(!is_transient_status(StatusCode::NOT_FOUND));
        assert!(!is_transient_status(StatusCode::INTERNAL_SERVER_ERROR));
    }

    #[tokio::test]
    async fn test_image_failures_fall_back_or_skip() {
        let (listener, base) = bind().await;
        let png = processed_png();

        let good = base.join("media/stamps/good.png").unwrap();
        let missing = base.join("media/stamps/missing.png").unwrap();
        let stamps = json!([
            {
                "id": "00000000-0000-0000-0000-000000000001",
                "created_at": "2026-01-03T10:00:00Z",
                "name": "Blue Bird",
                "image_url": good.as_str(),
                "processed_image_url": good.as_str()
            },
            {
                "id": "00000000-0000-0000-0000-000000000002",
                "created_at": "2026-01-02T10:00:00Z",
                "name": "Red Fox",
                "image_url": missing.as_str(),
                "processed_image_url": missing.as_str(),
                "fingerprint": "00ff00ff00ff00ff"
            },
            {
                "id": "00000000-0000-0000-0000-000000000003",
                "created_at": "2026-01-01T10:00:00Z",
                "name": "Lost Stamp",
                "image_url": missing.as_str()
            }
        ]);

        let served = png.clone();
        let app = Router::new()
            .route("/api/stamps", get(move || async move { Json(stamps) }))
            .route("/media/stamps/good.png", get(move || async move { png_response(&served) }))
            .route("/media/stamps/missing.png", get(|| async { StatusCode::NOT_FOUND }));
        serve(listener, app);

        let set = build_targets(&client(), &base.join("api/stamps").unwrap())
            .await
            .unwrap();
        assert_eq!(set.targets.len(), 2);
        assert_eq!(set.skipped, 1);

        let bird = &set.targets[0];
        assert_eq!(bird.name, "Blue Bird");
        assert_eq!(bird.fingerprint, Fingerprinter.fingerprint_bytes(&png).unwrap().to_hex());

        let fox = &set.targets[1];
        assert_eq!(fox.name, "Red Fox");
        assert_eq!(fox.fingerprint, "00ff00ff00ff00ff");
    }

    #[tokio::test]
    async fn test_execute_writes_targets_file() {
        let (listener, base) = bind().await;
        let png = processed_png();
        let good = base.join("media/stamps/good.png").unwrap();
        let stamps = json!([{
            "id": "00000000-0000-0000-0000-000000000001",
            "created_at": "2026-01-03T10:00:00Z",
            "name": "Blue Bird",
            "image_url": good.as_str(),
            "processed_image_url": good.as_str()
        }]);

        let app = Router::new()
            .route("/api/stamps", get(move || async move { Json(stamps) }))
            .route("/media/stamps/good.png", get(move || async move { png_response(&png) }));
        serve(listener, app);

        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("targets.json");
        execute(base, output.clone(), true).await.unwrap();

        let written: Vec<FingerprintTarget> =
            serde_json::from_slice(&std::fs::read(&output).unwrap()).unwrap();
        assert_eq!(written.len(), 1);
        assert_eq!(written[0].name, "Blue Bird");
        assert_eq!(written[0].fingerprint.len(), 16);
    }

    #[tokio::test]
    async fn test_transient_status_is_retried_and_not_found_is_not() {
        let (listener, base) = bind().await;
        let png = processed_png();
        let flaky_hits = Arc::new(AtomicUsize::new(0));
        let missing_hits = Arc::new(AtomicUsize::new(0));

        let flaky = flaky_hits.clone();
        let missing = missing_hits.clone();
        let app = Router::new()
            .route(
                "/flaky.png",
                get(move || async move {
                    if flaky.fetch_add(1, Ordering::SeqCst) == 0 {
                        StatusCode::SERVICE_UNAVAILABLE.into_response()
                    } else {
                        png_response(&png)
                    }
                }),
            )
            .route(
                "/missing.png",
                get(move || async move {
                    missing.fetch_add(1, Ordering::SeqCst);
                    StatusCode::NOT_FOUND
                }),
            );
        serve(listener, app);

        let client = client();
        let data = fetch_with_retry(&client, base.join("flaky.png").unwrap().as_str())
            .await
            .unwrap();
        assert!(!data.is_empty());
        assert_eq!(flaky_hits.load(Ordering::SeqCst), 2);

        let err = fetch_with_retry(&client, base.join("missing.png").unwrap().as_str())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("404"));
        assert_eq!(missing_hits.load(Ordering::SeqCst), 1);
    }
}
