//! Camera acquisition.
//!
//! One capability interface for getting a live video stream:
//! `acquire(constraints) -> MediaStream | CameraError`, with a single fallback
//! policy shared by every screen that needs the camera:
//!
//! 1. Check the platform supports capture and the permission is not denied
//! 2. Request the preferred constraints (rear-facing on handheld devices, the
//!    selected device if any, target resolution)
//! 3. On a capability mismatch, retry once with an unconstrained request
//! 4. Anything else is surfaced to the caller
//!
//! [`CameraSession`] owns the resulting stream and guarantees every acquired
//! track is stopped before a new stream is requested and when the session ends.

mod error;
mod session;
mod simulated;

pub use error::{AcquireErrorKind, CameraError};
pub use session::{CameraSession, CameraState};
pub use simulated::{SimulatedBackend, SimulatedTrack};

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use image::RgbaImage;
use serde::{Deserialize, Serialize};

/// Which way a camera points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FacingMode {
    /// Front camera, towards the user
    User,
    /// Rear camera, away from the user
    Environment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

/// Resolution requested as an ideal (never a hard requirement).
pub const TARGET_RESOLUTION: Resolution = Resolution {
    width: 1280,
    height: 720,
};

/// Video request constraints. `device_id` and `facing` are exact requirements;
/// the resolution is only a preference.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoConstraints {
    pub device_id: Option<String>,
    pub facing: Option<FacingMode>,
    pub ideal_resolution: Option<Resolution>,
}

impl VideoConstraints {
    /// Any camera at all.
    pub fn unconstrained() -> Self {
        Self::default()
    }

    /// The first request made for a platform.
    pub fn preferred(platform: Platform, selected_device: Option<&str>) -> Self {
        Self {
            device_id: selected_device.map(str::to_string),
            facing: match platform {
                Platform::Handheld => Some(FacingMode::Environment),
                Platform::Desktop => None,
            },
            ideal_resolution: Some(TARGET_RESOLUTION),
        }
    }

    pub fn is_unconstrained(&self) -> bool {
        self.device_id.is_none() && self.facing.is_none() && self.ideal_resolution.is_none()
    }
}

/// Coarse device class, used to decide whether to prefer the rear camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Handheld,
    Desktop,
}

const HANDHELD_MARKERS: &[&str] = &[
    "android",
    "webos",
    "iphone",
    "ipad",
    "ipod",
    "blackberry",
    "iemobile",
    "opera mini",
];

impl Platform {
    /// Classify a browser user agent string.
    pub fn from_user_agent(user_agent: &str) -> Self {
        let ua = user_agent.to_ascii_lowercase();
        if HANDHELD_MARKERS.iter().any(|marker| ua.contains(marker)) {
            Self::Handheld
        } else {
            Self::Desktop
        }
    }
}

/// A video input as reported by device enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub device_id: String,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub facing: Option<FacingMode>,
}

impl DeviceInfo {
    pub fn camera(device_id: impl Into<String>, label: impl Into<String>, facing: Option<FacingMode>) -> Self {
        Self {
            device_id: device_id.into(),
            label: label.into(),
            facing,
        }
    }

    /// Label for pickers; enumerations made before permission is granted come back unlabeled.
    pub fn display_label(&self, index: usize) -> String {
        if self.label.is_empty() {
            format!("Camera {}", index + 1)
        } else {
            self.label.clone()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionState {
    Granted,
    Denied,
    Prompt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackState {
    Live,
    Ended,
}

/// One track of a stream. Stopping a track releases the hardware behind it.
pub trait MediaTrack: Send + Sync + fmt::Debug {
    fn id(&self) -> &str;
    fn label(&self) -> &str;
    fn state(&self) -> TrackState;
    fn stop(&self);
}

/// A live capture stream.
#[derive(Debug, Clone)]
pub struct MediaStream {
    id: String,
    device_id: String,
    tracks: Vec<Arc<dyn MediaTrack>>,
}

impl MediaStream {
    pub fn new(id: impl Into<String>, device_id: impl Into<String>, tracks: Vec<Arc<dyn MediaTrack>>) -> Self {
        Self {
            id: id.into(),
            device_id: device_id.into(),
            tracks,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn tracks(&self) -> &[Arc<dyn MediaTrack>] {
        &self.tracks
    }

    /// A stream is active while any of its tracks is live.
    pub fn is_active(&self) -> bool {
        self.tracks.iter().any(|t| t.state() == TrackState::Live)
    }

    pub fn stop_all(&self) {
        for track in &self.tracks {
            track.stop();
        }
    }
}

/// Platform camera API.
#[async_trait]
pub trait MediaBackend: Send + Sync {
    /// Whether the platform exposes a capture API at all.
    fn is_supported(&self) -> bool {
        true
    }

    async fn permission(&self) -> PermissionState;

    /// Video input devices only.
    async fn enumerate_devices(&self) -> Result<Vec<DeviceInfo>, CameraError>;

    async fn get_user_media(&self, constraints: &VideoConstraints) -> Result<MediaStream, CameraError>;

    /// Draw the current frame of a live stream.
    async fn grab_frame(&self, stream: &MediaStream) -> Result<RgbaImage, CameraError>;
}

/// A stream obtained by [`acquire`].
#[derive(Debug)]
pub struct Acquired {
    pub stream: MediaStream,
    /// Whether the preferred request failed and the unconstrained one was used
    pub fallback_used: bool,
}

/// Acquire a stream with the shared fallback policy.
pub async fn acquire(
    backend: &dyn MediaBackend,
    platform: Platform,
    selected_device: Option<&str>,
) -> Result<Acquired, CameraError> {
    if !backend.is_supported() {
        return Err(CameraError::Unsupported(
            "no media capture API available".to_string(),
        ));
    }

    if backend.permission().await == PermissionState::Denied {
        return Err(CameraError::PermissionDenied(
            "camera permission is denied".to_string(),
        ));
    }

    let preferred = VideoConstraints::preferred(platform, selected_device);
    match backend.get_user_media(&preferred).await {
        Ok(stream) => {
            tracing::info!(
                stream_id = %stream.id(),
                device_id = %stream.device_id(),
                ?platform,
                "Camera acquired"
            );
            Ok(Acquired {
                stream,
                fallback_used: false,
            })
        }
        Err(e) if e.allows_fallback() => {
            tracing::warn!(error = %e, "Preferred camera request failed, retrying unconstrained");
            let stream = backend
                .get_user_media(&VideoConstraints::unconstrained())
                .await?;
            tracing::info!(
                stream_id = %stream.id(),
                device_id = %stream.device_id(),
                "Camera acquired with basic constraints"
            );
            Ok(Acquired {
                stream,
                fallback_used: true,
            })
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_from_user_agent() {
        let iphone = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) AppleWebKit/605.1.15";
        let android = "Mozilla/5.0 (Linux; Android 14; Pixel 8) AppleWebKit/537.36 Chrome/120 Mobile";
        let desktop = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 Chrome/120 Safari/537.36";

        assert_eq!(Platform::from_user_agent(iphone), Platform::Handheld);
        assert_eq!(Platform::from_user_agent(android), Platform::Handheld);
        assert_eq!(Platform::from_user_agent(desktop), Platform::Desktop);
        assert_eq!(Platform::from_user_agent("Opera/9.80 (J2ME/MIDP; Opera Mini/9.80)"), Platform::Handheld);
    }

    #[test]
    fn test_preferred_constraints() {
        let handheld = VideoConstraints::preferred(Platform::Handheld, None);
        assert_eq!(handheld.facing, Some(FacingMode::Environment));
        assert_eq!(handheld.ideal_resolution, Some(TARGET_RESOLUTION));

        let desktop = VideoConstraints::preferred(Platform::Desktop, Some("cam-2"));
        assert_eq!(desktop.facing, None);
        assert_eq!(desktop.device_id.as_deref(), Some("cam-2"));
    }

    #[test]
    fn test_unconstrained() {
        assert!(VideoConstraints::unconstrained().is_unconstrained());
        assert!(!VideoConstraints::preferred(Platform::Desktop, None).is_unconstrained());
    }

    #[test]
    fn test_display_label_falls_back_to_index() {
        let unlabeled = DeviceInfo::camera("abc", "", None);
        assert_eq!(unlabeled.display_label(1), "Camera 2");
        let labeled = DeviceInfo::camera("abc", "FaceTime HD", Some(FacingMode::User));
        assert_eq!(labeled.display_label(0), "FaceTime HD");
    }

    #[tokio::test]
    async fn test_acquire_falls_back_once() {
        let backend = SimulatedBackend::new(vec![DeviceInfo::camera("front", "Front", Some(FacingMode::User))]);

        let acquired = acquire(&backend, Platform::Handheld, None).await.unwrap();
        assert!(acquired.fallback_used);
        assert_eq!(acquired.stream.device_id(), "front");

        let requests = backend.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].facing, Some(FacingMode::Environment));
        assert!(requests[1].is_unconstrained());
    }

    #[tokio::test]
    async fn test_acquire_denied_makes_no_request() {
        let backend = SimulatedBackend::new(vec![DeviceInfo::camera("rear", "Rear", Some(FacingMode::Environment))])
            .with_permission(PermissionState::Denied);

        let err = acquire(&backend, Platform::Handheld, None).await.unwrap_err();
        assert_eq!(err.kind(), AcquireErrorKind::PermissionDenied);
        assert!(backend.requests().is_empty());
    }

    #[tokio::test]
    async fn test_acquire_unsupported() {
        let backend = SimulatedBackend::new(vec![]).unsupported();
        let err = acquire(&backend, Platform::Desktop, None).await.unwrap_err();
        assert_eq!(err.kind(), AcquireErrorKind::Unsupported);
    }

    #[tokio::test]
    async fn test_acquire_no_device_does_not_fall_back() {
        let backend = SimulatedBackend::new(vec![]);
        let err = acquire(&backend, Platform::Desktop, None).await.unwrap_err();
        assert_eq!(err.kind(), AcquireErrorKind::NoDevice);
        assert_eq!(backend.requests().len(), 1);
    }
}
