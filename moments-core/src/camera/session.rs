//! Camera session lifecycle.

use std::sync::Arc;

use image::RgbaImage;
use serde::Serialize;

use super::{acquire, AcquireErrorKind, CameraError, DeviceInfo, MediaBackend, MediaStream, Platform};

/// Observable session state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CameraState {
    Idle,
    Active {
        stream_id: String,
        device_id: String,
        fallback_used: bool,
    },
    Failed {
        kind: AcquireErrorKind,
        message: String,
    },
}

impl CameraState {
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active { .. })
    }
}

/// Owns at most one live stream at a time.
///
/// Every track of the previous stream is stopped before a new stream is
/// requested, when the session is stopped and when the session is dropped.
pub struct CameraSession {
    backend: Arc<dyn MediaBackend>,
    platform: Platform,
    selected_device: Option<String>,
    stream: Option<MediaStream>,
    state: CameraState,
}

impl CameraSession {
    pub fn new(backend: Arc<dyn MediaBackend>, platform: Platform) -> Self {
        Self {
            backend,
            platform,
            selected_device: None,
            stream: None,
            state: CameraState::Idle,
        }
    }

    pub fn state(&self) -> &CameraState {
        &self.state
    }

    pub fn stream(&self) -> Option<&MediaStream> {
        self.stream.as_ref()
    }

    pub fn selected_device(&self) -> Option<&str> {
        self.selected_device.as_deref()
    }

    /// Video inputs, for the device picker.
    pub async fn devices(&self) -> Result<Vec<DeviceInfo>, CameraError> {
        self.backend.enumerate_devices().await
    }

    /// Acquire a stream, releasing any current one first.
    pub async fn start(&mut self) -> Result<(), CameraError> {
        self.release();

        match acquire(
            self.backend.as_ref(),
            self.platform,
            self.selected_device.as_deref(),
        )
        .await
        {
            Ok(acquired) => {
                self.state = CameraState::Active {
                    stream_id: acquired.stream.id().to_string(),
                    device_id: acquired.stream.device_id().to_string(),
                    fallback_used: acquired.fallback_used,
                };
                self.stream = Some(acquired.stream);
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, kind = ?e.kind(), "Camera acquisition failed");
                self.state = CameraState::Failed {
                    kind: e.kind(),
                    message: e.user_message().to_string(),
                };
                Err(e)
            }
        }
    }

    /// Explicit user retry after a failure. Nothing retries on its own.
    pub async fn retry(&mut self) -> Result<(), CameraError> {
        self.start().await
    }

    /// Switch to another device; restarts the stream if one is running.
    pub async fn select_device(&mut self, device_id: impl Into<String>) -> Result<(), CameraError> {
        self.selected_device = Some(device_id.into());
        if self.state.is_active() {
            self.start().await
        } else {
            Ok(())
        }
    }

    pub fn stop(&mut self) {
        self.release();
        self.state = CameraState::Idle;
    }

    /// Current frame of the live stream.
    pub async fn capture_frame(&self) -> Result<RgbaImage, CameraError> {
        match &self.stream {
            Some(stream) if stream.is_active() => self.backend.grab_frame(stream).await,
            _ => Err(CameraError::NotActive),
        }
    }

    fn release(&mut self) {
        if let Some(stream) = self.stream.take() {
            stream.stop_all();
            tracing::debug!(stream_id = %stream.id(), "Camera stream released");
        }
    }
}

impl Drop for CameraSession {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for CameraSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CameraSession")
            .field("platform", &self.platform)
            .field("selected_device", &self.selected_device)
            .field("state", &self.state)
            .finish()
    }
}
