//! In-process camera backend.
//!
//! Serves a fixed device table and a rotating set of still frames. Devices
//! are exclusive: a second stream on a device whose tracks are still live
//! fails with [`CameraError::DeviceBusy`], which is how a leaked stream shows
//! up on real hardware.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use image::{Rgba, RgbaImage};

use super::{
    CameraError, DeviceInfo, MediaBackend, MediaStream, MediaTrack, PermissionState, TrackState,
    VideoConstraints,
};

#[derive(Debug)]
pub struct SimulatedTrack {
    id: String,
    label: String,
    device_id: String,
    live: AtomicBool,
}

impl SimulatedTrack {
    pub fn device_id(&self) -> &str {
        &self.device_id
    }
}

impl MediaTrack for SimulatedTrack {
    fn id(&self) -> &str {
        &self.id
    }

    fn label(&self) -> &str {
        &self.label
    }

    fn state(&self) -> TrackState {
        if self.live.load(Ordering::SeqCst) {
            TrackState::Live
        } else {
            TrackState::Ended
        }
    }

    fn stop(&self) {
        self.live.store(false, Ordering::SeqCst);
    }
}

#[derive(Debug)]
struct Inner {
    devices: Vec<DeviceInfo>,
    permission: PermissionState,
    frames: Vec<RgbaImage>,
    tracks: Vec<Arc<SimulatedTrack>>,
    requests: Vec<VideoConstraints>,
}

#[derive(Debug)]
pub struct SimulatedBackend {
    supported: bool,
    inner: Mutex<Inner>,
    next_id: AtomicUsize,
    next_frame: AtomicUsize,
}

impl SimulatedBackend {
    pub fn new(devices: Vec<DeviceInfo>) -> Self {
        Self {
            supported: true,
            inner: Mutex::new(Inner {
                devices,
                permission: PermissionState::Granted,
                frames: Vec::new(),
                tracks: Vec::new(),
                requests: Vec::new(),
            }),
            next_id: AtomicUsize::new(1),
            next_frame: AtomicUsize::new(0),
        }
    }

    pub fn with_permission(self, permission: PermissionState) -> Self {
        self.lock().permission = permission;
        self
    }

    /// Frames returned by `grab_frame`, in rotation.
    pub fn with_frames(self, frames: Vec<RgbaImage>) -> Self {
        self.lock().frames = frames;
        self
    }

    /// A platform without a capture API.
    pub fn unsupported(mut self) -> Self {
        self.supported = false;
        self
    }

    pub fn set_permission(&self, permission: PermissionState) {
        self.lock().permission = permission;
    }

    /// Every constraint set passed to `get_user_media`, in order.
    pub fn requests(&self) -> Vec<VideoConstraints> {
        self.lock().requests.clone()
    }

    /// Tracks that have been handed out and not yet stopped.
    pub fn live_track_count(&self) -> usize {
        self.lock()
            .tracks
            .iter()
            .filter(|t| t.state() == TrackState::Live)
            .count()
    }

    pub fn issued_track_count(&self) -> usize {
        self.lock().tracks.len()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn next_id(&self) -> usize {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }
}

fn satisfies(device: &DeviceInfo, constraints: &VideoConstraints) -> bool {
    if let Some(id) = &constraints.device_id {
        if &device.device_id != id {
            return false;
        }
    }
    if let Some(facing) = constraints.facing {
        if device.facing != Some(facing) {
            return false;
        }
    }
    true
}

fn placeholder_frame() -> RgbaImage {
    RgbaImage::from_pixel(64, 64, Rgba([128, 128, 128, 255]))
}

#[async_trait]
impl MediaBackend for SimulatedBackend {
    fn is_supported(&self) -> bool {
        self.supported
    }

    async fn permission(&self) -> PermissionState {
        self.lock().permission
    }

    async fn enumerate_devices(&self) -> Result<Vec<DeviceInfo>, CameraError> {
        if !self.supported {
            return Err(CameraError::Unsupported(
                "device enumeration unavailable".to_string(),
            ));
        }
        let inner = self.lock();
        // Labels are only exposed once access has been granted
        Ok(inner
            .devices
            .iter()
            .map(|d| DeviceInfo {
                label: if inner.permission == PermissionState::Granted {
                    d.label.clone()
                } else {
                    String::new()
                },
                ..d.clone()
            })
            .collect())
    }

    async fn get_user_media(&self, constraints: &VideoConstraints) -> Result<MediaStream, CameraError> {
        if !self.supported {
            return Err(CameraError::Unsupported(
                "getUserMedia unavailable".to_string(),
            ));
        }

        let track = {
            let mut inner = self.lock();
            inner.requests.push(constraints.clone());

            if inner.permission == PermissionState::Denied {
                return Err(CameraError::PermissionDenied(
                    "user denied camera access".to_string(),
                ));
            }

            if inner.devices.is_empty() {
                return Err(CameraError::NoDevice);
            }

            let device = inner
                .devices
                .iter()
                .find(|d| satisfies(d, constraints))
                .cloned()
                .ok_or_else(|| {
                    CameraError::Overconstrained(format!(
                        "no device matches device_id={:?} facing={:?}",
                        constraints.device_id, constraints.facing
                    ))
                })?;

            let busy = inner
                .tracks
                .iter()
                .any(|t| t.device_id == device.device_id && t.state() == TrackState::Live);
            if busy {
                return Err(CameraError::DeviceBusy(format!(
                    "{} is already streaming",
                    device.device_id
                )));
            }

            let track = Arc::new(SimulatedTrack {
                id: format!("track-{}", self.next_id()),
                label: device.label.clone(),
                device_id: device.device_id.clone(),
                live: AtomicBool::new(true),
            });
            inner.tracks.push(track.clone());
            track
        };

        let device_id = track.device_id.clone();
        Ok(MediaStream::new(
            format!("stream-{}", self.next_id()),
            device_id,
            vec![track as Arc<dyn MediaTrack>],
        ))
    }

    async fn grab_frame(&self, stream: &MediaStream) -> Result<RgbaImage, CameraError> {
        if !stream.is_active() {
            return Err(CameraError::NotActive);
        }

        let inner = self.lock();
        if inner.frames.is_empty() {
            return Ok(placeholder_frame());
        }
        let index = self.next_frame.fetch_add(1, Ordering::SeqCst) % inner.frames.len();
        Ok(inner.frames[index].clone())
    }
}
