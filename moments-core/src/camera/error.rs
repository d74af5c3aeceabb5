//! Camera acquisition errors.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Classification of an acquisition failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcquireErrorKind {
    /// The user (or a policy) denied camera access. Terminal until the user
    /// changes the permission and retries.
    PermissionDenied,
    /// No device satisfies the requested constraints.
    NoMatchingDevice,
    /// There is no capture device at all.
    NoDevice,
    /// The platform lacks a camera API.
    Unsupported,
    /// The device exists but cannot be opened (held by another stream).
    DeviceBusy,
    /// An operation needed an active stream and there was none.
    NotActive,
}

#[derive(Debug, Clone, Error)]
pub enum CameraError {
    #[error("Camera permission denied: {0}")]
    PermissionDenied(String),

    #[error("No camera satisfies the requested constraints: {0}")]
    Overconstrained(String),

    #[error("No camera device available")]
    NoDevice,

    #[error("Camera access is not supported: {0}")]
    Unsupported(String),

    #[error("Camera could not be opened: {0}")]
    DeviceBusy(String),

    #[error("Camera is not active")]
    NotActive,
}

impl CameraError {
    pub fn kind(&self) -> AcquireErrorKind {
        match self {
            Self::PermissionDenied(_) => AcquireErrorKind::PermissionDenied,
            Self::Overconstrained(_) => AcquireErrorKind::NoMatchingDevice,
            Self::NoDevice => AcquireErrorKind::NoDevice,
            Self::Unsupported(_) => AcquireErrorKind::Unsupported,
            Self::DeviceBusy(_) => AcquireErrorKind::DeviceBusy,
            Self::NotActive => AcquireErrorKind::NotActive,
        }
    }

    /// Only capability mismatches earn the one automatic retry with a looser request.
    pub fn allows_fallback(&self) -> bool {
        matches!(self, Self::Overconstrained(_))
    }

    /// Persistent message shown while the session is in the failed state.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::PermissionDenied(_) => {
                "Camera access was denied. Allow camera access in your browser or system settings, then try again."
            }
            Self::Overconstrained(_) | Self::NoDevice => {
                "No camera was found. Connect a camera and try again."
            }
            Self::Unsupported(_) => "This browser does not support camera access.",
            Self::DeviceBusy(_) => {
                "The camera is in use by another application. Close it and try again."
            }
            Self::NotActive => "The camera is not running.",
        }
    }
}
