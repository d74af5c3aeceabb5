//! Moments Core - stamp recognition building blocks for Epic Moments
//!
//! This crate holds everything in Epic Moments that is not HTTP plumbing:
//!
//! - Catalog records (stamps, videos, associations)
//! - Upload validation shared by every upload surface
//! - The fixed enhancement filter used to build recognition-friendly stamp variants
//! - 64-bit perceptual fingerprints for stamp matching
//! - Camera acquisition behind one capability interface with a single fallback policy
//! - A best-effort recognition pipeline and the scanner loop that drives it
//!
//! # Example
//!
//! ```no_run
//! use moments_core::{enhance_bytes, Fingerprinter};
//!
//! # fn example() -> moments_core::Result<()> {
//! let original = std::fs::read("stamp.jpg").unwrap();
//! let processed_png = enhance_bytes(&original)?;
//! let fingerprint = Fingerprinter::default().fingerprint_bytes(&processed_png)?;
//! println!("stamp fingerprint: {}", fingerprint.to_hex());
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod model;
pub mod upload;

#[cfg(feature = "imaging")]
pub mod enhance;
#[cfg(feature = "imaging")]
pub mod fingerprint;

#[cfg(feature = "runtime")]
pub mod camera;
#[cfg(feature = "runtime")]
pub mod recognition;
#[cfg(feature = "runtime")]
pub mod scanner;

pub use error::{MomentsError, Result};
pub use model::{
    name_matches, normalize_label, Association, AssociationDetail, NewAssociation, Stamp, StampSummary, Video,
};
pub use upload::{
    file_extension, validate_label, validate_upload, UploadKind, MAX_STAMP_IMAGE_SIZE,
    MAX_VIDEO_SIZE,
};

#[cfg(feature = "imaging")]
pub use enhance::{enhance_bytes, enhance_image, enhance_rgba_in_place, EnhanceParams};
#[cfg(feature = "imaging")]
pub use fingerprint::{hamming_distance, Fingerprint, Fingerprinter, FINGERPRINT_SIZE};

#[cfg(feature = "runtime")]
pub use camera::{
    acquire, AcquireErrorKind, CameraError, CameraSession, CameraState, DeviceInfo, FacingMode,
    MediaBackend, MediaStream, PermissionState, Platform, SimulatedBackend, VideoConstraints,
};
#[cfg(feature = "runtime")]
pub use recognition::{
    BoundingBox, DetectedStamp, FingerprintMatcher, FingerprintTarget, Frame, MatchStrategy, OcrNameMatcher,
    PipelineConfig, RecognitionError, RecognitionPipeline, Region, RegionDetector, StampLookup, TextRecognizer,
    WholeFrameDetector,
};
#[cfg(feature = "runtime")]
pub use scanner::{FrameSource, ScanEvent, Scanner, ScannerConfig, ScannerHandle, SkipReason};
