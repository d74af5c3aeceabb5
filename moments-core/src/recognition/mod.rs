//! Frame-based stamp recognition.
//!
//! A recognition cycle takes one camera frame through:
//!
//! 1. The enhancement filter (see [`crate::enhance`])
//! 2. A [`RegionDetector`] proposing candidate regions
//! 3. A [`MatchStrategy`] deciding which stored stamp, if any, each region shows
//!
//! Detection models and OCR engines are opaque capabilities behind traits.
//! Two strategies ship with the crate: [`OcrNameMatcher`] (text lookup against
//! stamp names) and [`FingerprintMatcher`] (perceptual fingerprint distance).

mod matchers;
mod pipeline;

pub use matchers::{FingerprintMatcher, FingerprintTarget, OcrNameMatcher, DEFAULT_MAX_DISTANCE, MIN_TEXT_LEN};
pub use pipeline::{PipelineConfig, RecognitionPipeline};

use async_trait::async_trait;
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::camera::CameraError;
use crate::model::StampSummary;

/// A captured camera frame.
pub type Frame = RgbaImage;

#[derive(Debug, Error)]
pub enum RecognitionError {
    #[error("Recognition model is not ready")]
    NotReady,

    #[error("Frame capture failed: {0}")]
    Capture(#[from] CameraError),

    #[error("Preprocessing failed: {0}")]
    Preprocess(String),

    #[error("Region detection failed: {0}")]
    Detection(String),

    #[error("Text recognition failed: {0}")]
    TextRecognition(String),

    #[error("Stamp lookup failed: {0}")]
    Lookup(String),
}

/// Pixel rectangle inside a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    pub fn full(frame: &Frame) -> Self {
        Self::new(0, 0, frame.width(), frame.height())
    }

    /// Intersect with a `width` x `height` frame. `None` when nothing is left.
    pub fn clamp_to(&self, width: u32, height: u32) -> Option<Self> {
        if self.x >= width || self.y >= height {
            return None;
        }
        let w = self.width.min(width - self.x);
        let h = self.height.min(height - self.y);
        if w == 0 || h == 0 {
            return None;
        }
        Some(Self::new(self.x, self.y, w, h))
    }
}

/// A candidate region proposed by a detector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub bounding_box: BoundingBox,
    /// Detector probability in `[0, 1]`
    pub probability: f32,
}

/// A stored stamp recognized in a frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedStamp {
    pub stamp_id: Uuid,
    pub name: String,
    pub confidence: f32,
    pub bounding_box: BoundingBox,
}

/// Opaque object/region detection model.
#[async_trait]
pub trait RegionDetector: Send + Sync {
    async fn detect(&self, frame: &Frame) -> Result<Vec<Region>, RecognitionError>;
}

/// Proposes the whole frame as a single region.
///
/// Suitable when the user holds the stamp up to fill the viewfinder.
#[derive(Debug, Clone, Copy, Default)]
pub struct WholeFrameDetector;

#[async_trait]
impl RegionDetector for WholeFrameDetector {
    async fn detect(&self, frame: &Frame) -> Result<Vec<Region>, RecognitionError> {
        if frame.width() == 0 || frame.height() == 0 {
            return Ok(Vec::new());
        }
        Ok(vec![Region {
            bounding_box: BoundingBox::full(frame),
            probability: 1.0,
        }])
    }
}

/// Opaque OCR engine.
#[async_trait]
pub trait TextRecognizer: Send + Sync {
    async fn recognize(&self, frame: &Frame, region: &BoundingBox) -> Result<String, RecognitionError>;
}

/// Stamp name lookup, answered by the catalog.
#[async_trait]
pub trait StampLookup: Send + Sync {
    /// Stamps whose name contains `fragment`, case-insensitively.
    async fn find_by_name_fragment(&self, fragment: &str) -> Result<Vec<StampSummary>, RecognitionError>;
}

/// Decides which stored stamp a region shows.
#[async_trait]
pub trait MatchStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// `Ok(None)` when the region shows no known stamp or the answer is ambiguous.
    async fn match_region(&self, frame: &Frame, region: &Region) -> Result<Option<DetectedStamp>, RecognitionError>;
}
