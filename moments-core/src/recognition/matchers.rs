//! Built-in match strategies.

use std::sync::Arc;

use async_trait::async_trait;
use image::{imageops, DynamicImage};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{DetectedStamp, Frame, MatchStrategy, RecognitionError, Region, StampLookup, TextRecognizer};
use crate::fingerprint::{Fingerprint, Fingerprinter};
use crate::model::normalize_label;

/// Shortest OCR text that is looked up. Shorter fragments match too many names.
pub const MIN_TEXT_LEN: usize = 3;

/// Default Hamming distance (out of 64 bits) accepted as the same stamp.
pub const DEFAULT_MAX_DISTANCE: u32 = 12;

/// Regions smaller than this on either side are not fingerprinted.
const MIN_REGION_SIDE: u32 = 8;

/// OCR the region and look the text up as a stamp name fragment.
pub struct OcrNameMatcher {
    recognizer: Arc<dyn TextRecognizer>,
    lookup: Arc<dyn StampLookup>,
}

impl OcrNameMatcher {
    pub fn new(recognizer: Arc<dyn TextRecognizer>, lookup: Arc<dyn StampLookup>) -> Self {
        Self { recognizer, lookup }
    }
}

#[async_trait]
impl MatchStrategy for OcrNameMatcher {
    fn name(&self) -> &'static str {
        "ocr-name"
    }

    async fn match_region(&self, frame: &Frame, region: &Region) -> Result<Option<DetectedStamp>, RecognitionError> {
        let raw = self.recognizer.recognize(frame, &region.bounding_box).await?;
        let text = normalize_label(&raw);
        if text.chars().count() < MIN_TEXT_LEN {
            tracing::trace!(text = %text, "OCR text too short to look up");
            return Ok(None);
        }

        let mut candidates = self.lookup.find_by_name_fragment(&text).await?;
        match candidates.len() {
            0 => Ok(None),
            1 => {
                let stamp = candidates.remove(0);
                Ok(Some(DetectedStamp {
                    stamp_id: stamp.id,
                    name: stamp.name,
                    confidence: region.probability,
                    bounding_box: region.bounding_box,
                }))
            }
            n => {
                tracing::debug!(text = %text, candidates = n, "Ambiguous OCR match ignored");
                Ok(None)
            }
        }
    }
}

/// A stored stamp's fingerprint, as exported for offline matching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FingerprintTarget {
    pub stamp_id: Uuid,
    pub name: String,
    /// Hex-encoded 64-bit fingerprint
    pub fingerprint: String,
}

#[derive(Debug, Clone)]
struct ParsedTarget {
    stamp_id: Uuid,
    name: String,
    fingerprint: Fingerprint,
}

/// Crop the region from the (already enhanced) frame, fingerprint it and pick
/// the nearest stored fingerprint within `max_distance` bits.
#[derive(Debug, Clone)]
pub struct FingerprintMatcher {
    targets: Vec<ParsedTarget>,
    max_distance: u32,
    fingerprinter: Fingerprinter,
}

impl FingerprintMatcher {
    /// Targets with an unparseable fingerprint are skipped with a warning.
    pub fn new(targets: impl IntoIterator<Item = FingerprintTarget>, max_distance: u32) -> Self {
        let targets = targets
            .into_iter()
            .filter_map(|t| match Fingerprint::from_hex(&t.fingerprint) {
                Ok(fingerprint) => Some(ParsedTarget {
                    stamp_id: t.stamp_id,
                    name: t.name,
                    fingerprint,
                }),
                Err(e) => {
                    tracing::warn!(stamp_id = %t.stamp_id, error = %e, "Skipping target with invalid fingerprint");
                    None
                }
            })
            .collect();

        Self {
            targets,
            max_distance,
            fingerprinter: Fingerprinter,
        }
    }

    pub fn target_count(&self) -> usize {
        self.targets.len()
    }

    pub fn max_distance(&self) -> u32 {
        self.max_distance
    }

    /// Nearest target to `probe`, rejecting ties between different stamps.
    fn nearest(&self, probe: &Fingerprint) -> Option<(&ParsedTarget, u32)> {
        let mut best: Option<(&ParsedTarget, u32)> = None;
        let mut tied = false;

        for target in &self.targets {
            let Some(distance) = probe.distance(&target.fingerprint) else {
                continue;
            };
            match best {
                Some((current, d)) if distance == d && current.stamp_id != target.stamp_id => tied = true,
                Some((_, d)) if distance >= d => {}
                _ => {
                    best = Some((target, distance));
                    tied = false;
                }
            }
        }

        match best {
            Some((target, distance)) if distance <= self.max_distance => {
                if tied {
                    tracing::debug!(distance, "Fingerprint tie between stamps ignored");
                    None
                } else {
                    Some((target, distance))
                }
            }
            _ => None,
        }
    }
}

#[async_trait]
impl MatchStrategy for FingerprintMatcher {
    fn name(&self) -> &'static str {
        "fingerprint"
    }

    async fn match_region(&self, frame: &Frame, region: &Region) -> Result<Option<DetectedStamp>, RecognitionError> {
        let Some(bbox) = region.bounding_box.clamp_to(frame.width(), frame.height()) else {
            return Ok(None);
        };
        if bbox.width < MIN_REGION_SIDE || bbox.height < MIN_REGION_SIDE {
            return Ok(None);
        }

        let crop = imageops::crop_imm(frame, bbox.x, bbox.y, bbox.width, bbox.height).to_image();
        let probe = self
            .fingerprinter
            .fingerprint_image(&DynamicImage::ImageRgba8(crop));

        Ok(self.nearest(&probe).map(|(target, distance)| DetectedStamp {
            stamp_id: target.stamp_id,
            name: target.name.clone(),
            confidence: 1.0 - distance as f32 / 64.0,
            bounding_box: bbox,
        }))
    }
}
