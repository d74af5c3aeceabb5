//! One recognition cycle.

use std::sync::Arc;

use super::{DetectedStamp, Frame, MatchStrategy, RecognitionError, RegionDetector};
use crate::enhance::{enhance_rgba_in_place, EnhanceParams};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineConfig {
    /// Regions the detector is less sure about than this are not matched
    pub min_confidence: f32,
    /// Run the enhancement filter over the frame before detection
    pub preprocess: bool,
    pub enhance: EnhanceParams,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.5,
            preprocess: true,
            enhance: EnhanceParams::default(),
        }
    }
}

/// Detector plus matching strategy.
pub struct RecognitionPipeline {
    detector: Arc<dyn RegionDetector>,
    strategy: Arc<dyn MatchStrategy>,
    config: PipelineConfig,
}

impl RecognitionPipeline {
    pub fn new(detector: Arc<dyn RegionDetector>, strategy: Arc<dyn MatchStrategy>) -> Self {
        Self {
            detector,
            strategy,
            config: PipelineConfig::default(),
        }
    }

    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    /// Run one cycle over `frame`. Any failing step aborts the whole cycle.
    pub async fn run_cycle(&self, frame: Frame) -> Result<Vec<DetectedStamp>, RecognitionError> {
        let frame = if self.config.preprocess {
            let params = self.config.enhance;
            tokio::task::spawn_blocking(move || {
                let mut frame = frame;
                let (width, height) = frame.dimensions();
                enhance_rgba_in_place(&mut frame, width, height, &params)
                    .map(|()| frame)
                    .map_err(|e| RecognitionError::Preprocess(e.to_string()))
            })
            .await
            .map_err(|e| RecognitionError::Preprocess(e.to_string()))??
        } else {
            frame
        };

        let regions = self.detector.detect(&frame).await?;
        let mut detections = Vec::new();

        for region in regions
            .iter()
            .filter(|r| r.probability >= self.config.min_confidence)
        {
            if let Some(found) = self.strategy.match_region(&frame, region).await? {
                detections.push(found);
            }
        }

        tracing::debug!(
            strategy = self.strategy.name(),
            regions = regions.len(),
            detections = detections.len(),
            "Recognition cycle complete"
        );

        Ok(detections)
    }
}
