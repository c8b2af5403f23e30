//! Per-frame motion detection
//!
//! Frames flow through two stages:
//! 1. [`ChangeMaskExtractor`] blurs the frame, scores it against an adaptive
//!    background model, and binarizes the score into a [`ChangeMask`]
//! 2. [`MotionClassifier`] traces connected regions in the mask and keeps
//!    those larger than the minimum area
//!
//! The recording logic only consumes the resulting boolean, so any
//! deterministic [`MotionDetector`] can stand in for the default one.

pub mod annotate;
pub mod background;
pub mod classifier;
pub mod contour;
pub mod mask;

pub use background::{BackgroundModel, BackgroundParams};
pub use classifier::MotionClassifier;
pub use contour::{find_contours, BorderKind, Contour, Point};
pub use mask::{ChangeMask, ChangeMaskExtractor};

use crate::config::DetectionConfig;
use crate::errors::WatchError;
use crate::types::{Frame, MotionRegion};

/// Outcome of analysing one frame
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Detection {
    pub motion_detected: bool,
    /// Surviving regions, in no particular order
    pub regions: Vec<MotionRegion>,
    pub changed_pixels: usize,
}

/// Anything that turns a frame into a motion decision
pub trait MotionDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Detection, WatchError>;
}

/// Background-subtraction detector: change mask extraction + region classification
pub struct BackgroundSubtractionDetector {
    extractor: ChangeMaskExtractor,
    classifier: MotionClassifier,
}

impl BackgroundSubtractionDetector {
    pub fn new(extractor: ChangeMaskExtractor, classifier: MotionClassifier) -> Self {
        Self {
            extractor,
            classifier,
        }
    }

    pub fn from_config(config: &DetectionConfig) -> Self {
        Self::new(
            ChangeMaskExtractor::from_config(config),
            MotionClassifier::new(config.min_area),
        )
    }
}

impl MotionDetector for BackgroundSubtractionDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Detection, WatchError> {
        let mask = self.extractor.extract(frame)?;
        let detection = self.classifier.classify(&mask);
        log::debug!(
            "Frame {}: {} changed pixels, {} regions",
            frame.sequence,
            detection.changed_pixels,
            detection.regions.len()
        );
        Ok(detection)
    }
}
