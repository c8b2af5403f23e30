//! crabwatch: motion-gated video segment recorder
//!
//! Watches a video source, decides frame by frame whether something moved,
//! and records segments that bracket each motion event plus a trailing
//! grace period, so one event is one file rather than a burst of clips.
//!
//! # Features
//! - Gaussian-mixture background subtraction with shadow suppression
//! - Border-following region extraction with a minimum-area filter
//! - Hysteresis state machine driven by frame timestamps
//! - One segment file per session, named after its start time
//! - Y4M output always; H.264/MP4 with the `recording` feature
//! - Y4M file sources always; live cameras with the `camera` feature
//!
//! # Usage
//! ```toml
//! [dependencies]
//! crabwatch = { version = "0.1", features = ["recording", "camera"] }
//! ```
//!
//! ```rust,ignore
//! use std::sync::atomic::AtomicBool;
//! use crabwatch::{BackgroundSubtractionDetector, MotionPipeline, WatchConfig};
//!
//! let config = WatchConfig::load_or_default();
//! let source = crabwatch::source::open_source(&config.source, config.capture.buffer)?;
//! let detector = BackgroundSubtractionDetector::from_config(&config.detection);
//! let mut pipeline = MotionPipeline::from_config(&config, source, detector)?;
//!
//! let summary = pipeline.run(&AtomicBool::new(false))?;
//! println!("{} segments", summary.segments.len());
//! ```
pub mod config;
pub mod detection;
pub mod errors;
pub mod invariant_ppt;
pub mod pipeline;
pub mod recording;
pub mod source;
pub mod timing;
pub mod types;

// Testing utilities - synthetic scenes and scripted detectors
pub mod testing;

// Re-exports for convenience
pub use config::WatchConfig;
pub use detection::{BackgroundSubtractionDetector, Detection, MotionDetector};
pub use errors::WatchError;
pub use pipeline::{FrameOutcome, MotionPipeline, RunSummary};
pub use recording::{Action, Container, RecorderState, RecordingStateMachine, SegmentManager};
pub use source::{CapturePolicy, FrameSource};
pub use types::{BoundingBox, Frame, MotionRegion, VideoFormat};

/// Initialize logging; `RUST_LOG` wins when set
pub fn init_logging() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "crabwatch=info");
    }
    let _ = env_logger::try_init();
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

#[cfg(test)]
mod lib_tests {
    use super::*;

    #[test]
    fn test_crate_info() {
        assert_eq!(NAME, "crabwatch");
        assert!(!VERSION.is_empty());
        assert!(!DESCRIPTION.is_empty());
    }
}
