//! Core value types shared by sources, detection, and recording

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A single RGB24 video frame
///
/// `timestamp` is the capture offset from the start of the stream. Sources
/// either supply it (files: frame index / fps) or stamp it from the
/// monotonic stream clock at read time (cameras).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub sequence: u64,
    pub timestamp: Duration,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            data,
            width,
            height,
            sequence: 0,
            timestamp: Duration::ZERO,
        }
    }

    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = sequence;
        self
    }

    pub fn with_timestamp(mut self, timestamp: Duration) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Expected RGB24 buffer length for the frame dimensions
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }

    /// True when the buffer size matches the dimensions and is non-empty
    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0 && self.data.len() == self.expected_len()
    }

    pub fn size_bytes(&self) -> usize {
        self.data.len()
    }
}

/// Nominal stream geometry and rate, as reported by a frame source
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VideoFormat {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
}

impl VideoFormat {
    pub fn new(width: u32, height: u32, fps: f64) -> Self {
        Self { width, height, fps }
    }

    /// Duration of one frame at the nominal rate
    pub fn frame_interval(&self) -> Duration {
        if self.fps > 0.0 {
            Duration::try_from_secs_f64(1.0 / self.fps).unwrap_or(Duration::ZERO)
        } else {
            Duration::ZERO
        }
    }
}

/// Axis-aligned box in pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// A changed region that survived the minimum-area filter
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionRegion {
    pub bounds: BoundingBox,
    pub area: f64,
}
