//! Deterministic frames and sources for offline testing
//!
//! Scenes are a fixed gradient background with an optional bright block,
//! so a background model settles quickly and the block reads as motion.

use std::collections::VecDeque;
use std::time::Duration;

use crate::detection::{Detection, MotionDetector};
use crate::errors::WatchError;
use crate::source::FrameSource;
use crate::types::{BoundingBox, Frame, MotionRegion, VideoFormat};

/// Brightness of scene objects
pub const OBJECT_LEVEL: u8 = 240;

/// A solid block drawn over the background
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SceneObject {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl SceneObject {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// Render frame `frame_number` of a static scene, optionally with an object
///
/// The background does not depend on `frame_number`; only the sequence
/// number does.
pub fn synthetic_scene(
    frame_number: u64,
    width: u32,
    height: u32,
    object: Option<SceneObject>,
) -> Frame {
    let mut data = vec![0u8; (width * height * 3) as usize];

    for y in 0..height {
        for x in 0..width {
            let idx = ((y * width + x) * 3) as usize;
            let inside = object.is_some_and(|o| {
                x >= o.x && x < o.x + o.width && y >= o.y && y < o.y + o.height
            });
            if inside {
                data[idx..idx + 3].copy_from_slice(&[OBJECT_LEVEL; 3]);
            } else {
                data[idx] = 40 + (x % 64) as u8;
                data[idx + 1] = 60 + (y % 64) as u8;
                data[idx + 2] = 90;
            }
        }
    }

    Frame::new(data, width, height).with_sequence(frame_number)
}

fn nominal_timestamp(index: u64, fps: f64) -> Duration {
    Duration::from_nanos(index * (1e9 / fps).round() as u64)
}

/// In-memory frame source
pub struct SyntheticSource {
    format: VideoFormat,
    frames: VecDeque<Frame>,
    failure: Option<WatchError>,
}

impl SyntheticSource {
    /// Serve prepared frames in order
    pub fn from_frames(format: VideoFormat, frames: Vec<Frame>) -> Self {
        Self {
            format,
            frames: frames.into(),
            failure: None,
        }
    }

    /// `count` identical scene frames at the nominal rate
    pub fn still(width: u32, height: u32, fps: f64, count: u64) -> Self {
        let frames = (0..count)
            .map(|i| {
                synthetic_scene(i, width, height, None).with_timestamp(nominal_timestamp(i, fps))
            })
            .collect();
        Self::from_frames(VideoFormat::new(width, height, fps), frames)
    }

    /// Scene frames with `object` present wherever `present(i)` is true
    pub fn with_object(
        width: u32,
        height: u32,
        fps: f64,
        count: u64,
        object: SceneObject,
        present: impl Fn(u64) -> bool,
    ) -> Self {
        let frames = (0..count)
            .map(|i| {
                let obj = if present(i) { Some(object) } else { None };
                synthetic_scene(i, width, height, obj).with_timestamp(nominal_timestamp(i, fps))
            })
            .collect();
        Self::from_frames(VideoFormat::new(width, height, fps), frames)
    }

    /// Fail with `error` once the prepared frames run out
    pub fn then_fail(mut self, error: WatchError) -> Self {
        self.failure = Some(error);
        self
    }

    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

impl FrameSource for SyntheticSource {
    fn format(&self) -> VideoFormat {
        self.format
    }

    fn read(&mut self) -> Result<Option<Frame>, WatchError> {
        match self.frames.pop_front() {
            Some(frame) => Ok(Some(frame)),
            None => match self.failure.take() {
                Some(e) => Err(e),
                None => Ok(None),
            },
        }
    }
}

/// Detector that answers from a script instead of looking at pixels
///
/// Motion frames report one region covering the top-left quarter.
pub struct ScriptedDetector {
    decide: Box<dyn FnMut(&Frame) -> bool>,
    calls: u64,
}

impl ScriptedDetector {
    pub fn new(decide: impl FnMut(&Frame) -> bool + 'static) -> Self {
        Self {
            decide: Box::new(decide),
            calls: 0,
        }
    }

    /// Motion flags by frame order; frames past the end are static
    pub fn sequence(flags: Vec<bool>) -> Self {
        let mut flags = flags.into_iter();
        Self::new(move |_| flags.next().unwrap_or(false))
    }

    /// Motion while the frame timestamp falls in any `[start, end]` window (seconds)
    pub fn windows(windows: Vec<(f64, f64)>) -> Self {
        Self::new(move |frame| {
            let t = frame.timestamp.as_secs_f64();
            windows
                .iter()
                .any(|&(start, end)| t >= start - 1e-9 && t <= end + 1e-9)
        })
    }

    pub fn calls(&self) -> u64 {
        self.calls
    }
}

impl MotionDetector for ScriptedDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Detection, WatchError> {
        self.calls += 1;
        if !(self.decide)(frame) {
            return Ok(Detection::default());
        }

        let bounds = BoundingBox::new(0, 0, (frame.width / 2).max(1), (frame.height / 2).max(1));
        Ok(Detection {
            motion_detected: true,
            regions: vec![MotionRegion {
                bounds,
                area: (bounds.width * bounds.height) as f64,
            }],
            changed_pixels: (bounds.width * bounds.height) as usize,
        })
    }
}
