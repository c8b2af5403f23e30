//! Frame sources
//!
//! A source yields RGB24 frames in capture order, each stamped with its
//! offset from the start of the stream. Selectors pick the implementation:
//! - `file:<path.y4m>`: YUV4MPEG2 4:2:0 file, timestamps from frame index
//! - `camera:<index>`: live device via nokhwa (feature `camera`)
//!
//! With a buffered [`CapturePolicy`] the source runs on its own capture
//! thread behind a bounded queue (see [`ThreadedSource`]).

#[cfg(feature = "camera")]
pub mod camera;
pub mod threaded;
pub mod y4m;

#[cfg(feature = "camera")]
pub use camera::{list_devices, CameraSource, DeviceInfo};
pub use threaded::ThreadedSource;
pub use y4m::Y4mSource;

use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::SourceConfig;
use crate::errors::WatchError;
use crate::types::{Frame, VideoFormat};

pub trait FrameSource {
    /// Nominal geometry and rate of the stream
    fn format(&self) -> VideoFormat;

    /// Next frame in capture order; `Ok(None)` once the source is exhausted
    fn read(&mut self) -> Result<Option<Frame>, WatchError>;

    /// Frames captured but discarded before reaching the reader
    fn dropped_frames(&self) -> u64 {
        0
    }
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn format(&self) -> VideoFormat {
        (**self).format()
    }

    fn read(&mut self) -> Result<Option<Frame>, WatchError> {
        (**self).read()
    }

    fn dropped_frames(&self) -> u64 {
        (**self).dropped_frames()
    }
}

/// How capture is decoupled from processing
///
/// `inline` reads on the processing thread, so slow processing lowers the
/// effective capture rate. The buffered policies read on a capture thread:
/// `drop_oldest` never stalls capture and discards the oldest queued frame
/// when full; `block` stalls capture until there is room.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum CapturePolicy {
    #[default]
    Inline,
    DropOldest { capacity: usize },
    Block { capacity: usize },
}

/// Parsed `[source] selector`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceSelector {
    Camera(u32),
    File(PathBuf),
}

impl FromStr for SourceSelector {
    type Err = WatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(index) = s.strip_prefix("camera:") {
            let index = index.parse::<u32>().map_err(|_| {
                WatchError::ConfigError(format!("Invalid camera index in '{}'", s))
            })?;
            return Ok(SourceSelector::Camera(index));
        }
        if let Some(path) = s.strip_prefix("file:") {
            if path.is_empty() {
                return Err(WatchError::ConfigError("Empty file source path".to_string()));
            }
            return Ok(SourceSelector::File(PathBuf::from(path)));
        }
        Err(WatchError::ConfigError(format!(
            "Unknown source '{}' (expected camera:<index> or file:<path>)",
            s
        )))
    }
}

/// Open the configured source on the calling thread
pub fn open_inline(config: &SourceConfig) -> Result<Box<dyn FrameSource>, WatchError> {
    match config.selector.parse::<SourceSelector>()? {
        SourceSelector::File(path) => {
            let source = Y4mSource::open(&path)?;
            log::info!(
                "Opened {:?}: {}x{} @ {:.2} fps",
                path,
                source.format().width,
                source.format().height,
                source.format().fps
            );
            Ok(Box::new(source))
        }
        #[cfg(feature = "camera")]
        SourceSelector::Camera(index) => Ok(Box::new(CameraSource::open(index, config)?)),
        #[cfg(not(feature = "camera"))]
        SourceSelector::Camera(index) => Err(WatchError::Unsupported(format!(
            "camera:{} requires the `camera` feature",
            index
        ))),
    }
}

/// Open the configured source with the given capture policy
pub fn open_source(
    config: &SourceConfig,
    policy: CapturePolicy,
) -> Result<Box<dyn FrameSource>, WatchError> {
    match policy {
        CapturePolicy::Inline => open_inline(config),
        buffered => {
            let config = config.clone();
            let source = ThreadedSource::spawn(move || open_inline(&config), buffered)?;
            Ok(Box::new(source))
        }
    }
}
