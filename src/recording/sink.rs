//! Segment writer seam: containers and the writers that produce them

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::WatchError;
use crate::types::{Frame, VideoFormat};

/// Totals reported by a writer when its file is finalized
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WriterStats {
    pub frames_written: u64,
    pub bytes_written: u64,
    pub duration_secs: f64,
}

/// Accepts frames in order and finalizes a playable file
pub trait SegmentWriter: Send {
    fn write_frame(&mut self, frame: &Frame) -> Result<(), WatchError>;

    /// Flush and finalize; the file is independently playable afterwards
    fn finish(self: Box<Self>) -> Result<WriterStats, WatchError>;
}

/// Creates writers for one container format
///
/// Implementations must refuse to overwrite an existing file.
pub trait SegmentSink: Send {
    fn extension(&self) -> &'static str;

    fn create(&self, path: &Path, format: &VideoFormat)
        -> Result<Box<dyn SegmentWriter>, WatchError>;
}

/// Output container selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Container {
    /// H.264 in MP4 (requires the `recording` feature)
    Mp4,
    /// Uncompressed YUV4MPEG2
    Y4m,
}

impl Default for Container {
    fn default() -> Self {
        if cfg!(feature = "recording") {
            Container::Mp4
        } else {
            Container::Y4m
        }
    }
}

impl Container {
    pub fn extension(&self) -> &'static str {
        match self {
            Container::Mp4 => "mp4",
            Container::Y4m => "y4m",
        }
    }

    /// Build the sink for this container
    pub fn sink(&self) -> Result<Box<dyn SegmentSink>, WatchError> {
        match self {
            #[cfg(feature = "recording")]
            Container::Mp4 => Ok(Box::new(super::mp4::Mp4Sink::default())),
            #[cfg(not(feature = "recording"))]
            Container::Mp4 => Err(WatchError::Unsupported(
                "mp4 output requires the `recording` feature".to_string(),
            )),
            Container::Y4m => Ok(Box::new(super::y4m::Y4mSink)),
        }
    }
}

impl std::str::FromStr for Container {
    type Err = WatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mp4" => Ok(Container::Mp4),
            "y4m" => Ok(Container::Y4m),
            other => Err(WatchError::ConfigError(format!(
                "Unknown container '{}' (expected mp4 or y4m)",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_container_parsing() {
        assert_eq!("MP4".parse::<Container>().unwrap(), Container::Mp4);
        assert_eq!("y4m".parse::<Container>().unwrap(), Container::Y4m);
        assert!("avi".parse::<Container>().is_err());
    }

    #[test]
    fn test_y4m_sink_always_available() {
        let sink = Container::Y4m.sink().unwrap();
        assert_eq!(sink.extension(), "y4m");
    }

    #[cfg(not(feature = "recording"))]
    #[test]
    fn test_mp4_requires_feature() {
        let err = Container::Mp4.sink().err().unwrap();
        assert_eq!(err.kind(), "unsupported");
    }
}
