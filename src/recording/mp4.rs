//! H.264/MP4 segment writer (openh264 + muxide)

use std::fs::{File, OpenOptions};
use std::io::BufWriter;
use std::path::Path;

use muxide::api::{Metadata, MuxerBuilder, VideoCodec};

use super::encoder::H264Encoder;
use super::sink::{SegmentSink, SegmentWriter, WriterStats};
use crate::errors::WatchError;
use crate::types::{Frame, VideoFormat};

/// Creates MP4 files; `fast_start` puts the index at the front of the file
#[derive(Debug, Clone, Copy)]
pub struct Mp4Sink {
    pub fast_start: bool,
}

impl Default for Mp4Sink {
    fn default() -> Self {
        Self { fast_start: true }
    }
}

impl SegmentSink for Mp4Sink {
    fn extension(&self) -> &'static str {
        "mp4"
    }

    fn create(
        &self,
        path: &Path,
        format: &VideoFormat,
    ) -> Result<Box<dyn SegmentWriter>, WatchError> {
        Ok(Box::new(Mp4Writer::create(path, format, self.fast_start)?))
    }
}

pub struct Mp4Writer {
    encoder: H264Encoder,
    muxer: muxide::api::Muxer<BufWriter<File>>,
    width: u32,
    height: u32,
    frame_duration_secs: f64,
    frames_written: u64,
}

impl Mp4Writer {
    pub fn create(path: &Path, format: &VideoFormat, fast_start: bool) -> Result<Self, WatchError> {
        // Validate before touching the filesystem
        let encoder = H264Encoder::new(format.width, format.height)?;

        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(|e| WatchError::IoError(format!("Failed to create {:?}: {}", path, e)))?;

        let muxer = MuxerBuilder::new(BufWriter::new(file))
            .video(VideoCodec::H264, format.width, format.height, format.fps)
            .with_fast_start(fast_start)
            .with_metadata(Metadata::new().with_current_time())
            .build()
            .map_err(|e| WatchError::EncodingError(format!("Failed to create muxer: {}", e)))?;

        Ok(Self {
            encoder,
            muxer,
            width: format.width,
            height: format.height,
            frame_duration_secs: 1.0 / format.fps,
            frames_written: 0,
        })
    }
}

impl SegmentWriter for Mp4Writer {
    fn write_frame(&mut self, frame: &Frame) -> Result<(), WatchError> {
        if frame.width != self.width || frame.height != self.height {
            return Err(WatchError::EncodingError(format!(
                "Frame dimensions {}x{} don't match segment {}x{}",
                frame.width, frame.height, self.width, self.height
            )));
        }

        let encoded = self.encoder.encode_rgb(&frame.data)?;
        // openh264 may skip a frame under rate control
        if encoded.data.is_empty() {
            log::trace!("Encoder produced no data for frame {}", frame.sequence);
            return Ok(());
        }

        // Nominal-rate timestamps keep playback at the source's speed
        let pts = self.frames_written as f64 * self.frame_duration_secs;
        self.muxer
            .write_video(pts, &encoded.data, encoded.is_keyframe)
            .map_err(|e| WatchError::EncodingError(format!("Failed to write frame: {}", e)))?;

        self.frames_written += 1;
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<WriterStats, WatchError> {
        let stats = self.muxer.finish_with_stats().map_err(|e| {
            WatchError::SegmentFinalizeFailed(format!("Failed to finalize MP4: {}", e))
        })?;

        Ok(WriterStats {
            frames_written: stats.video_frames,
            bytes_written: stats.bytes_written,
            duration_secs: stats.duration_secs,
        })
    }
}
