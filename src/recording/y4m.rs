//! YUV4MPEG2 segment writer
//!
//! Uncompressed 4:2:0 output that needs no codec. Every segment is a
//! complete stream header followed by `FRAME` records, so a file is
//! playable as soon as its writer is flushed.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use super::sink::{SegmentSink, SegmentWriter, WriterStats};
use super::yuv::{rgb_to_yuv420, yuv420_len};
use crate::errors::WatchError;
use crate::types::{Frame, VideoFormat};

pub const STREAM_MAGIC: &str = "YUV4MPEG2";
pub const FRAME_MAGIC: &str = "FRAME";

/// Express a frame rate as the `num:den` pair Y4M headers use
pub fn fps_ratio(fps: f64) -> (u32, u32) {
    let rounded = fps.round();
    if (fps - rounded).abs() < 1e-6 {
        return (rounded as u32, 1);
    }
    // NTSC-style rates (29.97, 59.94, ...)
    let ntsc = fps * 1.001;
    if (ntsc - ntsc.round()).abs() < 1e-3 {
        return ((ntsc.round() as u32) * 1000, 1001);
    }
    ((fps * 1000.0).round() as u32, 1000)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Y4mSink;

impl SegmentSink for Y4mSink {
    fn extension(&self) -> &'static str {
        "y4m"
    }

    fn create(
        &self,
        path: &Path,
        format: &VideoFormat,
    ) -> Result<Box<dyn SegmentWriter>, WatchError> {
        Ok(Box::new(Y4mWriter::create(path, format)?))
    }
}

pub struct Y4mWriter {
    out: BufWriter<File>,
    format: VideoFormat,
    frames_written: u64,
    bytes_written: u64,
}

impl Y4mWriter {
    /// Create the file and write the stream header; fails if the file exists
    pub fn create(path: &Path, format: &VideoFormat) -> Result<Self, WatchError> {
        if format.width == 0 || format.height == 0 || !(format.fps > 0.0) {
            return Err(WatchError::EncodingError(format!(
                "Invalid Y4M stream format {}x{} @ {} fps",
                format.width, format.height, format.fps
            )));
        }

        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(|e| WatchError::IoError(format!("Failed to create {:?}: {}", path, e)))?;

        let (num, den) = fps_ratio(format.fps);
        let header = format!(
            "{} W{} H{} F{}:{} Ip A1:1 C420jpeg XCOLORRANGE=LIMITED\n",
            STREAM_MAGIC, format.width, format.height, num, den
        );

        let mut out = BufWriter::new(file);
        out.write_all(header.as_bytes())?;

        Ok(Self {
            out,
            format: *format,
            frames_written: 0,
            bytes_written: header.len() as u64,
        })
    }
}

impl SegmentWriter for Y4mWriter {
    fn write_frame(&mut self, frame: &Frame) -> Result<(), WatchError> {
        if frame.width != self.format.width || frame.height != self.format.height {
            return Err(WatchError::EncodingError(format!(
                "Frame dimensions {}x{} don't match segment {}x{}",
                frame.width, frame.height, self.format.width, self.format.height
            )));
        }
        if !frame.is_valid() {
            return Err(WatchError::EncodingError(format!(
                "Frame {} buffer is {} bytes, expected {}",
                frame.sequence,
                frame.data.len(),
                frame.expected_len()
            )));
        }

        let yuv = rgb_to_yuv420(&frame.data, frame.width, frame.height);
        self.out.write_all(FRAME_MAGIC.as_bytes())?;
        self.out.write_all(b"\n")?;
        self.out.write_all(&yuv)?;

        self.frames_written += 1;
        self.bytes_written += (FRAME_MAGIC.len() + 1 + yuv420_len(frame.width, frame.height)) as u64;
        Ok(())
    }

    fn finish(mut self: Box<Self>) -> Result<WriterStats, WatchError> {
        self.out
            .flush()
            .map_err(|e| WatchError::SegmentFinalizeFailed(format!("Failed to flush Y4M: {}", e)))?;
        self.out
            .get_ref()
            .sync_all()
            .map_err(|e| WatchError::SegmentFinalizeFailed(format!("Failed to sync Y4M: {}", e)))?;

        Ok(WriterStats {
            frames_written: self.frames_written,
            bytes_written: self.bytes_written,
            duration_secs: self.frames_written as f64 / self.format.fps,
        })
    }
}
