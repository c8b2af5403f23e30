//! YUV4MPEG2 file source
//!
//! Reads 4:2:0 streams (the layout every common encoder emits for `.y4m`)
//! and converts each frame to RGB24. Frame `n` is stamped `n / fps`, so a
//! file replays with the timing it was recorded at regardless of how fast
//! it is read.

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::time::Duration;

use super::FrameSource;
use crate::errors::WatchError;
use crate::recording::y4m::{FRAME_MAGIC, STREAM_MAGIC};
use crate::recording::yuv::{yuv420_len, yuv420_to_rgb};
use crate::types::{Frame, VideoFormat};

#[derive(Debug, Clone, Copy, PartialEq)]
struct StreamHeader {
    width: u32,
    height: u32,
    fps_num: u32,
    fps_den: u32,
}

fn parse_header(line: &str) -> Result<StreamHeader, WatchError> {
    let mut tokens = line.split_ascii_whitespace();
    if tokens.next() != Some(STREAM_MAGIC) {
        return Err(WatchError::SourceError(
            "Not a YUV4MPEG2 stream".to_string(),
        ));
    }

    let mut width = None;
    let mut height = None;
    let mut rate = None;
    for token in tokens {
        let mut chars = token.chars();
        let tag = chars.next();
        let value = chars.as_str();
        match tag {
            Some('W') => width = value.parse::<u32>().ok(),
            Some('H') => height = value.parse::<u32>().ok(),
            Some('F') => {
                rate = value.split_once(':').and_then(|(n, d)| {
                    Some((n.parse::<u32>().ok()?, d.parse::<u32>().ok()?))
                })
            }
            Some('C') if !value.starts_with("420") => {
                return Err(WatchError::Unsupported(format!(
                    "Y4M colorspace C{} (only 4:2:0 is supported)",
                    value
                )))
            }
            Some('I') if value != "p" && value != "?" => {
                return Err(WatchError::Unsupported(format!(
                    "Y4M interlacing I{} (only progressive is supported)",
                    value
                )))
            }
            // Aspect ratio and X- extensions do not affect decoding
            _ => {}
        }
    }

    let (width, height) = match (width, height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        _ => {
            return Err(WatchError::SourceError(
                "Y4M header is missing valid W/H".to_string(),
            ))
        }
    };
    let (fps_num, fps_den) = match rate {
        Some((n, d)) if n > 0 && d > 0 => (n, d),
        _ => {
            return Err(WatchError::SourceError(
                "Y4M header is missing a valid frame rate".to_string(),
            ))
        }
    };

    Ok(StreamHeader {
        width,
        height,
        fps_num,
        fps_den,
    })
}

pub struct Y4mSource<R = BufReader<File>> {
    reader: R,
    header: StreamHeader,
    next_index: u64,
    frame_buf: Vec<u8>,
}

impl Y4mSource<BufReader<File>> {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, WatchError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            WatchError::SourceError(format!("Failed to open {:?}: {}", path, e))
        })?;
        Self::from_reader(BufReader::new(file))
    }
}

impl<R: BufRead> Y4mSource<R> {
    pub fn from_reader(mut reader: R) -> Result<Self, WatchError> {
        let mut line = String::new();
        reader
            .read_line(&mut line)
            .map_err(|e| WatchError::SourceError(format!("Failed to read Y4M header: {}", e)))?;
        let header = parse_header(line.trim_end())?;

        Ok(Self {
            reader,
            frame_buf: vec![0u8; yuv420_len(header.width, header.height)],
            header,
            next_index: 0,
        })
    }

    fn timestamp_of(&self, index: u64) -> Duration {
        let nanos = index as u128 * self.header.fps_den as u128 * 1_000_000_000
            / self.header.fps_num as u128;
        Duration::from_nanos(nanos as u64)
    }
}

impl<R: BufRead> FrameSource for Y4mSource<R> {
    fn format(&self) -> VideoFormat {
        VideoFormat::new(
            self.header.width,
            self.header.height,
            self.header.fps_num as f64 / self.header.fps_den as f64,
        )
    }

    fn read(&mut self) -> Result<Option<Frame>, WatchError> {
        let mut line = Vec::new();
        let n = self
            .reader
            .read_until(b'\n', &mut line)
            .map_err(|e| WatchError::SourceError(format!("Failed to read frame header: {}", e)))?;
        if n == 0 {
            return Ok(None);
        }
        if !line.starts_with(FRAME_MAGIC.as_bytes()) {
            return Err(WatchError::SourceError(format!(
                "Corrupt Y4M stream at frame {}",
                self.next_index
            )));
        }

        self.reader.read_exact(&mut self.frame_buf).map_err(|e| {
            WatchError::SourceError(format!(
                "Truncated Y4M frame {}: {}",
                self.next_index, e
            ))
        })?;

        let index = self.next_index;
        self.next_index += 1;
        let rgb = yuv420_to_rgb(&self.frame_buf, self.header.width, self.header.height);

        Ok(Some(
            Frame::new(rgb, self.header.width, self.header.height)
                .with_sequence(index)
                .with_timestamp(self.timestamp_of(index)),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn stream(header: &str, frames: usize, frame_len: usize) -> Cursor<Vec<u8>> {
        let mut bytes = header.as_bytes().to_vec();
        for i in 0..frames {
            bytes.extend_from_slice(b"FRAME\n");
            bytes.extend(std::iter::repeat(16 + i as u8).take(frame_len));
        }
        Cursor::new(bytes)
    }

    #[test]
    fn test_reads_frames_with_timestamps() {
        let data = stream("YUV4MPEG2 W4 H2 F25:1 Ip A1:1 C420jpeg\n", 3, 12);
        let mut source = Y4mSource::from_reader(data).unwrap();
        assert_eq!(source.format(), VideoFormat::new(4, 2, 25.0));

        let mut stamps = Vec::new();
        while let Some(frame) = source.read().unwrap() {
            assert!(frame.is_valid());
            stamps.push(frame.timestamp);
        }
        assert_eq!(
            stamps,
            vec![
                Duration::ZERO,
                Duration::from_millis(40),
                Duration::from_millis(80)
            ]
        );
    }

    #[test]
    fn test_frame_parameters_are_skipped() {
        let mut bytes = b"YUV4MPEG2 W2 H2 F30000:1001\nFRAME Ixyz\n".to_vec();
        bytes.extend([100u8; 6]);
        let mut source = Y4mSource::from_reader(Cursor::new(bytes)).unwrap();
        assert!(source.read().unwrap().is_some());
        assert!(source.read().unwrap().is_none());
    }

    #[test]
    fn test_rejects_unsupported_streams() {
        let err = Y4mSource::from_reader(stream("YUV4MPEG2 W4 H2 F25:1 C444\n", 0, 0))
            .err()
            .unwrap();
        assert_eq!(err.kind(), "unsupported");

        assert!(Y4mSource::from_reader(stream("RIFF W4 H2 F25:1\n", 0, 0)).is_err());
        assert!(Y4mSource::from_reader(stream("YUV4MPEG2 W4 F25:1\n", 0, 0)).is_err());
    }

    #[test]
    fn test_truncated_frame_is_an_error() {
        let mut source =
            Y4mSource::from_reader(stream("YUV4MPEG2 W4 H2 F25:1\n", 1, 5)).unwrap();
        assert_eq!(source.read().unwrap_err().kind(), "source-error");
    }
}
