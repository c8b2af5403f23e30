//! H.264 encoding via openh264

use openh264::encoder::{Encoder, FrameType};
use openh264::formats::YUVBuffer;

use super::yuv::rgb_to_yuv420;
use crate::errors::WatchError;

/// One encoded access unit, Annex B framed
#[derive(Debug, Clone)]
pub struct EncodedFrame {
    pub data: Vec<u8>,
    pub is_keyframe: bool,
}

/// Per-segment H.264 encoder
///
/// A fresh encoder is created for every segment so each file starts with an
/// IDR frame and decodes on its own.
pub struct H264Encoder {
    encoder: Encoder,
    width: u32,
    height: u32,
    frames_encoded: u64,
}

impl H264Encoder {
    /// Dimensions must be even; openh264 takes the geometry from each buffer.
    pub fn new(width: u32, height: u32) -> Result<Self, WatchError> {
        if width == 0 || height == 0 || width % 2 != 0 || height % 2 != 0 {
            return Err(WatchError::EncodingError(format!(
                "H.264 needs even, non-zero dimensions, got {}x{}",
                width, height
            )));
        }

        let encoder = Encoder::new()
            .map_err(|e| WatchError::EncodingError(format!("Failed to create encoder: {}", e)))?;

        Ok(Self {
            encoder,
            width,
            height,
            frames_encoded: 0,
        })
    }

    pub fn encode_rgb(&mut self, rgb: &[u8]) -> Result<EncodedFrame, WatchError> {
        let expected = self.width as usize * self.height as usize * 3;
        if rgb.len() != expected {
            return Err(WatchError::EncodingError(format!(
                "Invalid frame size: expected {} bytes, got {}",
                expected,
                rgb.len()
            )));
        }

        let yuv = YUVBuffer::from_vec(
            rgb_to_yuv420(rgb, self.width, self.height),
            self.width as usize,
            self.height as usize,
        );

        let bitstream = self
            .encoder
            .encode(&yuv)
            .map_err(|e| WatchError::EncodingError(format!("Encoding failed: {}", e)))?;

        self.frames_encoded += 1;
        let is_keyframe = matches!(bitstream.frame_type(), FrameType::IDR | FrameType::I);

        Ok(EncodedFrame {
            data: bitstream.to_vec(),
            is_keyframe,
        })
    }

    pub fn frames_encoded(&self) -> u64 {
        self.frames_encoded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_odd_dimensions_rejected() {
        assert!(H264Encoder::new(641, 480).is_err());
        assert!(H264Encoder::new(0, 480).is_err());
    }

    #[test]
    fn test_first_frame_is_keyframe() {
        let mut encoder = H264Encoder::new(320, 240).unwrap();
        let encoded = encoder.encode_rgb(&vec![128u8; 320 * 240 * 3]).unwrap();

        assert!(!encoded.data.is_empty());
        assert!(
            encoded.data.starts_with(&[0x00, 0x00, 0x00, 0x01])
                || encoded.data.starts_with(&[0x00, 0x00, 0x01]),
            "Should start with Annex B start code"
        );
        assert!(encoded.is_keyframe);
        assert_eq!(encoder.frames_encoded(), 1);
    }

    #[test]
    fn test_wrong_buffer_size() {
        let mut encoder = H264Encoder::new(320, 240).unwrap();
        assert!(encoder.encode_rgb(&[0u8; 12]).is_err());
    }
}
