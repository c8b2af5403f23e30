//! Change mask extraction: blur, background scoring, binarization

use image::{imageops, ImageBuffer, Rgb, RgbImage};

use super::background::{BackgroundModel, BackgroundParams};
use crate::config::DetectionConfig;
use crate::errors::WatchError;
use crate::types::Frame;

/// Scores strictly above this value are "changed"; only full-confidence
/// foreground (255) passes, shadows (127) do not.
pub const BINARIZE_THRESHOLD: u8 = 254;

/// Binary per-pixel change mask, row-major
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeMask {
    width: u32,
    height: u32,
    changed: Vec<bool>,
}

impl ChangeMask {
    /// All-static mask
    pub fn empty(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            changed: vec![false; width as usize * height as usize],
        }
    }

    /// Build a mask by evaluating `f(x, y)` for every pixel
    pub fn from_fn(width: u32, height: u32, f: impl Fn(u32, u32) -> bool) -> Self {
        let mut changed = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                changed.push(f(x, y));
            }
        }
        Self {
            width,
            height,
            changed,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Out-of-bounds coordinates read as static
    pub fn is_changed(&self, x: u32, y: u32) -> bool {
        if x >= self.width || y >= self.height {
            return false;
        }
        self.changed[(y * self.width + x) as usize]
    }

    pub fn changed_count(&self) -> usize {
        self.changed.iter().filter(|&&c| c).count()
    }
}

/// Smoothing kernel size to Gaussian sigma, the usual rule for a fixed odd kernel
pub fn kernel_sigma(kernel_size: u32) -> f32 {
    0.3 * ((kernel_size as f32 - 1.0) * 0.5 - 1.0) + 0.8
}

/// Turns frames into change masks against a continuously learned background
///
/// The background model lives inside the extractor and is only touched by
/// [`ChangeMaskExtractor::extract`].
///
/// A stock MOG2 subtractor reports every pixel of its first frame as
/// foreground. Here the first frame after the model is (re)sized is static
/// instead, so starting the camera or changing resolution never opens a
/// segment on its own.
pub struct ChangeMaskExtractor {
    model: BackgroundModel,
    blur_sigma: Option<f32>,
}

impl ChangeMaskExtractor {
    pub fn new(params: BackgroundParams, blur_kernel: u32) -> Self {
        let blur_sigma = if blur_kernel > 1 {
            Some(kernel_sigma(blur_kernel))
        } else {
            None
        };
        Self {
            model: BackgroundModel::new(params),
            blur_sigma,
        }
    }

    pub fn from_config(config: &DetectionConfig) -> Self {
        Self::new(
            BackgroundParams::new(config.history, config.var_threshold),
            config.blur_kernel,
        )
    }

    /// Score one frame and return its binary change mask
    ///
    /// The first frame after the model is (re)sized only seeds the model:
    /// with no history there is nothing to differ from, so it yields an
    /// all-static mask.
    pub fn extract(&mut self, frame: &Frame) -> Result<ChangeMask, WatchError> {
        if !frame.is_valid() {
            return Err(WatchError::SourceError(format!(
                "Frame {} has {} bytes, expected {} for {}x{} RGB",
                frame.sequence,
                frame.data.len(),
                frame.expected_len(),
                frame.width,
                frame.height
            )));
        }

        let view: ImageBuffer<Rgb<u8>, &[u8]> =
            ImageBuffer::from_raw(frame.width, frame.height, frame.data.as_slice()).ok_or_else(
                || WatchError::SourceError("Frame buffer does not fit its dimensions".to_string()),
            )?;

        let smoothed: RgbImage = match self.blur_sigma {
            Some(sigma) => imageops::blur(&view, sigma),
            None => ImageBuffer::from_raw(frame.width, frame.height, frame.data.clone())
                .ok_or_else(|| {
                    WatchError::SourceError("Frame buffer does not fit its dimensions".to_string())
                })?,
        };

        let scores = self.model.apply(&smoothed);
        if self.model.frames_seen() <= 1 {
            return Ok(ChangeMask::empty(frame.width, frame.height));
        }

        let changed = scores
            .pixels()
            .map(|p| p[0] > BINARIZE_THRESHOLD)
            .collect();

        Ok(ChangeMask {
            width: frame.width,
            height: frame.height,
            changed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gray_frame(width: u32, height: u32, value: u8) -> Frame {
        Frame::new(vec![value; (width * height * 3) as usize], width, height)
    }

    fn with_block(mut frame: Frame, x0: u32, y0: u32, size: u32, value: u8) -> Frame {
        for y in y0..y0 + size {
            for x in x0..x0 + size {
                let idx = ((y * frame.width + x) * 3) as usize;
                frame.data[idx..idx + 3].copy_from_slice(&[value, value, value]);
            }
        }
        frame
    }

    #[test]
    fn test_kernel_sigma() {
        assert!((kernel_sigma(5) - 1.1).abs() < 1e-6);
        assert!((kernel_sigma(3) - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_first_frame_is_static() {
        let mut extractor = ChangeMaskExtractor::new(BackgroundParams::default(), 5);
        let mask = extractor.extract(&gray_frame(32, 32, 90)).unwrap();
        assert_eq!(mask.changed_count(), 0);
    }

    #[test]
    fn test_first_frame_after_resize_is_static() {
        let mut extractor = ChangeMaskExtractor::new(BackgroundParams::default(), 5);
        for _ in 0..5 {
            extractor.extract(&gray_frame(32, 32, 90)).unwrap();
        }
        let resized = with_block(gray_frame(48, 40, 20), 10, 10, 16, 240);
        assert_eq!(extractor.extract(&resized).unwrap().changed_count(), 0);
    }

    #[test]
    fn test_block_appears_in_mask() {
        let mut extractor = ChangeMaskExtractor::new(BackgroundParams::default(), 5);
        for _ in 0..10 {
            extractor.extract(&gray_frame(64, 64, 20)).unwrap();
        }

        let moved = with_block(gray_frame(64, 64, 20), 20, 20, 16, 240);
        let mask = extractor.extract(&moved).unwrap();

        assert!(mask.is_changed(28, 28), "block center should be changed");
        assert!(!mask.is_changed(2, 2), "far corner should be static");
        assert!(mask.changed_count() >= 100);
    }

    #[test]
    fn test_invalid_frame_is_rejected() {
        let mut extractor = ChangeMaskExtractor::new(BackgroundParams::default(), 5);
        let bad = Frame::new(vec![0u8; 7], 4, 4);
        let err = extractor.extract(&bad).unwrap_err();
        assert_eq!(err.kind(), "source-error");
    }

    #[test]
    fn test_mask_from_fn() {
        let mask = ChangeMask::from_fn(4, 3, |x, y| x == y);
        assert_eq!(mask.changed_count(), 3);
        assert!(mask.is_changed(2, 2));
        assert!(!mask.is_changed(3, 2));
        assert!(!mask.is_changed(10, 10));
    }
}
