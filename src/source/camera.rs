//! Live camera source via nokhwa

use nokhwa::{
    pixel_format::RgbFormat,
    query,
    utils::{ApiBackend, CameraIndex, RequestedFormat, RequestedFormatType},
    CallbackCamera,
};
use serde::Serialize;

use super::FrameSource;
use crate::config::SourceConfig;
use crate::errors::WatchError;
use crate::timing::StreamClock;
use crate::types::{Frame, VideoFormat};

/// One entry of the device listing
#[derive(Debug, Clone, Serialize)]
pub struct DeviceInfo {
    pub index: String,
    pub name: String,
    pub description: String,
}

/// Enumerate capture devices on the platform's default backend
pub fn list_devices() -> Result<Vec<DeviceInfo>, WatchError> {
    let cameras = query(ApiBackend::Auto)
        .map_err(|e| WatchError::SourceError(format!("Failed to query cameras: {}", e)))?;

    Ok(cameras
        .into_iter()
        .map(|info| DeviceInfo {
            index: info.index().to_string(),
            name: info.human_name(),
            description: info.description().to_string(),
        })
        .collect())
}

/// Polls frames from an open camera stream
///
/// Frames are stamped from a [`StreamClock`] started when the stream opens,
/// so timestamps are monotonic capture offsets.
pub struct CameraSource {
    camera: CallbackCamera,
    format: VideoFormat,
    clock: StreamClock,
    next_sequence: u64,
}

impl CameraSource {
    pub fn open(index: u32, config: &SourceConfig) -> Result<Self, WatchError> {
        let requested = RequestedFormat::new::<RgbFormat>(RequestedFormatType::None);
        let mut camera = CallbackCamera::new(CameraIndex::Index(index), requested, |_| {})
            .map_err(|e| {
                WatchError::SourceError(format!("Failed to initialize camera {}: {}", index, e))
            })?;

        camera.open_stream().map_err(|e| {
            WatchError::SourceError(format!("Failed to start camera {} stream: {}", index, e))
        })?;

        // Fall back to the configured values when the driver does not say
        let [cfg_width, cfg_height] = config.resolution;
        let (width, height) = camera
            .resolution()
            .map(|r| (r.width_x, r.height_y))
            .unwrap_or((cfg_width, cfg_height));
        let fps = camera
            .frame_rate()
            .ok()
            .filter(|&fps| fps > 0)
            .map(f64::from)
            .unwrap_or(config.fps);

        log::info!("Opened camera {}: {}x{} @ {} fps", index, width, height, fps);

        Ok(Self {
            camera,
            format: VideoFormat::new(width, height, fps),
            clock: StreamClock::new(),
            next_sequence: 0,
        })
    }
}

impl FrameSource for CameraSource {
    fn format(&self) -> VideoFormat {
        self.format
    }

    fn read(&mut self) -> Result<Option<Frame>, WatchError> {
        let buffer = self
            .camera
            .poll_frame()
            .map_err(|e| WatchError::SourceError(format!("Failed to capture frame: {}", e)))?;
        let timestamp = self.clock.now();

        let image = buffer
            .decode_image::<RgbFormat>()
            .map_err(|e| WatchError::SourceError(format!("Failed to decode frame: {}", e)))?;
        let (width, height) = (image.width(), image.height());

        let sequence = self.next_sequence;
        self.next_sequence += 1;

        Ok(Some(
            Frame::new(image.into_raw(), width, height)
                .with_sequence(sequence)
                .with_timestamp(timestamp),
        ))
    }
}

impl Drop for CameraSource {
    fn drop(&mut self) {
        if let Err(e) = self.camera.stop_stream() {
            log::warn!("Error stopping camera stream: {}", e);
        }
    }
}
