//! Motion-gated recording
//!
//! [`RecordingStateMachine`] decides, frame by frame, whether a segment
//! should start, continue, or stop. [`SegmentManager`] owns the single open
//! output file and writes through a [`SegmentSink`]:
//! - [`Y4mSink`]: uncompressed YUV4MPEG2, always available
//! - `Mp4Sink`: H.264 via openh264, muxed to MP4 by muxide (feature `recording`)
//!
//! # Example
//! ```rust,ignore
//! use crabwatch::recording::{Action, Container, RecordingStateMachine, SegmentManager};
//!
//! let mut machine = RecordingStateMachine::new(Duration::from_secs(3))?;
//! let mut segments = SegmentManager::new("captures", Container::Y4m.sink()?);
//!
//! match machine.step(motion, frame.timestamp) {
//!     Action::Start => handle = Some(segments.open(Local::now(), format)?),
//!     Action::Stop => segments.close(handle.take().unwrap())?,
//!     _ => {}
//! }
//! ```

#[cfg(feature = "recording")]
mod encoder;
#[cfg(feature = "recording")]
mod mp4;
mod segment;
mod sink;
mod state;
pub mod y4m;
pub mod yuv;

#[cfg(feature = "recording")]
pub use encoder::{EncodedFrame, H264Encoder};
#[cfg(feature = "recording")]
pub use mp4::{Mp4Sink, Mp4Writer};
pub use segment::{
    segment_identifier, SegmentHandle, SegmentManager, SegmentSummary, IDENTIFIER_FORMAT,
};
pub use sink::{Container, SegmentSink, SegmentWriter, WriterStats};
pub use state::{Action, RecorderState, RecordingStateMachine, SessionWindow};
pub use y4m::{Y4mSink, Y4mWriter};
