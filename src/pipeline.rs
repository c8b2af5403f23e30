//! The per-frame loop: source -> detector -> state machine -> segments
//!
//! [`MotionPipeline`] is the single owner of the background model (inside
//! the detector), the state machine, and the open segment, so nothing here
//! needs a lock. Failures to open or write a segment are logged and counted
//! and never end the loop; the machine drops back to `Idle` and the next
//! motion frame starts over.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Local};
use serde::Serialize;

use crate::assert_invariant;
use crate::config::WatchConfig;
use crate::detection::annotate::draw_regions;
use crate::detection::MotionDetector;
use crate::errors::WatchError;
use crate::recording::{
    Action, RecorderState, RecordingStateMachine, SegmentHandle, SegmentManager, SegmentSummary,
};
use crate::source::FrameSource;
use crate::types::{Frame, MotionRegion, VideoFormat};

/// What happened to one frame
#[derive(Debug, Clone, PartialEq)]
pub struct FrameOutcome {
    pub sequence: u64,
    pub timestamp: Duration,
    pub motion_detected: bool,
    pub regions: Vec<MotionRegion>,
    pub action: Action,
    /// Whether the frame landed in a segment
    pub written: bool,
}

/// Totals for a whole run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    pub frames_processed: u64,
    pub motion_frames: u64,
    pub segments: Vec<SegmentSummary>,
    pub dropped_frames: u64,
    pub open_failures: u64,
    pub write_failures: u64,
    pub finalize_failures: u64,
}

/// Called with every processed (and possibly annotated) frame
pub type FrameObserver = Box<dyn FnMut(&Frame, &FrameOutcome)>;

struct ActiveSegment {
    handle: SegmentHandle,
    last_sequence: Option<u64>,
}

pub struct MotionPipeline<S, D> {
    source: S,
    detector: D,
    machine: RecordingStateMachine,
    segments: SegmentManager,
    active: Option<ActiveSegment>,
    annotate: bool,
    epoch: DateTime<Local>,
    observer: Option<FrameObserver>,
    summary: RunSummary,
}

impl<S: FrameSource, D: MotionDetector> MotionPipeline<S, D> {
    pub fn new(
        source: S,
        detector: D,
        segments: SegmentManager,
        motion_timeout: Duration,
    ) -> Result<Self, WatchError> {
        Ok(Self {
            source,
            detector,
            machine: RecordingStateMachine::new(motion_timeout)?,
            segments,
            active: None,
            annotate: false,
            epoch: Local::now(),
            observer: None,
            summary: RunSummary::default(),
        })
    }

    /// Build from validated configuration; the source and detector are supplied
    pub fn from_config(config: &WatchConfig, source: S, detector: D) -> Result<Self, WatchError> {
        config.validate().map_err(WatchError::ConfigError)?;
        let segments = SegmentManager::new(
            config.output_directory(),
            config.recording.container.sink()?,
        );
        Ok(Self::new(source, detector, segments, config.motion_timeout()?)?
            .with_annotation(config.detection.annotate))
    }

    /// Draw region boxes onto frames before they are written and observed
    pub fn with_annotation(mut self, annotate: bool) -> Self {
        self.annotate = annotate;
        self
    }

    /// Wall-clock time of stream offset zero; segment names derive from it
    pub fn with_epoch(mut self, epoch: DateTime<Local>) -> Self {
        self.epoch = epoch;
        self
    }

    pub fn with_observer(mut self, observer: impl FnMut(&Frame, &FrameOutcome) + 'static) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    pub fn state(&self) -> RecorderState {
        self.machine.state()
    }

    pub fn is_segment_open(&self) -> bool {
        self.segments.is_open()
    }

    pub fn summary(&self) -> RunSummary {
        let mut summary = self.summary.clone();
        summary.dropped_frames = self.source.dropped_frames();
        summary
    }

    fn wall_time(&self, offset: Duration) -> DateTime<Local> {
        self.epoch + chrono::Duration::from_std(offset).unwrap_or_else(|_| chrono::Duration::zero())
    }

    /// Run one frame through detection, the state machine, and the writer
    ///
    /// Errors are detector errors only; segment failures are absorbed.
    pub fn process_frame(&mut self, mut frame: Frame) -> Result<FrameOutcome, WatchError> {
        let detection = self.detector.detect(&frame)?;
        self.summary.frames_processed += 1;
        if detection.motion_detected {
            self.summary.motion_frames += 1;
        }

        let action = self.machine.step(detection.motion_detected, frame.timestamp);
        if self.annotate && !detection.regions.is_empty() {
            draw_regions(&mut frame, &detection.regions);
        }

        let written = match action {
            Action::None => false,
            Action::Start => self.start_segment(&frame) && self.write(&frame),
            Action::Continue => self.write(&frame),
            Action::Stop => {
                self.close_segment();
                false
            }
        };

        let outcome = FrameOutcome {
            sequence: frame.sequence,
            timestamp: frame.timestamp,
            motion_detected: detection.motion_detected,
            regions: detection.regions,
            action,
            written,
        };

        if let Some(observer) = self.observer.as_mut() {
            observer(&frame, &outcome);
        }
        Ok(outcome)
    }

    fn start_segment(&mut self, frame: &Frame) -> bool {
        assert_invariant!(
            self.active.is_none() && !self.segments.is_open(),
            "Segments are only opened while idle",
            "pipeline"
        );

        let started = self.wall_time(frame.timestamp);
        let format = VideoFormat::new(frame.width, frame.height, self.source.format().fps);
        match self.segments.open(started, format) {
            Ok(handle) => {
                self.active = Some(ActiveSegment {
                    handle,
                    last_sequence: None,
                });
                true
            }
            Err(e) => {
                log::warn!("Could not start recording: {}", e);
                self.summary.open_failures += 1;
                self.machine.abort();
                false
            }
        }
    }

    fn write(&mut self, frame: &Frame) -> bool {
        let Some(active) = self.active.as_mut() else {
            // Recording without a segment means the open already failed
            self.machine.abort();
            return false;
        };

        if let Some(last) = active.last_sequence {
            assert_invariant!(
                frame.sequence > last,
                "Frames are appended in capture order",
                "pipeline"
            );
        }

        match self.segments.append(&active.handle, frame) {
            Ok(()) => {
                active.last_sequence = Some(frame.sequence);
                true
            }
            Err(e) => {
                log::warn!("Aborting recording after write failure: {}", e);
                self.summary.write_failures += 1;
                self.machine.abort();
                self.close_segment();
                false
            }
        }
    }

    fn close_segment(&mut self) {
        let Some(active) = self.active.take() else {
            return;
        };
        match self.segments.close(active.handle) {
            Ok(summary) => {
                log::debug!(
                    "Segment {} finalized with {} of {} frames",
                    summary.id,
                    summary.frames_written,
                    summary.frames_appended
                );
                self.summary.segments.push(summary);
            }
            Err(e) => {
                log::warn!("Failed to finalize segment: {}", e);
                self.summary.finalize_failures += 1;
            }
        }
    }

    /// Close any open session
    pub fn shutdown(&mut self) {
        if self.machine.finish() == Action::Stop {
            log::info!("Shutting down with an open recording");
        }
        self.close_segment();
    }

    /// Process frames until the source ends or `stop` is set
    ///
    /// The flag is checked once per frame. Any open segment is finalized
    /// before returning; a source or detector error is returned after that.
    pub fn run(&mut self, stop: &AtomicBool) -> Result<RunSummary, WatchError> {
        let result = loop {
            if stop.load(Ordering::Relaxed) {
                log::info!("Stop requested");
                break Ok(());
            }
            match self.source.read() {
                Ok(Some(frame)) => {
                    if let Err(e) = self.process_frame(frame) {
                        break Err(e);
                    }
                }
                Ok(None) => {
                    log::info!("Source exhausted");
                    break Ok(());
                }
                Err(e) => break Err(e),
            }
        };

        self.shutdown();
        let summary = self.summary();
        log::info!(
            "Processed {} frames ({} with motion), {} segments",
            summary.frames_processed,
            summary.motion_frames,
            summary.segments.len()
        );
        result.map(|()| summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::Y4mSink;
    use crate::testing::{ScriptedDetector, SyntheticSource};
    use chrono::TimeZone;

    fn epoch() -> DateTime<Local> {
        Local
            .with_ymd_and_hms(2024, 6, 1, 8, 0, 0)
            .single()
            .unwrap()
    }

    fn pipeline(
        dir: &std::path::Path,
        source: SyntheticSource,
        detector: ScriptedDetector,
    ) -> MotionPipeline<SyntheticSource, ScriptedDetector> {
        MotionPipeline::new(
            source,
            detector,
            SegmentManager::new(dir, Box::new(Y4mSink)),
            Duration::from_secs(3),
        )
        .unwrap()
        .with_epoch(epoch())
    }

    #[test]
    fn test_stop_frame_is_not_written() {
        let dir = tempfile::tempdir().unwrap();
        let mut p = pipeline(
            dir.path(),
            SyntheticSource::still(8, 8, 10.0, 40),
            ScriptedDetector::sequence(vec![true]),
        );

        let summary = p.run(&AtomicBool::new(false)).unwrap();
        // t = 0.0 ..= 3.0 written, 3.1 stops
        assert_eq!(summary.segments.len(), 1);
        assert_eq!(summary.segments[0].frames_written, 31);
        assert_eq!(summary.segments[0].id, "2024-06-01_08-00-00");
    }

    #[test]
    fn test_annotation_reaches_observer() {
        use std::cell::RefCell;
        use std::rc::Rc;

        let dir = tempfile::tempdir().unwrap();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();

        let mut p = pipeline(
            dir.path(),
            SyntheticSource::still(16, 16, 10.0, 1),
            ScriptedDetector::sequence(vec![true]),
        )
        .with_annotation(true)
        .with_observer(move |frame, outcome| {
            sink.borrow_mut().push((frame.data[0..3].to_vec(), outcome.action));
        });

        p.run(&AtomicBool::new(false)).unwrap();
        let seen = seen.borrow();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0], (vec![0, 255, 0], Action::Start));
    }

    #[test]
    fn test_stop_flag_is_checked_before_reading() {
        let dir = tempfile::tempdir().unwrap();
        let mut p = pipeline(
            dir.path(),
            SyntheticSource::still(8, 8, 10.0, 5),
            ScriptedDetector::sequence(vec![true; 5]),
        );
        let summary = p.run(&AtomicBool::new(true)).unwrap();
        assert_eq!(summary.frames_processed, 0);
        assert!(summary.segments.is_empty());
    }
}
