//! Segment lifecycle: one open output file at a time
//!
//! The manager owns the only writer. Callers get a [`SegmentHandle`] from
//! [`SegmentManager::open`] and must hand it back to
//! [`SegmentManager::close`]; a handle from an earlier segment is rejected,
//! so frames can never land in the wrong file.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::Serialize;

use super::sink::{SegmentSink, SegmentWriter};
use crate::assert_invariant;
use crate::errors::WatchError;
use crate::types::{Frame, VideoFormat};

/// `strftime` pattern for segment identifiers
pub const IDENTIFIER_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

pub fn segment_identifier(started: &DateTime<Local>) -> String {
    started.format(IDENTIFIER_FORMAT).to_string()
}

/// Proof of an open segment; consumed by `close`
#[derive(Debug, PartialEq, Eq)]
pub struct SegmentHandle {
    generation: u64,
    id: String,
}

impl SegmentHandle {
    pub fn id(&self) -> &str {
        &self.id
    }
}

/// Totals for one finalized segment
///
/// `frames_appended` counts frames handed to the writer; `frames_written`
/// is what the container holds. They differ when the encoder skips frames.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentSummary {
    pub id: String,
    pub path: PathBuf,
    pub frames_appended: u64,
    pub frames_written: u64,
    pub bytes_written: u64,
    pub duration_secs: f64,
}

struct OpenSegment {
    generation: u64,
    id: String,
    path: PathBuf,
    writer: Box<dyn SegmentWriter>,
    frames_appended: u64,
}

/// Identifiers are unique within one manager. A second segment started in
/// the same second as the previous one gets a `-01`, `-02`, ... suffix,
/// which keeps names sorted by start time. A file this manager did not
/// create is never reused or overwritten: opening over it fails.
pub struct SegmentManager {
    root: PathBuf,
    sink: Box<dyn SegmentSink>,
    root_ready: bool,
    current: Option<OpenSegment>,
    generation: u64,
    /// Base identifier of the last opened segment and its repeat count
    last_base: Option<(String, u32)>,
}

impl SegmentManager {
    pub fn new(root: impl Into<PathBuf>, sink: Box<dyn SegmentSink>) -> Self {
        Self {
            root: root.into(),
            sink,
            root_ready: false,
            current: None,
            generation: 0,
            last_base: None,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_open(&self) -> bool {
        self.current.is_some()
    }

    /// Path the next segment started at `started` would be written to
    pub fn segment_path(&self, started: &DateTime<Local>) -> PathBuf {
        let (id, _) = self.next_identifier(started);
        self.path_for(&id)
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.root.join(format!("{}.{}", id, self.sink.extension()))
    }

    /// Identifier for a segment started at `started`, with its repeat count
    fn next_identifier(&self, started: &DateTime<Local>) -> (String, u32) {
        let base = segment_identifier(started);
        match &self.last_base {
            Some((last, repeats)) if *last == base => {
                let repeats = repeats + 1;
                (format!("{}-{:02}", base, repeats), repeats)
            }
            _ => (base, 0),
        }
    }

    /// Create the capture root on first use
    fn ensure_root(&mut self) -> Result<(), WatchError> {
        if self.root_ready {
            return Ok(());
        }
        fs::create_dir_all(&self.root).map_err(|e| {
            WatchError::SegmentOpenFailed(format!(
                "Cannot create capture root {:?}: {}",
                self.root, e
            ))
        })?;
        self.root_ready = true;
        Ok(())
    }

    /// Open a new segment named after its start time
    pub fn open(
        &mut self,
        started: DateTime<Local>,
        format: VideoFormat,
    ) -> Result<SegmentHandle, WatchError> {
        if let Some(open) = &self.current {
            return Err(WatchError::SegmentAlreadyOpen(format!(
                "{} is still open",
                open.id
            )));
        }

        self.ensure_root()?;

        let (id, repeats) = self.next_identifier(&started);
        let path = self.path_for(&id);
        if path.exists() {
            return Err(WatchError::SegmentOpenFailed(format!(
                "{:?} already exists",
                path
            )));
        }

        let writer = self.sink.create(&path, &format).map_err(|e| match e {
            WatchError::SegmentOpenFailed(_) => e,
            other => WatchError::SegmentOpenFailed(format!("{:?}: {}", path, other)),
        })?;

        assert_invariant!(
            self.current.is_none(),
            "At most one segment is open",
            "recording::segment"
        );
        self.generation += 1;
        self.last_base = Some((segment_identifier(&started), repeats));
        self.current = Some(OpenSegment {
            generation: self.generation,
            id: id.clone(),
            path: path.clone(),
            writer,
            frames_appended: 0,
        });

        log::info!("recording started: {}", id);
        log::debug!("Writing segment to {:?}", path);
        Ok(SegmentHandle {
            generation: self.generation,
            id,
        })
    }

    fn checked_current(&mut self, handle: &SegmentHandle) -> Result<&mut OpenSegment, WatchError> {
        match self.current.as_mut() {
            Some(open) if open.generation == handle.generation => Ok(open),
            _ => Err(WatchError::SegmentClosed(format!(
                "handle for {} is no longer valid",
                handle.id
            ))),
        }
    }

    /// Append one frame; frames are written in call order
    pub fn append(&mut self, handle: &SegmentHandle, frame: &Frame) -> Result<(), WatchError> {
        let open = self.checked_current(handle)?;
        open.writer.write_frame(frame).map_err(|e| {
            WatchError::SegmentWriteFailed(format!(
                "{} frame {}: {}",
                open.id, frame.sequence, e
            ))
        })?;
        open.frames_appended += 1;
        Ok(())
    }

    /// Finalize the segment; the handle is spent either way
    pub fn close(&mut self, handle: SegmentHandle) -> Result<SegmentSummary, WatchError> {
        self.checked_current(&handle)?;
        let open = match self.current.take() {
            Some(open) => open,
            None => {
                return Err(WatchError::SegmentClosed(format!(
                    "{} was already closed",
                    handle.id
                )))
            }
        };

        let frames_appended = open.frames_appended;
        let stats = open.writer.finish().map_err(|e| match e {
            WatchError::SegmentFinalizeFailed(_) => e,
            other => WatchError::SegmentFinalizeFailed(format!("{}: {}", open.id, other)),
        })?;

        log::info!("recording stopped");
        log::debug!(
            "Segment {} closed: {} frames appended, {} bytes",
            open.id,
            frames_appended,
            stats.bytes_written
        );

        Ok(SegmentSummary {
            id: open.id,
            path: open.path,
            frames_appended,
            frames_written: stats.frames_written,
            bytes_written: stats.bytes_written,
            duration_secs: stats.duration_secs,
        })
    }
}
