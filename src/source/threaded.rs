//! Capture thread feeding a bounded frame queue
//!
//! The wrapped source is opened and read on a dedicated thread. Frames keep
//! their capture order through the queue; under `drop_oldest` the queue may
//! discard frames the pipeline never sees, which [`ThreadedSource::dropped`]
//! reports.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::JoinHandle;

use super::{CapturePolicy, FrameSource};
use crate::errors::WatchError;
use crate::types::{Frame, VideoFormat};

struct FrameQueue {
    inner: Mutex<QueueInner>,
    cv: Condvar,
}

struct QueueInner {
    items: VecDeque<Frame>,
    capacity: usize,
    dropped: u64,
    closed: bool,
    error: Option<WatchError>,
}

impl FrameQueue {
    fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(QueueInner {
                items: VecDeque::with_capacity(capacity.min(1024)),
                capacity: capacity.max(1),
                dropped: 0,
                closed: false,
                error: None,
            }),
            cv: Condvar::new(),
        }
    }

    // A panic while holding the lock cannot leave the queue half-updated
    fn lock(&self) -> MutexGuard<'_, QueueInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn push_drop_oldest(&self, frame: Frame) {
        let mut g = self.lock();
        if g.closed {
            return;
        }

        if g.items.len() >= g.capacity {
            g.items.pop_front();
            g.dropped = g.dropped.saturating_add(1);
        }
        g.items.push_back(frame);
        self.cv.notify_all();
    }

    /// Wait for room; returns false if the queue was closed meanwhile
    fn push_blocking(&self, frame: Frame) -> bool {
        let mut g = self.lock();
        while !g.closed && g.items.len() >= g.capacity {
            g = self.cv.wait(g).unwrap_or_else(|e| e.into_inner());
        }
        if g.closed {
            return false;
        }
        g.items.push_back(frame);
        self.cv.notify_all();
        true
    }

    /// Next frame, or `None` once the queue is closed and drained
    fn pop(&self) -> Result<Option<Frame>, WatchError> {
        let mut g = self.lock();
        loop {
            if let Some(frame) = g.items.pop_front() {
                self.cv.notify_all();
                return Ok(Some(frame));
            }
            if g.closed {
                return match g.error.take() {
                    Some(e) => Err(e),
                    None => Ok(None),
                };
            }
            g = self.cv.wait(g).unwrap_or_else(|e| e.into_inner());
        }
    }

    fn close(&self, error: Option<WatchError>) {
        let mut g = self.lock();
        g.closed = true;
        if g.error.is_none() {
            g.error = error;
        }
        self.cv.notify_all();
    }

    fn dropped(&self) -> u64 {
        self.lock().dropped
    }
}

pub struct ThreadedSource {
    queue: Arc<FrameQueue>,
    stop_flag: Arc<AtomicBool>,
    format: VideoFormat,
    capture_thread: Option<JoinHandle<()>>,
}

impl ThreadedSource {
    /// Open a source on a new capture thread
    ///
    /// `open` runs on the capture thread, so sources whose handles cannot
    /// cross threads (camera backends) work too. Returns once the source is
    /// open, or with its open error.
    pub fn spawn<F>(open: F, policy: CapturePolicy) -> Result<Self, WatchError>
    where
        F: FnOnce() -> Result<Box<dyn FrameSource>, WatchError> + Send + 'static,
    {
        let (capacity, drop_oldest) = match policy {
            CapturePolicy::DropOldest { capacity } => (capacity, true),
            CapturePolicy::Block { capacity } => (capacity, false),
            CapturePolicy::Inline => {
                return Err(WatchError::ConfigError(
                    "Inline capture does not use a capture thread".to_string(),
                ))
            }
        };

        let queue = Arc::new(FrameQueue::new(capacity));
        let stop_flag = Arc::new(AtomicBool::new(false));
        let (ready_tx, ready_rx) = mpsc::sync_channel::<Result<VideoFormat, WatchError>>(1);

        let thread_queue = queue.clone();
        let thread_stop = stop_flag.clone();
        let handle = std::thread::Builder::new()
            .name("crabwatch-capture".to_string())
            .spawn(move || {
                let source = match open() {
                    Ok(source) => {
                        let _ = ready_tx.send(Ok(source.format()));
                        source
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        thread_queue.close(None);
                        return;
                    }
                };
                capture_loop(source, &thread_queue, &thread_stop, drop_oldest);
            })
            .map_err(|e| WatchError::SourceError(format!("spawn failed: {e}")))?;

        let format = match ready_rx.recv() {
            Ok(Ok(format)) => format,
            Ok(Err(e)) => {
                let _ = handle.join();
                return Err(e);
            }
            Err(_) => {
                let _ = handle.join();
                return Err(WatchError::SourceError(
                    "Capture thread exited before opening the source".to_string(),
                ));
            }
        };

        log::info!(
            "Capture thread started ({} frames, {})",
            capacity.max(1),
            if drop_oldest { "drop oldest" } else { "block" }
        );

        Ok(Self {
            queue,
            stop_flag,
            format,
            capture_thread: Some(handle),
        })
    }

    /// Frames discarded by the `drop_oldest` policy so far
    pub fn dropped(&self) -> u64 {
        self.queue.dropped()
    }

    fn stop(&mut self) {
        self.stop_flag.store(true, Ordering::Relaxed);
        self.queue.close(None);
        if let Some(handle) = self.capture_thread.take() {
            if handle.join().is_err() {
                log::warn!("Capture thread panicked");
            }
        }
    }
}

fn capture_loop(
    mut source: Box<dyn FrameSource>,
    queue: &FrameQueue,
    stop_flag: &AtomicBool,
    drop_oldest: bool,
) {
    while !stop_flag.load(Ordering::Relaxed) {
        match source.read() {
            Ok(Some(frame)) => {
                if drop_oldest {
                    queue.push_drop_oldest(frame);
                } else if !queue.push_blocking(frame) {
                    break;
                }
            }
            Ok(None) => break,
            Err(e) => {
                // Reads drain what was captured, then see the error
                queue.close(Some(e));
                return;
            }
        }
    }
    queue.close(None);
}

impl FrameSource for ThreadedSource {
    fn format(&self) -> VideoFormat {
        self.format
    }

    fn read(&mut self) -> Result<Option<Frame>, WatchError> {
        self.queue.pop()
    }

    fn dropped_frames(&self) -> u64 {
        self.dropped()
    }
}

impl Drop for ThreadedSource {
    fn drop(&mut self) {
        self.stop();
    }
}
