//! Monotonic stream clock for frame timestamps
//!
//! Motion timeouts are measured in wall-clock time, not frame counts, so
//! every live frame is stamped from a single monotonic origin.

use std::sync::Arc;
use std::time::{Duration, Instant};

/// Monotonic clock anchored at the start of a stream
#[derive(Debug, Clone)]
pub struct StreamClock {
    start: Arc<Instant>,
}

impl StreamClock {
    /// Create a new clock with the current instant as time zero
    pub fn new() -> Self {
        Self {
            start: Arc::new(Instant::now()),
        }
    }

    /// Create a clock from an existing start instant
    ///
    /// Use this to share the same timebase between a capture thread and
    /// the processing loop.
    pub fn from_instant(start: Instant) -> Self {
        Self {
            start: Arc::new(start),
        }
    }

    /// Elapsed time since the clock origin
    #[inline]
    pub fn now(&self) -> Duration {
        self.start.elapsed()
    }

    /// Offset of `instant` from the clock origin, zero if it precedes it
    #[inline]
    pub fn offset_of(&self, instant: Instant) -> Duration {
        instant.saturating_duration_since(*self.start)
    }

    pub fn start_instant(&self) -> Instant {
        *self.start
    }
}

impl Default for StreamClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_is_monotonic() {
        let clock = StreamClock::new();
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }

    #[test]
    fn test_offset_before_origin_saturates() {
        let earlier = Instant::now();
        let clock = StreamClock::from_instant(earlier + Duration::from_millis(50));
        assert_eq!(clock.offset_of(earlier), Duration::ZERO);
        assert_eq!(
            clock.offset_of(earlier + Duration::from_millis(80)),
            Duration::from_millis(30)
        );
    }
}
