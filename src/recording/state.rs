//! Motion-gated recording state machine
//!
//! Converts the per-frame motion flag into segment actions. A session
//! starts on the first motion frame and stays open until the time since the
//! last motion frame strictly exceeds the timeout. The frame that triggers
//! `Stop` is not part of the closed segment; the frame that triggers `Start`
//! is.

use std::time::Duration;

use crate::assert_invariant;
use crate::errors::WatchError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderState {
    Idle,
    Recording,
}

/// What the segment manager should do with the current frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Idle and no motion: nothing to write
    None,
    /// Open a new segment and write this frame to it
    Start,
    /// Write this frame to the open segment
    Continue,
    /// Close the open segment; this frame is not written
    Stop,
}

impl Action {
    /// Whether the frame that produced this action goes into the open segment
    pub fn writes_frame(self) -> bool {
        matches!(self, Action::Start | Action::Continue)
    }
}

/// Timing of the open session, in stream time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionWindow {
    pub started_at: Duration,
    pub last_motion: Duration,
}

#[derive(Debug, Clone)]
pub struct RecordingStateMachine {
    timeout: Duration,
    session: Option<SessionWindow>,
    sessions_started: u64,
}

impl RecordingStateMachine {
    /// Create an idle machine; the timeout must be non-zero
    pub fn new(timeout: Duration) -> Result<Self, WatchError> {
        if timeout.is_zero() {
            return Err(WatchError::ConfigError(
                "Motion timeout must be greater than zero".to_string(),
            ));
        }
        Ok(Self {
            timeout,
            session: None,
            sessions_started: 0,
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn state(&self) -> RecorderState {
        if self.session.is_some() {
            RecorderState::Recording
        } else {
            RecorderState::Idle
        }
    }

    pub fn session(&self) -> Option<&SessionWindow> {
        self.session.as_ref()
    }

    pub fn sessions_started(&self) -> u64 {
        self.sessions_started
    }

    /// Advance by one frame
    ///
    /// Timestamps that go backwards never move `last_motion` backwards and
    /// count as zero elapsed time.
    pub fn step(&mut self, motion_detected: bool, now: Duration) -> Action {
        let timeout = self.timeout;
        match self.session.as_mut() {
            None if motion_detected => {
                self.session = Some(SessionWindow {
                    started_at: now,
                    last_motion: now,
                });
                self.sessions_started += 1;
                Action::Start
            }
            None => Action::None,
            Some(window) if motion_detected => {
                let last_motion = window.last_motion.max(now);
                assert_invariant!(
                    last_motion >= window.last_motion,
                    "Last motion timestamp never decreases",
                    "recording::state"
                );
                window.last_motion = last_motion;
                Action::Continue
            }
            Some(window) => {
                if now.saturating_sub(window.last_motion) > timeout {
                    log::debug!(
                        "No motion for {:?} (timeout {:?}), stopping",
                        now.saturating_sub(window.last_motion),
                        timeout
                    );
                    self.session = None;
                    Action::Stop
                } else {
                    Action::Continue
                }
            }
        }
    }

    /// Force a stop for shutdown; `Action::None` when already idle
    pub fn finish(&mut self) -> Action {
        match self.session.take() {
            Some(_) => Action::Stop,
            None => Action::None,
        }
    }

    /// Drop back to idle without a stop action
    ///
    /// Used when the segment for a session could not be opened or written.
    /// Returns whether a session was active.
    pub fn abort(&mut self) -> bool {
        self.session.take().is_some()
    }
}
