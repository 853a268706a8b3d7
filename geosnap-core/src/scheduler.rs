//! Capture scheduler, the decision core.
//!
//! Decides, sentence by sentence and tick by tick, when a picture is taken.
//! All times are milliseconds on a monotonic clock supplied by the caller.
//!
//! Fire rule:
//! - a primary sentence fires when nothing was captured yet, or when
//!   `elapsed >= interval - guard`
//! - anything (sentence or tick) fires once `elapsed >= interval + guard`,
//!   so pictures keep coming when the fix sentences stall
//!
//! `elapsed` is measured from the last capture, or from arming before the
//! first one. The guard band absorbs loop and receiver jitter: a 1 Hz
//! receiver with a 2 s interval lands on every second fix instead of
//! alternating between 2 s and 3 s gaps.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::sentence::SentenceKind;

pub const DEFAULT_INTERVAL_MS: u64 = 2000;
pub const DEFAULT_GUARD_MS: u64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Nominal time between pictures
    pub interval_ms: u64,
    /// Jitter tolerance around the interval
    pub guard_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        SchedulerConfig {
            interval_ms: DEFAULT_INTERVAL_MS,
            guard_ms: DEFAULT_GUARD_MS,
        }
    }
}

impl SchedulerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.guard_ms >= self.interval_ms {
            return Err(ConfigError::GuardTooLarge {
                guard_ms: self.guard_ms,
                interval_ms: self.interval_ms,
            });
        }
        Ok(())
    }
}

/// What caused a capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trigger {
    /// A primary sentence arrived close enough to the interval
    Primary,
    /// No usable primary sentence in time
    Fallback,
}

impl std::fmt::Display for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Trigger::Primary => write!(f, "fix"),
            Trigger::Fallback => write!(f, "fallback"),
        }
    }
}

/// A decision to take picture `index` now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureRequest {
    /// 1-based, never reused within a session
    pub index: u32,
    pub trigger: Trigger,
    pub at_ms: u64,
}

#[derive(Debug, Clone)]
pub struct CaptureScheduler {
    config: SchedulerConfig,
    /// `None` until the discard window is over
    armed_at_ms: Option<u64>,
    last_capture_ms: Option<u64>,
    /// Number of captures fired so far
    picture_index: u32,
}

impl CaptureScheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        CaptureScheduler {
            config,
            armed_at_ms: None,
            last_capture_ms: None,
            picture_index: 0,
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Start scheduling. Nothing fires before this.
    pub fn arm(&mut self, current_time_ms: u64) {
        self.armed_at_ms = Some(current_time_ms);
    }

    pub fn is_armed(&self) -> bool {
        self.armed_at_ms.is_some()
    }

    /// Index of the most recent capture, 0 before the first.
    pub fn picture_index(&self) -> u32 {
        self.picture_index
    }

    /// Index the next capture will get.
    pub fn next_index(&self) -> u32 {
        self.picture_index.saturating_add(1)
    }

    pub fn last_capture_ms(&self) -> Option<u64> {
        self.last_capture_ms
    }

    /// Evaluate one classified sentence.
    pub fn on_sentence(&mut self, kind: SentenceKind, current_time_ms: u64) -> Option<CaptureRequest> {
        let elapsed = self.elapsed(current_time_ms)?;

        if kind.is_primary() {
            let near_interval = elapsed >= self.config.interval_ms.saturating_sub(self.config.guard_ms);
            if self.last_capture_ms.is_none() || near_interval {
                return Some(self.fire(Trigger::Primary, current_time_ms));
            }
        }
        self.fallback(elapsed, current_time_ms)
    }

    /// Evaluate the passage of time with no sentence.
    pub fn on_tick(&mut self, current_time_ms: u64) -> Option<CaptureRequest> {
        let elapsed = self.elapsed(current_time_ms)?;
        self.fallback(elapsed, current_time_ms)
    }

    fn fallback(&mut self, elapsed: u64, current_time_ms: u64) -> Option<CaptureRequest> {
        if elapsed >= self.config.interval_ms.saturating_add(self.config.guard_ms) {
            Some(self.fire(Trigger::Fallback, current_time_ms))
        } else {
            None
        }
    }

    /// Time since the last capture (or arming). `None` while unarmed.
    fn elapsed(&self, current_time_ms: u64) -> Option<u64> {
        let armed_at = self.armed_at_ms?;
        let reference = self.last_capture_ms.unwrap_or(armed_at);
        Some(current_time_ms.saturating_sub(reference))
    }

    fn fire(&mut self, trigger: Trigger, current_time_ms: u64) -> CaptureRequest {
        // Reset before the camera runs so its latency does not skew the next interval
        self.last_capture_ms = Some(current_time_ms);
        self.picture_index = self.picture_index.saturating_add(1);
        CaptureRequest {
            index: self.picture_index,
            trigger,
            at_ms: current_time_ms,
        }
    }
}
