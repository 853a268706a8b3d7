//! Serial link state machine.
//!
//! Pure state transitions with no I/O, driven by the line source in the
//! native crate. It decides when a failed device may be reopened and when
//! the link has failed often enough in a row to be declared dead.
//!
//! ```text
//!            opened()                 failed()
//!  Closed ─────────────▶ Open ─────────────────▶ Degraded ──┐
//!    ▲                    ▲                         │        │ failed()
//!    │                    └──── opened() ───────────┘        │ (count >= threshold)
//!    └── reset()                                             ▼
//!                                                          Dead
//! ```
//!
//! # Usage
//!
//! ```rust
//! use geosnap_core::connection::{LinkState, SerialLink};
//!
//! let mut link = SerialLink::new(10, 100);
//! link.opened();
//! link.failed(50);
//! assert_eq!(link.state(), LinkState::Degraded);
//! assert!(!link.should_reopen(100));
//! assert!(link.should_reopen(150));
//! ```

use serde::{Deserialize, Serialize};

// =============================================================================
// Link State
// =============================================================================

/// Lifecycle of the serial connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkState {
    /// Never opened, or deliberately closed
    Closed,
    /// Open and reading without errors
    Open,
    /// Closed after one or more consecutive failures, waiting to reopen
    Degraded,
    /// Failure threshold reached, no further reopen attempts
    Dead,
}

impl LinkState {
    /// Check if reads may be attempted
    pub fn is_open(&self) -> bool {
        matches!(self, LinkState::Open)
    }

    /// Check if the link has given up
    pub fn is_dead(&self) -> bool {
        matches!(self, LinkState::Dead)
    }
}

impl std::fmt::Display for LinkState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LinkState::Closed => write!(f, "Closed"),
            LinkState::Open => write!(f, "Open"),
            LinkState::Degraded => write!(f, "Degraded"),
            LinkState::Dead => write!(f, "Dead"),
        }
    }
}

// =============================================================================
// Serial Link
// =============================================================================

/// Tracks consecutive failures and reopen timing for one serial device.
#[derive(Debug, Clone)]
pub struct SerialLink {
    state: LinkState,
    /// Number of consecutive failures, reset by any successful read
    failure_count: u32,
    /// Consecutive failures that kill the link
    max_failures: u32,
    /// Fixed delay between a failure and the next reopen attempt
    backoff_ms: u64,
    /// Timestamp of the most recent failure
    last_failure_ms: u64,
}

impl SerialLink {
    /// Create a closed link.
    ///
    /// A `max_failures` of zero is treated as one.
    pub fn new(max_failures: u32, backoff_ms: u64) -> Self {
        SerialLink {
            state: LinkState::Closed,
            failure_count: 0,
            max_failures: max_failures.max(1),
            backoff_ms,
            last_failure_ms: 0,
        }
    }

    /// Get current link state.
    pub fn state(&self) -> LinkState {
        self.state
    }

    /// Get number of consecutive failures.
    pub fn failure_count(&self) -> u32 {
        self.failure_count
    }

    pub fn max_failures(&self) -> u32 {
        self.max_failures
    }

    pub fn backoff_ms(&self) -> u64 {
        self.backoff_ms
    }

    /// Check if a reopen attempt is due.
    ///
    /// Only a degraded link reopens, and only once the backoff has elapsed.
    pub fn should_reopen(&self, current_time_ms: u64) -> bool {
        self.state == LinkState::Degraded
            && current_time_ms.saturating_sub(self.last_failure_ms) >= self.backoff_ms
    }

    // -------------------------------------------------------------------------
    // State Transitions
    // -------------------------------------------------------------------------

    /// The device was opened successfully.
    ///
    /// Does not clear the failure count: a device that opens and then fails
    /// to read is still failing.
    pub fn opened(&mut self) {
        if self.state != LinkState::Dead {
            self.state = LinkState::Open;
        }
    }

    /// A read succeeded, the consecutive failure run is over.
    pub fn succeeded(&mut self) {
        if self.state == LinkState::Open {
            self.failure_count = 0;
        }
    }

    /// A read or reopen failed. Returns the resulting state.
    pub fn failed(&mut self, current_time_ms: u64) -> LinkState {
        if self.state == LinkState::Dead {
            return self.state;
        }
        self.failure_count = self.failure_count.saturating_add(1);
        self.last_failure_ms = current_time_ms;
        if self.failure_count >= self.max_failures {
            self.state = LinkState::Dead;
        } else {
            self.state = LinkState::Degraded;
        }
        self.state
    }

    /// Back to closed with a clean slate.
    pub fn reset(&mut self) {
        self.state = LinkState::Closed;
        self.failure_count = 0;
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_state_transitions() {
        let mut link = SerialLink::new(10, 100);
        assert_eq!(link.state(), LinkState::Closed);
        assert!(!link.state().is_open());

        link.opened();
        assert_eq!(link.state(), LinkState::Open);

        assert_eq!(link.failed(10), LinkState::Degraded);
        assert_eq!(link.failure_count(), 1);

        link.opened();
        assert_eq!(link.state(), LinkState::Open);
        assert_eq!(link.failure_count(), 1);

        link.succeeded();
        assert_eq!(link.failure_count(), 0);
    }

    #[test]
    fn test_ten_failures_kill_the_link() {
        let mut link = SerialLink::new(10, 100);
        link.opened();
        for i in 1..10 {
            assert_eq!(link.failed(i * 100), LinkState::Degraded);
        }
        assert_eq!(link.failed(1000), LinkState::Dead);
        assert_eq!(link.failure_count(), 10);
        assert!(!link.should_reopen(10_000));

        // Dead is terminal
        link.opened();
        assert!(link.state().is_dead());
    }

    #[test]
    fn test_nine_failures_then_success_resets() {
        let mut link = SerialLink::new(10, 100);
        link.opened();
        for i in 1..=9 {
            link.failed(i * 100);
            link.opened();
        }
        assert_eq!(link.failure_count(), 9);
        link.succeeded();
        assert_eq!(link.failure_count(), 0);
        assert_eq!(link.state(), LinkState::Open);
    }

    #[test]
    fn test_backoff_gates_reopen() {
        let mut link = SerialLink::new(3, 100);
        link.opened();
        assert!(!link.should_reopen(0));

        link.failed(1000);
        assert!(!link.should_reopen(1050));
        assert!(link.should_reopen(1100));
    }

    #[test]
    fn test_zero_threshold_is_one() {
        let mut link = SerialLink::new(0, 0);
        link.opened();
        assert_eq!(link.failed(1), LinkState::Dead);
    }
}
