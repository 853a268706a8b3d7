//! Press-and-hold detection for the shutdown button.
//!
//! The button pulls a GPIO input low. It is sampled at a fixed period and a
//! shutdown is only requested once it has read "pressed" on every sample
//! for the whole hold time, so a bump or a short press does nothing.

pub const DEFAULT_HOLD_MS: u64 = 2000;
pub const DEFAULT_SAMPLE_MS: u64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoldState {
    Released,
    /// Pressed, with the time held so far
    Holding(u64),
    /// Held long enough
    Triggered,
}

#[derive(Debug, Clone)]
pub struct HoldDetector {
    hold_ms: u64,
    sample_ms: u64,
    held_ms: u64,
    triggered: bool,
}

impl HoldDetector {
    pub fn new(hold_ms: u64, sample_ms: u64) -> Self {
        HoldDetector {
            hold_ms,
            sample_ms: sample_ms.max(1),
            held_ms: 0,
            triggered: false,
        }
    }

    /// Feed one sample taken `sample_ms` after the previous one.
    pub fn sample(&mut self, pressed: bool) -> HoldState {
        if self.triggered {
            return HoldState::Triggered;
        }
        if !pressed {
            self.held_ms = 0;
            return HoldState::Released;
        }
        self.held_ms = self.held_ms.saturating_add(self.sample_ms);
        if self.held_ms >= self.hold_ms {
            self.triggered = true;
            HoldState::Triggered
        } else {
            HoldState::Holding(self.held_ms)
        }
    }
}

impl Default for HoldDetector {
    fn default() -> Self {
        Self::new(DEFAULT_HOLD_MS, DEFAULT_SAMPLE_MS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_hold_triggers() {
        let mut d = HoldDetector::default();
        for i in 1..20 {
            assert_eq!(d.sample(true), HoldState::Holding(i * 100));
        }
        assert_eq!(d.sample(true), HoldState::Triggered);
        // Latched
        assert_eq!(d.sample(false), HoldState::Triggered);
    }

    #[test]
    fn test_release_resets() {
        let mut d = HoldDetector::new(300, 100);
        d.sample(true);
        d.sample(true);
        assert_eq!(d.sample(false), HoldState::Released);
        assert_eq!(d.sample(true), HoldState::Holding(100));
        d.sample(true);
        assert_eq!(d.sample(true), HoldState::Triggered);
    }
}
