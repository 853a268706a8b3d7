//! I/O abstraction for the capture engine.
//!
//! The engine never touches a device directly. Everything that talks to
//! hardware goes through the traits below, so the same scheduling and
//! aggregation code runs against a real tty and camera on the board and
//! against scripted fakes in tests.
//!
//! # Design
//!
//! The traits use a **poll-based** interface (not async):
//! - the acquisition loop is a single cooperative polling loop
//! - `read_available` must never wait for data, "nothing yet" is `Ok(0)`
//!
//! # Example
//!
//! ```rust,ignore
//! use geosnap_core::io::{SerialDevice, IoError};
//!
//! fn pump<D: SerialDevice>(dev: &mut D) -> Result<Vec<u8>, IoError> {
//!     if !dev.is_open() {
//!         dev.open()?;
//!     }
//!     let mut buf = Vec::new();
//!     dev.read_available(&mut buf)?;
//!     Ok(buf)
//! }
//! ```

use core::fmt;
use std::path::Path;

use crate::error::CameraError;

// =============================================================================
// Error Types
// =============================================================================

/// Transient I/O error reported by a serial device.
///
/// Kept minimal: the line source only needs to count and log these, it
/// never branches on the exact cause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IoError {
    /// OS error code where one exists, negative values are synthetic
    pub code: i32,
    /// Human-readable error message
    pub message: String,
}

impl IoError {
    /// Create a new I/O error with a code and message.
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// The device reported end of file, which for a tty means hang-up.
    pub fn hangup() -> Self {
        Self::new(-2, "Device hung up")
    }

    /// Read attempted on a device that is not open.
    pub fn not_open() -> Self {
        Self::new(-1, "Device not open")
    }

    /// A recorded log ran out. Unlike a hang-up, reopening will not help.
    pub fn end_of_stream() -> Self {
        Self::new(-3, "End of recorded data")
    }

    /// Check if this is a hang-up.
    pub fn is_hangup(&self) -> bool {
        self.code == -2
    }

    pub fn is_end_of_stream(&self) -> bool {
        self.code == -3
    }
}

impl fmt::Display for IoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code {})", self.message, self.code)
    }
}

impl std::error::Error for IoError {}

impl From<std::io::Error> for IoError {
    fn from(e: std::io::Error) -> Self {
        IoError::new(e.raw_os_error().unwrap_or(-1), e.to_string())
    }
}

// =============================================================================
// Collaborator Traits
// =============================================================================

/// A byte-oriented, read-only serial device.
pub trait SerialDevice {
    /// Open (or re-open) the underlying device.
    fn open(&mut self) -> Result<(), IoError>;

    /// Close the device. Closing a closed device does nothing.
    fn close(&mut self);

    /// Check if the device is currently open.
    fn is_open(&self) -> bool;

    /// Append every byte that is available right now to `buf`.
    ///
    /// Never blocks. Returns the number of bytes appended, `Ok(0)` when no
    /// data is waiting.
    fn read_available(&mut self, buf: &mut Vec<u8>) -> Result<usize, IoError>;

    /// Human readable device name for log lines.
    fn name(&self) -> &str;
}

/// The still camera.
pub trait Camera {
    /// Take one picture and store it at `path`.
    fn capture(&mut self, path: &Path) -> Result<(), CameraError>;
}

/// A boolean output such as a status LED.
///
/// Purely observational, errors are the implementation's problem.
pub trait Indicator {
    fn set(&mut self, on: bool);
}

impl<T: Indicator + ?Sized> Indicator for Box<T> {
    fn set(&mut self, on: bool) {
        (**self).set(on)
    }
}

/// Indicator that does nothing, used when no LED is wired up.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoIndicator;

impl Indicator for NoIndicator {
    fn set(&mut self, _on: bool) {}
}

// =============================================================================
// Tests
// =============================================================================
