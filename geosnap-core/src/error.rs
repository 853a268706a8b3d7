//! Error types shared by the core state machines and the native crate

use thiserror::Error;

use crate::io::IoError;

/// Errors raised by the serial line source once it has given up
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SourceError {
    /// Too many consecutive I/O failures, the device is considered gone
    #[error("Serial source exhausted after {failures} consecutive failures (last: {last_error})")]
    Exhausted { failures: u32, last_error: IoError },

    /// A recorded log (plain file or closed pipe) has been read to the end
    #[error("No more data from {0}")]
    EndOfStream(String),
}

/// The external camera could not take a picture
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CameraError {
    /// The capture program could not be started
    #[error("Cannot start camera: {0}")]
    Spawn(String),

    /// The capture ran but reported failure
    #[error("Camera capture failed: {0}")]
    Failed(String),

    /// The capture reported success but produced no image
    #[error("Camera produced no image at {0}")]
    MissingImage(String),
}

/// Invalid capture configuration values
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Sub-directory capacity must be at least 1")]
    ZeroCapacity,

    #[error("Failure threshold must be at least 1")]
    ZeroFailureThreshold,

    #[error("Guard band ({guard_ms} ms) must be smaller than the picture interval ({interval_ms} ms)")]
    GuardTooLarge { guard_ms: u64, interval_ms: u64 },

    #[error("Sentence tag must not be empty")]
    EmptyTag,

    #[error("Sentence tag {0} is listed more than once")]
    DuplicateTag(String),

    #[error("Unsupported baud rate {0}")]
    UnsupportedBaud(u32),
}
