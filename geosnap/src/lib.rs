//! # geosnap
//!
//! GPS-synchronized still capture for single-board computers.
//!
//! A GPS receiver streams NMEA text over a serial line. Every time a new
//! fix arrives (roughly every picture interval) the camera takes a picture,
//! and the telemetry sentences belonging to that fix are stored next to it:
//!
//! ```text
//! <data-dir>/0007/               one directory per power-on session
//! ├── session.log
//! ├── 0001/                      rotating sub-directories
//! │   ├── 00000001.jpg
//! │   ├── 00000001.gps           raw NMEA lines for picture 1
//! │   └── ...
//! └── 0002/
//! ```
//!
//! ## Architecture
//!
//! The decisions (when to capture, which lines belong to which picture,
//! when the serial device is gone) live in [`geosnap_core`] and are free of
//! I/O. This crate supplies the devices and runs the loop:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                        geosnap                           │
//! │  ┌──────────────┐  ┌──────────────┐  ┌────────────────┐  │
//! │  │ TtyDevice    │  │ CommandCamera│  │ SysfsGpio LED  │  │
//! │  └──────┬───────┘  └──────┬───────┘  └───────┬────────┘  │
//! │         ▼                 ▼                  ▼           │
//! │  ┌────────────────────────────────────────────────────┐  │
//! │  │         CaptureSessionController (poll loop)       │  │
//! │  │  ResilientLineSource → SentenceAggregator          │  │
//! │  │  CaptureScheduler    → storage (.jpg / .gps)       │  │
//! │  └────────────────────────────────────────────────────┘  │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Command-Line Interface
//!
//! See [`Cli`] for all available options. Key options:
//!
//! - `-d, --device` - serial device of the GPS receiver
//! - `--data-dir` - where session directories are created
//! - `-i, --interval-ms` - picture interval
//! - `-n, --max-pictures` - test run, stop after this many pictures
//! - `-v` - Increase verbosity (use multiple times)

use clap::Parser;
use clap_verbosity_flag::{InfoLevel, Verbosity};
use std::path::PathBuf;
use thiserror::Error;

use geosnap_core::scheduler::{DEFAULT_GUARD_MS, DEFAULT_INTERVAL_MS};
use geosnap_core::{CameraError, ConfigError, SourceError};

pub mod camera;
pub mod config;
pub mod controller;
pub mod gpio;
pub mod serial;
pub mod session_log;
pub mod source;
pub mod startup;
pub mod storage;

#[cfg(test)]
pub(crate) mod testing;

use camera::DEFAULT_CAMERA_COMMAND;
use config::*;
use storage::StorageError;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser, Clone, Debug)]
#[command(version, about)]
pub struct Cli {
    #[clap(flatten)]
    pub verbose: Verbosity<InfoLevel>,

    /// Serial device the GPS receiver is attached to
    #[arg(short, long, default_value = DEFAULT_DEVICE)]
    pub device: PathBuf,

    /// Serial line speed
    #[arg(short, long, default_value_t = DEFAULT_BAUD)]
    pub baud: u32,

    /// Root directory for session directories
    /// (default: the user data directory, or /var/lib/geosnap)
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Time between pictures
    #[arg(short, long, default_value_t = DEFAULT_INTERVAL_MS)]
    pub interval_ms: u64,

    /// Tolerance around the interval: a fix is accepted this much early,
    /// the timer fallback fires this much late
    #[arg(long, default_value_t = DEFAULT_GUARD_MS)]
    pub guard_ms: u64,

    /// Pictures per sub-directory
    #[arg(long, default_value_t = DEFAULT_SUBDIR_CAPACITY)]
    pub subdir_capacity: u32,

    /// Consecutive read failures before giving up on the serial device
    #[arg(long, default_value_t = DEFAULT_MAX_FAILURES)]
    pub max_failures: u32,

    /// Wait before re-opening the serial device after a failure
    #[arg(long, default_value_t = DEFAULT_RECONNECT_BACKOFF_MS)]
    pub reconnect_backoff_ms: u64,

    /// Drop everything received for this long after opening the device
    #[arg(long, default_value_t = DEFAULT_DISCARD_WINDOW_MS)]
    pub discard_window_ms: u64,

    /// Close an incomplete telemetry snapshot after this long
    #[arg(long, default_value_t = DEFAULT_SNAPSHOT_TIMEOUT_MS)]
    pub snapshot_timeout_ms: u64,

    /// Acquisition loop period
    #[arg(long, default_value_t = DEFAULT_POLL_INTERVAL_MS)]
    pub poll_interval_ms: u64,

    /// Sentence type that marks a new fix
    #[arg(long, default_value = "GGA")]
    pub primary_tag: String,

    /// Sentence types that complete a snapshot (repeatable)
    #[arg(long = "secondary-tag", default_values = ["GSA", "RMC"])]
    pub secondary_tags: Vec<String>,

    /// Camera command, `{path}` is replaced by the image path
    #[arg(long, default_value = DEFAULT_CAMERA_COMMAND)]
    pub camera_command: String,

    /// GPIO (BCM numbering) of the capture LED
    #[arg(long)]
    pub led_gpio: Option<u32>,

    /// How long the LED stays on after a picture
    #[arg(long, default_value_t = DEFAULT_LED_PULSE_MS)]
    pub led_pulse_ms: u64,

    /// Test run: stop after this many pictures
    #[arg(short = 'n', long)]
    pub max_pictures: Option<u32>,

    /// Log file used until the session directory is known
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

/// Conditions that end a capture session, or keep it from starting.
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Camera(#[from] CameraError),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_repeated_secondary_tags() {
        let args = Cli::parse_from([
            "geosnap",
            "--secondary-tag",
            "GSA",
            "--secondary-tag",
            "VTG",
        ]);
        assert_eq!(args.secondary_tags, ["GSA", "VTG"]);

        let args = Cli::parse_from(["geosnap"]);
        assert_eq!(args.secondary_tags, ["GSA", "RMC"]);
        assert_eq!(args.device, PathBuf::from("/dev/ttyAMA0"));
        assert_eq!(args.max_pictures, None);
    }
}
