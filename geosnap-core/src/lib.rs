//! # geosnap core
//!
//! Platform-independent capture synchronization logic for a GPS-tagged
//! still camera: a receiver streams NMEA text over a serial line, and every
//! picture is paired with the telemetry sentences that arrived with it.
//!
//! This crate contains the state machines and naming rules with **zero I/O
//! dependencies**. Devices, the camera and the filesystem are reached
//! through the traits in [`io`], implemented by the `geosnap` crate.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  geosnap-core (no tokio, no filesystem)                     │
//! │  ├── connection/  (serial link failure state machine)       │
//! │  ├── sentence/    (line extraction, snapshot aggregation)   │
//! │  ├── scheduler/   (when to take a picture)                  │
//! │  ├── layout/      (session / sub-directory / file names)    │
//! │  ├── button/      (shutdown button hold detection)          │
//! │  └── io           (SerialDevice, Camera, Indicator)         │
//! └─────────────────────────────────────────────────────────────┘
//!                              ▲
//!                 ┌────────────┴────────────┐
//!                 │  geosnap                │
//!                 │  (tty, storage, loop)   │
//!                 └─────────────────────────┘
//! ```
//!
//! ## Example: Scheduling
//!
//! ```rust
//! use geosnap_core::{CaptureScheduler, SchedulerConfig, SentenceKind};
//!
//! let mut scheduler = CaptureScheduler::new(SchedulerConfig::default());
//! scheduler.arm(0);
//!
//! let first = scheduler.on_sentence(SentenceKind::Primary, 0).unwrap();
//! assert_eq!(first.index, 1);
//! assert!(scheduler.on_sentence(SentenceKind::Primary, 1000).is_none());
//! assert!(scheduler.on_sentence(SentenceKind::Primary, 2000).is_some());
//! ```

pub mod button;
pub mod connection;
pub mod error;
pub mod io;
pub mod layout;
pub mod scheduler;
pub mod sentence;

// Re-export commonly used types
pub use connection::{LinkState, SerialLink};
pub use error::{CameraError, ConfigError, SourceError};
pub use io::{Camera, Indicator, IoError, NoIndicator, SerialDevice};
pub use scheduler::{CaptureRequest, CaptureScheduler, SchedulerConfig, Trigger};
pub use sentence::{
    CloseReason, Sentence, SentenceAggregator, SentenceKind, SentenceTags, TelemetrySnapshot,
};
