use directories::ProjectDirs;
use std::path::PathBuf;

use geosnap_core::{ConfigError, SchedulerConfig, SentenceTags};

use crate::Cli;

pub const DEFAULT_DEVICE: &str = "/dev/ttyAMA0";
pub const DEFAULT_BAUD: u32 = 9600;
pub const DEFAULT_SUBDIR_CAPACITY: u32 = 900;
pub const DEFAULT_MAX_FAILURES: u32 = 10;
pub const DEFAULT_RECONNECT_BACKOFF_MS: u64 = 100;
pub const DEFAULT_DISCARD_WINDOW_MS: u64 = 2000;
pub const DEFAULT_SNAPSHOT_TIMEOUT_MS: u64 = 1500;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 10;
pub const DEFAULT_LED_PULSE_MS: u64 = 250;

pub const FALLBACK_DATA_DIR: &str = "/var/lib/geosnap";

pub fn get_project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("org", "geosnap", "geosnap")
}

/// Default root for session directories.
///
/// Without a home directory (started from an init script as a system user)
/// this falls back to [`FALLBACK_DATA_DIR`].
pub fn default_data_dir() -> PathBuf {
    get_project_dirs()
        .map(|dirs| dirs.data_dir().to_owned())
        .unwrap_or_else(|| PathBuf::from(FALLBACK_DATA_DIR))
}

/// Everything the acquisition loop needs, resolved from the command line.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureConfig {
    pub device: PathBuf,
    pub baud: u32,
    /// Root that receives one numbered directory per session
    pub data_dir: PathBuf,
    pub scheduler: SchedulerConfig,
    pub tags: SentenceTags,
    /// Pictures per rotating sub-directory
    pub subdir_capacity: u32,
    pub max_failures: u32,
    pub reconnect_backoff_ms: u64,
    /// Stale data is drained and dropped for this long after opening
    pub discard_window_ms: u64,
    pub snapshot_timeout_ms: u64,
    pub poll_interval_ms: u64,
    pub led_pulse_ms: u64,
    /// Stop cleanly after this many pictures
    pub max_pictures: Option<u32>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        CaptureConfig {
            device: PathBuf::from(DEFAULT_DEVICE),
            baud: DEFAULT_BAUD,
            data_dir: default_data_dir(),
            scheduler: SchedulerConfig::default(),
            tags: SentenceTags::default(),
            subdir_capacity: DEFAULT_SUBDIR_CAPACITY,
            max_failures: DEFAULT_MAX_FAILURES,
            reconnect_backoff_ms: DEFAULT_RECONNECT_BACKOFF_MS,
            discard_window_ms: DEFAULT_DISCARD_WINDOW_MS,
            snapshot_timeout_ms: DEFAULT_SNAPSHOT_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            led_pulse_ms: DEFAULT_LED_PULSE_MS,
            max_pictures: None,
        }
    }
}

impl CaptureConfig {
    pub fn from_cli(args: &Cli) -> Result<Self, ConfigError> {
        let config = CaptureConfig {
            device: args.device.clone(),
            baud: args.baud,
            data_dir: args.data_dir.clone().unwrap_or_else(default_data_dir),
            scheduler: SchedulerConfig {
                interval_ms: args.interval_ms,
                guard_ms: args.guard_ms,
            },
            tags: SentenceTags::new(&args.primary_tag, args.secondary_tags.iter().cloned())?,
            subdir_capacity: args.subdir_capacity,
            max_failures: args.max_failures,
            reconnect_backoff_ms: args.reconnect_backoff_ms,
            discard_window_ms: args.discard_window_ms,
            snapshot_timeout_ms: args.snapshot_timeout_ms,
            poll_interval_ms: args.poll_interval_ms,
            led_pulse_ms: args.led_pulse_ms,
            max_pictures: args.max_pictures,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.subdir_capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        if self.max_failures == 0 {
            return Err(ConfigError::ZeroFailureThreshold);
        }
        self.scheduler.validate()
    }
}
