//! Everything that happens before the capture loop runs.

use log::{error, info};

use crate::camera::CommandCamera;
use crate::config::CaptureConfig;
use crate::serial::TtyDevice;
use crate::storage::{SessionDirectory, SessionDirectoryAllocator};
use crate::{CaptureError, Cli};

pub struct Startup {
    pub config: CaptureConfig,
    pub device: TtyDevice,
    pub camera: CommandCamera,
    pub session: SessionDirectory,
}

impl Startup {
    /// Check every setting, then claim the next session directory.
    ///
    /// Nothing is created on disk unless all settings are valid. Each failure
    /// is logged before it is returned.
    pub fn prepare(args: &Cli) -> Result<Startup, CaptureError> {
        let config = logged(CaptureConfig::from_cli(args), "Invalid configuration")?;
        let device = logged(
            TtyDevice::new(&config.device, config.baud),
            "Invalid serial settings",
        )?;
        let camera = logged(
            CommandCamera::from_template(&args.camera_command),
            "Invalid camera command",
        )?;

        info!("Seeking session directory in {}", config.data_dir.display());
        let session = logged(
            SessionDirectoryAllocator::new(&config.data_dir).allocate(),
            "Unable to determine session directory",
        )?;

        Ok(Startup {
            config,
            device,
            camera,
            session,
        })
    }
}

fn logged<T, E: Into<CaptureError>>(result: Result<T, E>, context: &str) -> Result<T, CaptureError> {
    result.map_err(|e| {
        let e = e.into();
        error!("{}: {}", context, e);
        e
    })
}
