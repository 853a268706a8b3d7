use clap::Parser;
use log::{info, warn};
use miette::{IntoDiagnostic, Result};
use std::time::Duration;
use tokio_graceful_shutdown::{SubsystemBuilder, Toplevel};

use geosnap::controller::CaptureSessionController;
use geosnap::gpio::SysfsGpio;
use geosnap::session_log::{init_logging, SessionLog};
use geosnap::startup::Startup;
use geosnap::{Cli, VERSION};
use geosnap_core::{Indicator, NoIndicator};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Cli::parse();

    let session_log = SessionLog::new(true);
    if let Some(path) = &args.log_file {
        session_log.redirect(path).into_diagnostic()?;
    }
    init_logging(args.verbose.log_level_filter(), session_log.clone());

    info!("geosnap {} starting", VERSION);
    let Startup {
        config,
        device,
        camera,
        session,
    } = Startup::prepare(&args).into_diagnostic()?;

    if let Err(e) = session_log.redirect(&session.log_path()) {
        warn!("Cannot write {}: {}", session.log_path().display(), e);
    }
    info!(
        "Session {} started at {}",
        session.number,
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );

    let indicator: Box<dyn Indicator + Send> = match args.led_gpio {
        Some(pin) => match SysfsGpio::output(pin) {
            Ok(led) => Box::new(led),
            Err(e) => {
                warn!("Capture LED on GPIO {} unavailable: {}", pin, e);
                Box::new(NoIndicator)
            }
        },
        None => Box::new(NoIndicator),
    };

    let controller = CaptureSessionController::new(&config, session, device, camera, indicator);

    Toplevel::new(move |s| async move {
        s.start(SubsystemBuilder::new("Capture", move |h| controller.run(h)));
    })
    .catch_signals()
    .handle_shutdown_requests(Duration::from_secs(5))
    .await
    .into_diagnostic()
}
