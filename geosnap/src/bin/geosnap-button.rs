//! Power the board off when the shutdown button is held.
//!
//! The button connects the input pin to ground, so the pin needs a pull-up
//! (external, or `gpio=27=ip,pu` in the firmware config).

use clap::Parser;
use clap_verbosity_flag::{InfoLevel, Verbosity};
use log::{debug, info};
use miette::{IntoDiagnostic, Result};
use std::io;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tokio_graceful_shutdown::{SubsystemBuilder, SubsystemHandle, Toplevel};

use geosnap::gpio::SysfsGpio;
use geosnap::session_log::{init_logging, SessionLog};
use geosnap_core::button::{HoldDetector, HoldState, DEFAULT_HOLD_MS, DEFAULT_SAMPLE_MS};

#[derive(Parser, Clone, Debug)]
#[command(version, about = "Shut down when the button is held")]
struct Args {
    #[clap(flatten)]
    verbose: Verbosity<InfoLevel>,

    /// GPIO (BCM numbering) the button is wired to
    #[arg(short, long, default_value_t = 27)]
    pin: u32,

    /// How long the button must be held
    #[arg(long, default_value_t = DEFAULT_HOLD_MS)]
    hold_ms: u64,

    /// Sampling period
    #[arg(long, default_value_t = DEFAULT_SAMPLE_MS)]
    sample_ms: u64,

    /// Only log the shutdown
    #[arg(long)]
    dry_run: bool,

    #[arg(long, default_value = "shutdown -h now")]
    command: String,
}

async fn run_command(command: &str) -> io::Result<()> {
    let mut words = command.split_whitespace();
    let program = words
        .next()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "empty shutdown command"))?;
    let status = tokio::process::Command::new(program)
        .args(words)
        .status()
        .await?;
    if !status.success() {
        return Err(io::Error::other(format!("{} exited with {}", command, status)));
    }
    Ok(())
}

async fn watch(args: Args, button: SysfsGpio, subsys: SubsystemHandle) -> io::Result<()> {
    let mut detector = HoldDetector::new(args.hold_ms, args.sample_ms);
    let mut timer = interval(Duration::from_millis(args.sample_ms.max(1)));
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!("Watching GPIO {} for the shutdown button", button.pin());
    loop {
        tokio::select! {
            _ = subsys.on_shutdown_requested() => return Ok(()),
            _ = timer.tick() => {
                // Active low
                let pressed = !button.read()?;
                match detector.sample(pressed) {
                    HoldState::Released => {}
                    HoldState::Holding(held_ms) => debug!("Button held for {} ms", held_ms),
                    HoldState::Triggered => break,
                }
            }
        }
    }

    if args.dry_run {
        info!("Button held, dry run: not running '{}'", args.command);
    } else {
        info!("Button held, running '{}'", args.command);
        run_command(&args.command).await?;
    }
    subsys.request_shutdown();
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose.log_level_filter(), SessionLog::new(true));

    let button = SysfsGpio::input(args.pin).into_diagnostic()?;

    Toplevel::new(move |s| async move {
        s.start(SubsystemBuilder::new("Button", move |h| watch(args, button, h)));
    })
    .catch_signals()
    .handle_shutdown_requests(Duration::from_secs(5))
    .await
    .into_diagnostic()
}
