//! The acquisition loop.
//!
//! [`CaptureSessionController`] owns the serial source, the aggregator, the
//! scheduler and the output directories, and drives them one
//! [`poll_once`](CaptureSessionController::poll_once) at a time. Time is
//! passed in as milliseconds since start so the whole loop can be stepped
//! deterministically in tests; [`run`](CaptureSessionController::run) feeds
//! it the real clock inside a `tokio-graceful-shutdown` subsystem.

use log::{debug, error, info, warn};
use std::fs;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::time::{interval, MissedTickBehavior};
use tokio_graceful_shutdown::SubsystemHandle;

use geosnap_core::{
    Camera, CaptureRequest, CaptureScheduler, Indicator, SentenceAggregator, SerialDevice,
    SourceError, TelemetrySnapshot,
};

use crate::config::CaptureConfig;
use crate::source::ResilientLineSource;
use crate::storage::{self, RotatingSubdirAllocator, SessionDirectory};
use crate::CaptureError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Device not opened yet
    Starting,
    /// Dropping whatever the receiver buffered before we were listening
    Discarding { until_ms: u64 },
    Capturing,
    /// Picture limit reached
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopStatus {
    Running,
    Finished,
}

pub struct CaptureSessionController<D: SerialDevice, C: Camera, I: Indicator> {
    session: SessionDirectory,
    source: ResilientLineSource<D>,
    aggregator: SentenceAggregator,
    scheduler: CaptureScheduler,
    subdirs: RotatingSubdirAllocator,
    camera: C,
    indicator: I,
    phase: Phase,
    discard_window_ms: u64,
    poll_interval_ms: u64,
    led_pulse_ms: u64,
    led_off_at_ms: Option<u64>,
    max_pictures: Option<u32>,
}

impl<D: SerialDevice, C: Camera, I: Indicator> CaptureSessionController<D, C, I> {
    pub fn new(
        config: &CaptureConfig,
        session: SessionDirectory,
        device: D,
        camera: C,
        indicator: I,
    ) -> Self {
        CaptureSessionController {
            source: ResilientLineSource::new(
                device,
                config.max_failures,
                config.reconnect_backoff_ms,
            ),
            aggregator: SentenceAggregator::new(config.tags.clone(), config.snapshot_timeout_ms),
            scheduler: CaptureScheduler::new(config.scheduler),
            subdirs: RotatingSubdirAllocator::new(&session.path, config.subdir_capacity),
            session,
            camera,
            indicator,
            phase: Phase::Starting,
            discard_window_ms: config.discard_window_ms,
            poll_interval_ms: config.poll_interval_ms,
            led_pulse_ms: config.led_pulse_ms,
            led_off_at_ms: None,
            max_pictures: config.max_pictures,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn session(&self) -> &SessionDirectory {
        &self.session
    }

    /// Index of the most recent capture attempt.
    pub fn picture_index(&self) -> u32 {
        self.scheduler.picture_index()
    }

    /// One loop iteration.
    pub fn poll_once(&mut self, now: u64) -> Result<LoopStatus, CaptureError> {
        match self.step(now) {
            Ok(()) => {}
            Err(CaptureError::Source(SourceError::EndOfStream(device))) => {
                info!(
                    "No more data from {}, finished after {} pictures",
                    device,
                    self.picture_index()
                );
                if let Some(snapshot) = self.aggregator.flush() {
                    self.persist(&snapshot)?;
                }
                self.phase = Phase::Finished;
            }
            Err(e) => return Err(e),
        }

        Ok(match self.phase {
            Phase::Finished => LoopStatus::Finished,
            _ => LoopStatus::Running,
        })
    }

    fn step(&mut self, now: u64) -> Result<(), CaptureError> {
        match self.phase {
            Phase::Starting => {
                info!("Opening GPS data stream");
                self.source.open(now)?;
                self.phase = Phase::Discarding {
                    until_ms: now.saturating_add(self.discard_window_ms),
                };
            }
            Phase::Discarding { until_ms } => {
                if self.discard_window_ms > 0 {
                    let stale = self.source.drain(now)?;
                    if !stale.is_empty() {
                        debug!("Discarded {} stale bytes", stale.len());
                    }
                }
                if now >= until_ms {
                    self.aggregator.reset();
                    self.scheduler.arm(now);
                    self.phase = Phase::Capturing;
                    info!("Reading GPS data stream");
                }
            }
            Phase::Capturing => {
                self.capture_step(now)?;
                if self.limit_reached() && self.aggregator.current().is_none() {
                    info!("Test run finished after {} pictures", self.picture_index());
                    self.phase = Phase::Finished;
                }
            }
            Phase::Finished => {}
        }
        Ok(())
    }

    fn capture_step(&mut self, now: u64) -> Result<(), CaptureError> {
        if self.led_off_at_ms.is_some_and(|off_at| now >= off_at) {
            self.indicator.set(false);
            self.led_off_at_ms = None;
        }

        if !self.limit_reached() {
            self.subdirs.current_dir(self.scheduler.next_index())?;
        }

        let bytes = self.source.drain(now)?;
        for sentence in self.aggregator.feed(&bytes) {
            if !self.limit_reached() {
                if let Some(request) = self.scheduler.on_sentence(sentence.kind, now) {
                    self.fire(request)?;
                }
            }
            if let Some(snapshot) = self.aggregator.accept(sentence, now) {
                self.persist(&snapshot)?;
            }
        }

        if !self.limit_reached() {
            if let Some(request) = self.scheduler.on_tick(now) {
                self.fire(request)?;
            }
        }

        if let Some(snapshot) = self.aggregator.poll_timeout(now) {
            debug!(
                "Telemetry for picture {} timed out with {} lines",
                snapshot.picture_index(),
                snapshot.lines().len()
            );
            self.persist(&snapshot)?;
        }
        Ok(())
    }

    fn limit_reached(&self) -> bool {
        self.max_pictures
            .is_some_and(|max| self.scheduler.picture_index() >= max)
    }

    fn fire(&mut self, request: CaptureRequest) -> Result<(), CaptureError> {
        if let Some(previous) = self.aggregator.flush() {
            self.persist(&previous)?;
        }

        let dir = self.subdirs.current_dir(request.index)?.to_path_buf();
        let image = storage::image_path(&dir, request.index);
        match self.camera.capture(&image) {
            Ok(()) => {
                info!(
                    "Picture {} ({}) saved to {}",
                    request.index,
                    request.trigger,
                    image.display()
                );
                self.indicator.set(true);
                self.led_off_at_ms = Some(request.at_ms.saturating_add(self.led_pulse_ms));
                self.aggregator.open(request.index, request.at_ms);
            }
            Err(e) => {
                // The index stays consumed, there is no pair for it
                error!("Could not take picture {}: {}", request.index, e);
                if image.exists() {
                    if let Err(e) = fs::remove_file(&image) {
                        warn!("Cannot remove partial image {}: {}", image.display(), e);
                    }
                }
            }
        }
        Ok(())
    }

    fn persist(&self, snapshot: &TelemetrySnapshot) -> Result<PathBuf, CaptureError> {
        let index = snapshot.picture_index();
        if !snapshot.is_complete() {
            debug!(
                "Telemetry for picture {} is incomplete ({:?})",
                index,
                snapshot.close_reason()
            );
        }
        let dir = self.subdirs.path_for(index);
        Ok(storage::write_telemetry(&dir, index, &snapshot.text())?)
    }

    /// Persist whatever is still open and close the device.
    pub fn shutdown(&mut self) -> Result<(), CaptureError> {
        let result = match self.aggregator.flush() {
            Some(snapshot) => self.persist(&snapshot).map(|_| ()),
            None => Ok(()),
        };
        self.source.close();
        if self.led_off_at_ms.take().is_some() {
            self.indicator.set(false);
        }
        result
    }

    /// Drive the loop until the picture limit, a shutdown request or a fatal error.
    pub async fn run(mut self, subsys: SubsystemHandle) -> Result<(), CaptureError> {
        let start = Instant::now();
        let elapsed_ms = || start.elapsed().as_millis() as u64;

        let mut poll_timer = interval(Duration::from_millis(self.poll_interval_ms.max(1)));
        poll_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = subsys.on_shutdown_requested() => {
                    info!("Shutdown requested, stopping capture");
                    break;
                }
                _ = poll_timer.tick() => {
                    let now = elapsed_ms();
                    match self.poll_once(now) {
                        Ok(LoopStatus::Running) => {}
                        Ok(LoopStatus::Finished) => {
                            subsys.request_shutdown();
                            break;
                        }
                        Err(e) => {
                            error!("Capture stopped: {}", e);
                            if let Err(e) = self.shutdown() {
                                warn!("Could not save last telemetry: {}", e);
                            }
                            return Err(e);
                        }
                    }
                }
            }
        }

        self.shutdown()?;
        info!("Capture session {} closed", self.session.number);
        Ok(())
    }
}
