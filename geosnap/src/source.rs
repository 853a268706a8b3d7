//! Serial line source that survives device dropouts.
//!
//! Wraps a [`SerialDevice`] in the [`SerialLink`] failure state machine.
//! A failed read closes the device; the next [`ResilientLineSource::drain`]
//! after the backoff reopens it. Only when the link is dead, or a recorded
//! log has been read to the end, does the caller see an error.

use log::{debug, error, info, warn};

use geosnap_core::{IoError, LinkState, SerialDevice, SerialLink, SourceError};

pub struct ResilientLineSource<D: SerialDevice> {
    device: D,
    link: SerialLink,
    last_error: Option<IoError>,
    /// Set once a recorded log ran out, there is nothing to reopen
    ended: bool,
}

impl<D: SerialDevice> ResilientLineSource<D> {
    pub fn new(device: D, max_failures: u32, backoff_ms: u64) -> Self {
        ResilientLineSource {
            device,
            link: SerialLink::new(max_failures, backoff_ms),
            last_error: None,
            ended: false,
        }
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn state(&self) -> LinkState {
        self.link.state()
    }

    pub fn failure_count(&self) -> u32 {
        self.link.failure_count()
    }

    pub fn is_open(&self) -> bool {
        self.link.state().is_open() && self.device.is_open()
    }

    /// Initial open. A failure counts like any other and is retried later.
    pub fn open(&mut self, current_time_ms: u64) -> Result<(), SourceError> {
        match self.device.open() {
            Ok(()) => {
                self.link.opened();
                info!("Opened serial device {}", self.device.name());
                Ok(())
            }
            Err(e) => {
                warn!("Cannot open serial device {}: {}", self.device.name(), e);
                self.fail(current_time_ms, e)
            }
        }
    }

    /// Reopen after a failure. Does nothing while the source is open.
    pub fn reopen(&mut self, current_time_ms: u64) -> Result<(), SourceError> {
        match self.link.state() {
            LinkState::Open => Ok(()),
            LinkState::Dead => Err(self.exhausted()),
            LinkState::Closed | LinkState::Degraded => {
                debug!(
                    "Reopening {} (failure {} of {})",
                    self.device.name(),
                    self.link.failure_count(),
                    self.link.max_failures()
                );
                self.device.close();
                self.open(current_time_ms)
            }
        }
    }

    /// Everything the device has buffered right now, possibly nothing.
    ///
    /// Reopens the device first when a reopen is due. Errors only once the
    /// failure threshold has been reached or a recording has run out.
    pub fn drain(&mut self, current_time_ms: u64) -> Result<Vec<u8>, SourceError> {
        let mut buf = Vec::new();
        if self.ended {
            return Err(self.end_of_stream());
        }
        match self.link.state() {
            LinkState::Dead => return Err(self.exhausted()),
            LinkState::Open => {}
            LinkState::Closed | LinkState::Degraded => {
                if !self.link.should_reopen(current_time_ms) {
                    return Ok(buf);
                }
                self.reopen(current_time_ms)?;
                if !self.link.state().is_open() {
                    return Ok(buf);
                }
            }
        }

        match self.device.read_available(&mut buf) {
            Ok(_) => {
                if self.link.failure_count() > 0 {
                    info!("Serial device {} recovered", self.device.name());
                }
                self.link.succeeded();
                Ok(buf)
            }
            Err(e) if e.is_end_of_stream() => {
                info!("Reached the end of {}", self.device.name());
                self.device.close();
                self.ended = true;
                if buf.is_empty() {
                    return Err(self.end_of_stream());
                }
                Ok(buf)
            }
            Err(e) => {
                warn!("Read from {} failed: {}", self.device.name(), e);
                self.fail(current_time_ms, e)?;
                // Bytes read before the error are still good
                Ok(buf)
            }
        }
    }

    pub fn close(&mut self) {
        self.device.close();
        self.link.reset();
    }

    fn fail(&mut self, current_time_ms: u64, e: IoError) -> Result<(), SourceError> {
        self.device.close();
        self.last_error = Some(e);
        match self.link.failed(current_time_ms) {
            LinkState::Dead => {
                let err = self.exhausted();
                error!("{}", err);
                Err(err)
            }
            _ => Ok(()),
        }
    }

    fn end_of_stream(&self) -> SourceError {
        SourceError::EndOfStream(self.device.name().to_string())
    }

    fn exhausted(&self) -> SourceError {
        SourceError::Exhausted {
            failures: self.link.failure_count(),
            last_error: self.last_error.clone().unwrap_or_else(IoError::not_open),
        }
    }
}
