//! Serial port access for the GPS receiver.
//!
//! The port is opened non-blocking and switched to raw mode with `nix`
//! termios calls, so [`SerialDevice::read_available`] returns whatever the
//! driver has buffered and never waits.
//!
//! A plain file or pipe is accepted too and replayed once: reaching its end
//! is reported as [`IoError::end_of_stream`], not as a hang-up.

use log::debug;
use nix::errno::Errno;
use nix::sys::termios::{self, BaudRate, ControlFlags, FlushArg, SetArg};
use std::fs::{File, OpenOptions};
use std::io::{self, Read};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

use geosnap_core::{ConfigError, IoError, SerialDevice};

/// Upper bound on a single drain, keeps one poll iteration short.
const MAX_READ_BYTES: usize = 16 * 1024;

fn baud_rate(baud: u32) -> Result<BaudRate, ConfigError> {
    match baud {
        4800 => Ok(BaudRate::B4800),
        9600 => Ok(BaudRate::B9600),
        19200 => Ok(BaudRate::B19200),
        38400 => Ok(BaudRate::B38400),
        57600 => Ok(BaudRate::B57600),
        115200 => Ok(BaudRate::B115200),
        other => Err(ConfigError::UnsupportedBaud(other)),
    }
}

#[derive(Debug)]
pub struct TtyDevice {
    path: PathBuf,
    name: String,
    baud: BaudRate,
    file: Option<File>,
    is_tty: bool,
}

impl TtyDevice {
    pub fn new(path: impl Into<PathBuf>, baud: u32) -> Result<Self, ConfigError> {
        let path = path.into();
        Ok(TtyDevice {
            name: path.display().to_string(),
            baud: baud_rate(baud)?,
            path,
            file: None,
            is_tty: true,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Line setup. Returns `false` when the device is not a terminal.
    fn configure(&self, file: &File) -> nix::Result<bool> {
        let mut tio = match termios::tcgetattr(file) {
            Ok(tio) => tio,
            Err(Errno::ENOTTY) => {
                debug!("{} is not a terminal, replaying it", self.name);
                return Ok(false);
            }
            Err(e) => return Err(e),
        };
        termios::cfmakeraw(&mut tio);
        termios::cfsetspeed(&mut tio, self.baud)?;
        tio.control_flags |= ControlFlags::CLOCAL | ControlFlags::CREAD;
        termios::tcsetattr(file, SetArg::TCSANOW, &tio)?;
        // Whatever queued up while nobody was listening is stale
        termios::tcflush(file, FlushArg::TCIFLUSH)?;
        Ok(true)
    }
}

impl SerialDevice for TtyDevice {
    fn open(&mut self) -> Result<(), IoError> {
        self.file = None;
        let file = OpenOptions::new()
            .read(true)
            .custom_flags(libc::O_NOCTTY | libc::O_NONBLOCK)
            .open(&self.path)?;
        self.is_tty = self
            .configure(&file)
            .map_err(|e| IoError::new(e as i32, format!("Cannot configure {}: {}", self.name, e)))?;
        debug!("Opened {}", self.name);
        self.file = Some(file);
        Ok(())
    }

    fn close(&mut self) {
        if self.file.take().is_some() {
            debug!("Closed {}", self.name);
        }
    }

    fn is_open(&self) -> bool {
        self.file.is_some()
    }

    fn read_available(&mut self, buf: &mut Vec<u8>) -> Result<usize, IoError> {
        let file = self.file.as_mut().ok_or_else(IoError::not_open)?;

        let mut chunk = [0u8; 1024];
        let mut total = 0;
        while total < MAX_READ_BYTES {
            match file.read(&mut chunk) {
                // End of file with nothing read: the tty hung up, or the recording is done
                Ok(0) if total == 0 && self.is_tty => return Err(IoError::hangup()),
                Ok(0) if total == 0 => return Err(IoError::end_of_stream()),
                Ok(0) => break,
                Ok(n) => {
                    buf.extend_from_slice(&chunk[..n]);
                    total += n;
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(total)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_unsupported_baud() {
        assert_eq!(
            TtyDevice::new("/dev/ttyAMA0", 1234).unwrap_err(),
            ConfigError::UnsupportedBaud(1234)
        );
        assert!(TtyDevice::new("/dev/ttyAMA0", 115200).is_ok());
    }

    #[test]
    fn test_open_missing_device() {
        let temp = TempDir::new().unwrap();
        let mut dev = TtyDevice::new(temp.path().join("ttyNONE"), 9600).unwrap();
        assert!(dev.open().is_err());
        assert!(!dev.is_open());
    }

    #[test]
    fn test_read_before_open() {
        let mut dev = TtyDevice::new("/dev/ttyAMA0", 9600).unwrap();
        let mut buf = Vec::new();
        assert_eq!(dev.read_available(&mut buf), Err(IoError::not_open()));
    }

    #[test]
    fn test_replay_from_plain_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("capture.nmea");
        fs::write(&path, b"$GPGGA,A\n$GPGSA,B\n").unwrap();

        let mut dev = TtyDevice::new(&path, 9600).unwrap();
        dev.open().unwrap();
        assert!(dev.is_open());

        let mut buf = Vec::new();
        assert_eq!(dev.read_available(&mut buf).unwrap(), 18);
        assert_eq!(buf, b"$GPGGA,A\n$GPGSA,B\n");

        let err = dev.read_available(&mut buf).unwrap_err();
        assert!(err.is_end_of_stream());
        assert!(!err.is_hangup());

        dev.close();
        assert!(!dev.is_open());
    }
}
