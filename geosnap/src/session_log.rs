//! Flush-on-write log sink.
//!
//! The `log` records are formatted by `env_logger` and piped into a
//! [`SessionLog`], which echoes them to stderr and appends them to the
//! current log file. The file starts out as an optional bootstrap log and
//! is switched to `session.log` inside the session directory once that
//! exists. Every write is flushed so the log survives a power cut.

use log::LevelFilter;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Default)]
struct SessionLogInner {
    file: Option<File>,
    path: Option<PathBuf>,
    echo_stderr: bool,
}

/// Cloneable handle, all clones write to the same file.
#[derive(Clone, Default)]
pub struct SessionLog {
    inner: Arc<Mutex<SessionLogInner>>,
}

impl SessionLog {
    pub fn new(echo_stderr: bool) -> Self {
        SessionLog {
            inner: Arc::new(Mutex::new(SessionLogInner {
                echo_stderr,
                ..Default::default()
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionLogInner> {
        // A panic while holding the lock cannot leave the file half-switched
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Start writing to `path`, truncating it. The previous file is closed.
    pub fn redirect(&self, path: &Path) -> io::Result<()> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;
        let mut inner = self.lock();
        if let Some(old) = inner.file.as_mut() {
            old.flush()?;
        }
        inner.file = Some(file);
        inner.path = Some(path.to_path_buf());
        Ok(())
    }

    /// The file currently written to, if any.
    pub fn path(&self) -> Option<PathBuf> {
        self.lock().path.clone()
    }

    /// Write one line, adding the terminator if missing.
    pub fn write_line(&self, line: &str) -> io::Result<()> {
        let mut handle = self.clone();
        handle.write_all(line.as_bytes())?;
        if !line.ends_with('\n') {
            handle.write_all(b"\n")?;
        }
        Ok(())
    }
}

impl Write for SessionLog {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut inner = self.lock();
        if inner.echo_stderr {
            // stderr going away must not take the file log with it
            let _ = io::stderr().write_all(buf);
        }
        if let Some(file) = inner.file.as_mut() {
            file.write_all(buf)?;
            file.flush()?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut inner = self.lock();
        if let Some(file) = inner.file.as_mut() {
            file.flush()?;
        }
        Ok(())
    }
}

/// Install `env_logger` writing through `sink`.
///
/// `RUST_LOG` still overrides the level chosen on the command line.
pub fn init_logging(level: LevelFilter, sink: SessionLog) {
    let mut logger = env_logger::Builder::new();
    logger
        .filter_level(level)
        .parse_default_env()
        .format_timestamp_millis()
        .write_style(env_logger::WriteStyle::Never)
        .target(env_logger::Target::Pipe(Box::new(sink)));
    if let Err(e) = logger.try_init() {
        eprintln!("Logger already initialized: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_lines_reach_the_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("take.log");
        let log = SessionLog::new(false);
        log.redirect(&path).unwrap();

        log.write_line("Seeking session directory").unwrap();
        log.write_line("Session path is: /data/0001\n").unwrap();

        // No explicit flush needed
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "Seeking session directory\nSession path is: /data/0001\n"
        );
    }

    #[test]
    fn test_redirect_switches_files() {
        let temp = TempDir::new().unwrap();
        let first = temp.path().join("bootstrap.log");
        let second = temp.path().join("session.log");

        let log = SessionLog::new(false);
        let mut clone = log.clone();
        log.redirect(&first).unwrap();
        clone.write_all(b"one\n").unwrap();
        log.redirect(&second).unwrap();
        clone.write_all(b"two\n").unwrap();

        assert_eq!(fs::read_to_string(&first).unwrap(), "one\n");
        assert_eq!(fs::read_to_string(&second).unwrap(), "two\n");
        assert_eq!(log.path(), Some(second));
    }

    #[test]
    fn test_without_file_writes_are_accepted() {
        let mut log = SessionLog::new(false);
        assert_eq!(log.write(b"dropped\n").unwrap(), 8);
        assert!(log.path().is_none());
    }
}
