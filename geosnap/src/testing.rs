//! Scripted stand-ins for the hardware, shared by the unit tests.
//!
//! Every mock is a cheap clone around shared state, so a test keeps one
//! handle for scripting and inspection and moves the other into the code
//! under test.

use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use geosnap_core::{Camera, CameraError, Indicator, IoError, SerialDevice};

#[derive(Default)]
struct SerialState {
    open: bool,
    opens: usize,
    fail_opens: usize,
    reads: VecDeque<Result<Vec<u8>, IoError>>,
}

#[derive(Clone, Default)]
pub struct MockSerial {
    state: Arc<Mutex<SerialState>>,
}

impl MockSerial {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue bytes returned by one read.
    pub fn push_data(&self, bytes: &[u8]) {
        self.state.lock().unwrap().reads.push_back(Ok(bytes.to_vec()));
    }

    /// Queue an error returned by one read.
    pub fn push_error(&self, err: IoError) {
        self.state.lock().unwrap().reads.push_back(Err(err));
    }

    pub fn fail_next_open(&self) {
        self.state.lock().unwrap().fail_opens += 1;
    }

    /// Number of open attempts so far.
    pub fn opens(&self) -> usize {
        self.state.lock().unwrap().opens
    }
}

impl SerialDevice for MockSerial {
    fn open(&mut self) -> Result<(), IoError> {
        let mut state = self.state.lock().unwrap();
        state.opens += 1;
        if state.fail_opens > 0 {
            state.fail_opens -= 1;
            state.open = false;
            return Err(IoError::new(2, "No such file or directory"));
        }
        state.open = true;
        Ok(())
    }

    fn close(&mut self) {
        self.state.lock().unwrap().open = false;
    }

    fn is_open(&self) -> bool {
        self.state.lock().unwrap().open
    }

    fn read_available(&mut self, buf: &mut Vec<u8>) -> Result<usize, IoError> {
        let mut state = self.state.lock().unwrap();
        if !state.open {
            return Err(IoError::not_open());
        }
        match state.reads.pop_front() {
            Some(Ok(bytes)) => {
                buf.extend_from_slice(&bytes);
                Ok(bytes.len())
            }
            Some(Err(e)) => Err(e),
            None => Ok(0),
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[derive(Default)]
struct CameraState {
    captured: Vec<PathBuf>,
    failures: VecDeque<bool>,
}

/// Camera that writes a small placeholder image.
#[derive(Clone, Default)]
pub struct MockCamera {
    state: Arc<Mutex<CameraState>>,
}

impl MockCamera {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the outcome of the next captures, `true` meaning failure.
    ///
    /// A failing capture still leaves a truncated image behind, like a
    /// camera program that dies halfway through writing.
    pub fn script(&self, failures: &[bool]) {
        self.state.lock().unwrap().failures.extend(failures.iter().copied());
    }

    /// Paths of every capture attempt, failed ones included.
    pub fn captured(&self) -> Vec<PathBuf> {
        self.state.lock().unwrap().captured.clone()
    }
}

impl Camera for MockCamera {
    fn capture(&mut self, path: &Path) -> Result<(), CameraError> {
        let mut state = self.state.lock().unwrap();
        state.captured.push(path.to_path_buf());
        if state.failures.pop_front().unwrap_or(false) {
            let _ = fs::write(path, b"\xff\xd8");
            return Err(CameraError::Failed("exit status: 1".to_string()));
        }
        fs::write(path, b"\xff\xd8\xff\xd9").map_err(|e| CameraError::MissingImage(e.to_string()))
    }
}

#[derive(Clone, Default)]
pub struct MockIndicator {
    history: Arc<Mutex<Vec<bool>>>,
}

impl MockIndicator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn history(&self) -> Vec<bool> {
        self.history.lock().unwrap().clone()
    }
}

impl Indicator for MockIndicator {
    fn set(&mut self, on: bool) {
        self.history.lock().unwrap().push(on);
    }
}
