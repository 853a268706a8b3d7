//! On-disk layout of a capture session.
//!
//! Every run gets the next free numbered directory below the data root,
//! and pictures are spread over numbered sub-directories of fixed capacity:
//!
//! `<data-dir>/<NNNN>/<NNNN>/<NNNNNNNN>.jpg` and `.gps`
//!
//! Naming rules live in [`geosnap_core::layout`], this module does the
//! filesystem work.

use log::{debug, info};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

use geosnap_core::layout;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Unable to read data directory {path}: {source}")]
    RootUnavailable { path: PathBuf, source: io::Error },

    #[error("Unable to create directory {path}: {source}")]
    CreateDir { path: PathBuf, source: io::Error },

    #[error("Directory {path} does not exist after creation")]
    Missing { path: PathBuf },

    #[error("Unable to write {path}: {source}")]
    Write { path: PathBuf, source: io::Error },
}

/// The directory allocated for this run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionDirectory {
    pub number: u32,
    pub path: PathBuf,
}

impl SessionDirectory {
    pub fn log_path(&self) -> PathBuf {
        self.path.join(layout::SESSION_LOG_FILE)
    }
}

pub struct SessionDirectoryAllocator {
    root: PathBuf,
}

impl SessionDirectoryAllocator {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        SessionDirectoryAllocator { root: root.into() }
    }

    /// Create the directory numbered one above the highest existing one.
    ///
    /// The data root itself is created when missing (fresh SD card).
    pub fn allocate(&self) -> Result<SessionDirectory, StorageError> {
        fs::create_dir_all(&self.root).map_err(|source| StorageError::CreateDir {
            path: self.root.clone(),
            source,
        })?;

        let entries = fs::read_dir(&self.root).map_err(|source| StorageError::RootUnavailable {
            path: self.root.clone(),
            source,
        })?;

        let mut names = Vec::new();
        for entry in entries.flatten() {
            if entry.path().is_dir() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }

        let number = layout::next_session_number(names.iter().map(String::as_str));
        let path = self.root.join(layout::session_dir_name(number));
        fs::create_dir(&path).map_err(|source| StorageError::CreateDir {
            path: path.clone(),
            source,
        })?;
        if !path.is_dir() {
            return Err(StorageError::Missing { path });
        }

        info!("Session path is: {}", path.display());
        Ok(SessionDirectory { number, path })
    }
}

/// Hands out the sub-directory a picture goes into, creating it on first use.
#[derive(Debug)]
pub struct RotatingSubdirAllocator {
    session_dir: PathBuf,
    capacity: u32,
    current_index: u32,
    current_path: PathBuf,
}

impl RotatingSubdirAllocator {
    pub fn new(session_dir: impl Into<PathBuf>, capacity: u32) -> Self {
        let session_dir = session_dir.into();
        RotatingSubdirAllocator {
            current_path: session_dir.clone(),
            session_dir,
            capacity: capacity.max(1),
            current_index: 0,
        }
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Where picture `picture_index` and its telemetry are stored.
    pub fn path_for(&self, picture_index: u32) -> PathBuf {
        let subdir = layout::subdir_index(picture_index, self.capacity);
        self.session_dir.join(layout::subdir_name(subdir))
    }

    /// Make sure the sub-directory for `picture_index` exists.
    ///
    /// The filesystem is only touched when the sub-directory changes.
    pub fn current_dir(&mut self, picture_index: u32) -> Result<&Path, StorageError> {
        let subdir = layout::subdir_index(picture_index, self.capacity);
        if subdir != self.current_index {
            let path = self.session_dir.join(layout::subdir_name(subdir));
            fs::create_dir_all(&path).map_err(|source| StorageError::CreateDir {
                path: path.clone(),
                source,
            })?;
            if !path.is_dir() {
                return Err(StorageError::Missing { path });
            }
            info!("Working directory is now {}", path.display());
            self.current_index = subdir;
            self.current_path = path;
        }
        Ok(&self.current_path)
    }
}

/// Path of the image for `picture_index` inside `dir`.
pub fn image_path(dir: &Path, picture_index: u32) -> PathBuf {
    dir.join(layout::image_file_name(picture_index))
}

/// Store the telemetry text of one picture.
///
/// Written to a temporary name first so a power cut never leaves a
/// truncated `.gps` file behind.
pub fn write_telemetry(dir: &Path, picture_index: u32, text: &str) -> Result<PathBuf, StorageError> {
    let path = dir.join(layout::telemetry_file_name(picture_index));
    let tmp = path.with_extension(format!("{}.tmp", layout::TELEMETRY_EXTENSION));

    let write = |target: &Path| -> io::Result<()> {
        let mut file = fs::File::create(target)?;
        file.write_all(text.as_bytes())?;
        file.sync_all()
    };
    write(&tmp).map_err(|source| StorageError::Write {
        path: tmp.clone(),
        source,
    })?;
    fs::rename(&tmp, &path).map_err(|source| StorageError::Write {
        path: path.clone(),
        source,
    })?;

    debug!("Wrote {} ({} bytes)", path.display(), text.len());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_first_session_is_0001() {
        let temp = TempDir::new().unwrap();
        let session = SessionDirectoryAllocator::new(temp.path()).allocate().unwrap();
        assert_eq!(session.number, 1);
        assert_eq!(session.path, temp.path().join("0001"));
        assert!(session.path.is_dir());
    }

    #[test]
    fn test_next_session_after_highest() {
        let temp = TempDir::new().unwrap();
        for name in ["0001", "0003", "lost+found", "12ab"] {
            fs::create_dir(temp.path().join(name)).unwrap();
        }
        // A numeric file is not a session
        fs::write(temp.path().join("0009"), b"").unwrap();

        let session = SessionDirectoryAllocator::new(temp.path()).allocate().unwrap();
        assert_eq!(session.number, 4);
        assert_eq!(session.path, temp.path().join("0004"));
        assert_eq!(session.log_path(), temp.path().join("0004").join("session.log"));
    }

    #[test]
    fn test_missing_root_is_created() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("media").join("pictures");
        let session = SessionDirectoryAllocator::new(&root).allocate().unwrap();
        assert_eq!(session.path, root.join("0001"));
    }

    #[test]
    fn test_root_that_is_a_file_fails() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("not-a-dir");
        fs::write(&root, b"x").unwrap();
        assert!(SessionDirectoryAllocator::new(&root).allocate().is_err());
    }

    #[test]
    fn test_subdir_rotation() {
        let temp = TempDir::new().unwrap();
        let mut subdirs = RotatingSubdirAllocator::new(temp.path(), 2);

        assert_eq!(subdirs.current_dir(1).unwrap(), temp.path().join("0001"));
        assert_eq!(subdirs.current_dir(2).unwrap(), temp.path().join("0001"));
        assert_eq!(subdirs.current_dir(3).unwrap(), temp.path().join("0002"));
        assert!(temp.path().join("0002").is_dir());
        assert!(!temp.path().join("0003").exists());
        assert_eq!(subdirs.path_for(5), temp.path().join("0003"));
    }

    #[test]
    fn test_subdir_created_once() {
        let temp = TempDir::new().unwrap();
        let mut subdirs = RotatingSubdirAllocator::new(temp.path(), 900);
        let dir = subdirs.current_dir(1).unwrap().to_path_buf();
        fs::remove_dir(&dir).unwrap();

        // Same sub-directory, no filesystem access
        subdirs.current_dir(2).unwrap();
        assert!(!dir.exists());
    }

    #[test]
    fn test_write_telemetry() {
        let temp = TempDir::new().unwrap();
        let path = write_telemetry(temp.path(), 2, "$GPGGA,C\n$GPGSA,D\n").unwrap();
        assert_eq!(path, temp.path().join("00000002.gps"));
        assert_eq!(fs::read_to_string(&path).unwrap(), "$GPGGA,C\n$GPGSA,D\n");
        assert!(!temp.path().join("00000002.gps.tmp").exists());
        assert_eq!(image_path(temp.path(), 2), temp.path().join("00000002.jpg"));
    }

    #[test]
    fn test_write_telemetry_into_missing_dir() {
        let temp = TempDir::new().unwrap();
        let err = write_telemetry(&temp.path().join("gone"), 1, "x").unwrap_err();
        assert!(matches!(err, StorageError::Write { .. }));
    }
}
