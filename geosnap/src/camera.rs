//! Still camera driven through an external capture program.

use log::debug;
use std::path::Path;
use std::process::{Command, Stdio};

use geosnap_core::{Camera, CameraError};

pub const DEFAULT_CAMERA_COMMAND: &str =
    "libcamera-still --nopreview --immediate --width 1600 --height 1200 -o {path}";

const PATH_PLACEHOLDER: &str = "{path}";

/// Runs a command line per picture.
///
/// Every `{path}` in the arguments is replaced by the image path; without a
/// placeholder the path is passed as the last argument.
#[derive(Debug, Clone)]
pub struct CommandCamera {
    program: String,
    args: Vec<String>,
}

impl CommandCamera {
    pub fn from_template(template: &str) -> Result<Self, CameraError> {
        let mut words = template.split_whitespace().map(str::to_string);
        let program = words
            .next()
            .ok_or_else(|| CameraError::Spawn("empty camera command".to_string()))?;
        let mut args: Vec<String> = words.collect();
        let has_placeholder =
            program.contains(PATH_PLACEHOLDER) || args.iter().any(|a| a.contains(PATH_PLACEHOLDER));
        if !has_placeholder {
            args.push(PATH_PLACEHOLDER.to_string());
        }
        Ok(CommandCamera { program, args })
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    fn args_for(&self, path: &Path) -> Vec<String> {
        let path = path.to_string_lossy();
        self.args
            .iter()
            .map(|a| a.replace(PATH_PLACEHOLDER, &path))
            .collect()
    }
}

impl Camera for CommandCamera {
    fn capture(&mut self, path: &Path) -> Result<(), CameraError> {
        let args = self.args_for(path);
        debug!("Running {} {}", self.program, args.join(" "));

        let output = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| CameraError::Spawn(format!("{}: {}", self.program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let detail = stderr.lines().last().unwrap_or("").trim();
            return Err(CameraError::Failed(if detail.is_empty() {
                output.status.to_string()
            } else {
                format!("{} ({})", output.status, detail)
            }));
        }
        if !path.is_file() {
            return Err(CameraError::MissingImage(path.display().to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_template_placeholder() {
        let camera = CommandCamera::from_template(DEFAULT_CAMERA_COMMAND).unwrap();
        assert_eq!(camera.program(), "libcamera-still");
        let args = camera.args_for(Path::new("/data/0001/0001/00000001.jpg"));
        assert_eq!(args.last().unwrap(), "/data/0001/0001/00000001.jpg");
        assert_eq!(args[args.len() - 2], "-o");
    }

    #[test]
    fn test_template_without_placeholder() {
        let camera = CommandCamera::from_template("raspistill -o").unwrap();
        assert_eq!(camera.args_for(Path::new("a.jpg")), ["-o", "a.jpg"]);
        assert!(CommandCamera::from_template("   ").is_err());
    }

    #[test]
    fn test_capture_success() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("00000001.jpg");
        let mut camera = CommandCamera::from_template("touch {path}").unwrap();
        camera.capture(&path).unwrap();
        assert!(path.is_file());
    }

    #[test]
    fn test_capture_nonzero_exit() {
        let temp = TempDir::new().unwrap();
        let mut camera = CommandCamera::from_template("false").unwrap();
        let err = camera.capture(&temp.path().join("x.jpg")).unwrap_err();
        assert!(matches!(err, CameraError::Failed(_)));
    }

    #[test]
    fn test_capture_without_image() {
        let temp = TempDir::new().unwrap();
        let mut camera = CommandCamera::from_template("true").unwrap();
        let err = camera.capture(&temp.path().join("x.jpg")).unwrap_err();
        assert!(matches!(err, CameraError::MissingImage(_)));
    }

    #[test]
    fn test_capture_missing_program() {
        let temp = TempDir::new().unwrap();
        let mut camera = CommandCamera::from_template("geosnap-no-such-camera {path}").unwrap();
        let err = camera.capture(&temp.path().join("x.jpg")).unwrap_err();
        assert!(matches!(err, CameraError::Spawn(_)));
    }
}
