//! GPIO pins through the sysfs interface.
//!
//! Used for the capture LED and the shutdown button.

use log::{debug, warn};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use geosnap_core::Indicator;

pub const SYSFS_GPIO_BASE: &str = "/sys/class/gpio";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    In,
    Out,
}

impl Direction {
    fn as_str(&self) -> &'static str {
        match self {
            Direction::In => "in",
            Direction::Out => "out",
        }
    }
}

#[derive(Debug)]
pub struct SysfsGpio {
    pin: u32,
    value_path: PathBuf,
}

impl SysfsGpio {
    pub fn output(pin: u32) -> io::Result<Self> {
        Self::with_base(Path::new(SYSFS_GPIO_BASE), pin, Direction::Out)
    }

    pub fn input(pin: u32) -> io::Result<Self> {
        Self::with_base(Path::new(SYSFS_GPIO_BASE), pin, Direction::In)
    }

    /// Export `pin` below `base` (unless already exported) and set its direction.
    pub fn with_base(base: &Path, pin: u32, direction: Direction) -> io::Result<Self> {
        let pin_dir = base.join(format!("gpio{}", pin));
        if !pin_dir.is_dir() {
            debug!("Exporting GPIO {}", pin);
            fs::write(base.join("export"), pin.to_string())?;
        }
        fs::write(pin_dir.join("direction"), direction.as_str())?;
        Ok(SysfsGpio {
            pin,
            value_path: pin_dir.join("value"),
        })
    }

    pub fn pin(&self) -> u32 {
        self.pin
    }

    /// Current level, `true` is high.
    pub fn read(&self) -> io::Result<bool> {
        let value = fs::read_to_string(&self.value_path)?;
        Ok(value.trim_start().starts_with('1'))
    }

    pub fn write(&self, high: bool) -> io::Result<()> {
        fs::write(&self.value_path, if high { "1" } else { "0" })
    }
}

impl Indicator for SysfsGpio {
    fn set(&mut self, on: bool) {
        if let Err(e) = self.write(on) {
            warn!("Cannot set GPIO {}: {}", self.pin, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_already_exported_pin() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join("gpio17")).unwrap();

        let mut led = SysfsGpio::with_base(temp.path(), 17, Direction::Out).unwrap();
        assert_eq!(
            fs::read_to_string(temp.path().join("gpio17/direction")).unwrap(),
            "out"
        );
        assert!(!temp.path().join("export").exists());

        led.set(true);
        assert_eq!(fs::read_to_string(temp.path().join("gpio17/value")).unwrap(), "1");
        assert!(led.read().unwrap());
        led.set(false);
        assert!(!led.read().unwrap());
    }

    #[test]
    fn test_export_written_for_new_pin() {
        let temp = TempDir::new().unwrap();
        // Without a kernel nothing creates gpio27/, so setting the direction fails
        assert!(SysfsGpio::with_base(temp.path(), 27, Direction::In).is_err());
        assert_eq!(fs::read_to_string(temp.path().join("export")).unwrap(), "27");
    }
}
