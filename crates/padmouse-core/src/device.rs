//! Candidate input devices and the gamepad identity padmouse binds to.

use std::fmt;
use std::path::PathBuf;

/// The only device name padmouse accepts (exact, case-sensitive).
pub const GAMEPAD_NAME: &str = "Microsoft X-Box One S pad";

/// What the OS input layer tells us about a device that has appeared.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceInfo {
    /// Human-readable device name reported by the driver.
    pub name: String,
    /// Event node, when the backend is file based (e.g. `/dev/input/event7`).
    pub path: Option<PathBuf>,
}

impl DeviceInfo {
    /// Creates a device description without a backing node.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: None,
        }
    }

    /// Creates a device description for an event node.
    pub fn with_path(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: Some(path.into()),
        }
    }
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.path {
            Some(path) => write!(f, "{} ({})", self.name, path.display()),
            None => f.write_str(&self.name),
        }
    }
}

/// Returns `true` if `device` is the gamepad model padmouse drives.
pub fn is_supported_gamepad(device: &DeviceInfo) -> bool {
    device.name == GAMEPAD_NAME
}

// ── Tests ─────────────────────────────────────────────────────────────────────
