//! TOML-based configuration for the padmouse daemon.
//!
//! The file lives at `$XDG_CONFIG_HOME/padmouse/config.toml`, falling back to
//! `~/.config/padmouse/config.toml`.  A missing file is not an error; every
//! field has a default, so the daemon runs without any configuration.
//!
//! ```toml
//! [daemon]
//! log_level = "info"
//! verbose_actions = false
//!
//! [pointer]
//! name = "virtual_mouse"
//!
//! [device]
//! grab = true
//! rescan_interval_ms = 1000
//!
//! [queue]
//! capacity = 1024
//! ```
//!
//! # Serde default values
//!
//! Fields annotated with `#[serde(default = "some_fn")]` use the return value
//! of `some_fn()` when the field is absent, and every section is
//! `#[serde(default)]`, so a partial file only overrides what it names.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::application::dispatch::{DispatchConfig, DEFAULT_QUEUE_CAPACITY};

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Neither `XDG_CONFIG_HOME` nor `HOME` is set.
    #[error("could not determine config directory")]
    NoConfigDir,

    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value parsed but is out of range.
    #[error("invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level daemon configuration.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AppConfig {
    pub daemon: DaemonConfig,
    pub pointer: PointerConfig,
    pub device: DeviceConfig,
    pub queue: QueueConfig,
}

/// Process-wide settings.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DaemonConfig {
    /// `tracing` filter directive, e.g. `"info"` or `"padmouse_daemon=debug"`.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Log every pointer action the dispatch worker applies.
    pub verbose_actions: bool,
}

/// Virtual pointer settings.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PointerConfig {
    /// Device name registered with uinput.
    #[serde(default = "default_pointer_name")]
    pub name: String,
}

/// Physical gamepad settings.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DeviceConfig {
    /// Grab the bound gamepad exclusively.
    #[serde(default = "default_true")]
    pub grab: bool,
    /// Milliseconds between scans for newly attached devices.
    #[serde(default = "default_rescan_interval_ms")]
    pub rescan_interval_ms: u64,
}

/// Dispatch queue settings.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct QueueConfig {
    /// Envelopes buffered before new ones are dropped.
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_log_level() -> String {
    "info".to_string()
}
fn default_pointer_name() -> String {
    "virtual_mouse".to_string()
}
fn default_true() -> bool {
    true
}
fn default_rescan_interval_ms() -> u64 {
    1000
}
fn default_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            verbose_actions: false,
        }
    }
}

impl Default for PointerConfig {
    fn default() -> Self {
        Self {
            name: default_pointer_name(),
        }
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            grab: default_true(),
            rescan_interval_ms: default_rescan_interval_ms(),
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
        }
    }
}

impl AppConfig {
    /// Checks ranges serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queue.capacity == 0 {
            return Err(ConfigError::Invalid {
                field: "queue.capacity",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.device.rescan_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "device.rescan_interval_ms",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.pointer.name.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "pointer.name",
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Settings for the dispatch queue.
    pub fn dispatch(&self) -> DispatchConfig {
        DispatchConfig {
            capacity: self.queue.capacity,
            verbose_actions: self.daemon.verbose_actions,
            ..DispatchConfig::default()
        }
    }

    /// Interval between device scans.
    pub fn rescan_interval(&self) -> Duration {
        Duration::from_millis(self.device.rescan_interval_ms)
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Resolves the default config file path.
///
/// # Errors
///
/// Returns [`ConfigError::NoConfigDir`] if neither `XDG_CONFIG_HOME` nor
/// `HOME` is set.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    let base = std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))
        .ok_or(ConfigError::NoConfigDir)?;
    Ok(base.join("padmouse").join("config.toml"))
}

/// Loads and validates the config at `path`, returning
/// `AppConfig::default()` if the file does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// [`ConfigError::Parse`] if the TOML is malformed, and
/// [`ConfigError::Invalid`] if a value is out of range.
pub fn load_config_from(path: &Path) -> Result<AppConfig, ConfigError> {
    let config = match std::fs::read_to_string(path) {
        Ok(content) => toml::from_str::<AppConfig>(&content)?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => AppConfig::default(),
        Err(source) => {
            return Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    config.validate()?;
    Ok(config)
}

/// Loads the config from the default location.
///
/// # Errors
///
/// See [`config_file_path`] and [`load_config_from`].
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from(&config_file_path()?)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
