//! Storage infrastructure: the daemon's TOML configuration file.
//!
//! The `config` sub-module reads the file from the XDG config directory,
//! falls back to defaults when it does not exist, and validates values that
//! serde cannot range-check.

pub mod config;
