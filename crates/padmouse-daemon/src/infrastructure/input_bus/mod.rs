//! Input bus infrastructure: where physical gamepad events come from.
//!
//! On Linux each candidate device is an evdev node under `/dev/input`.  A
//! bound device gets its own reader thread that polls the node without
//! blocking and pushes every key, relative, absolute, and misc event into
//! the session's [`EventSink`](crate::application::session::EventSink).
//! When the node disappears the reader reports the handle on a removal
//! channel.
//!
//! [`hotplug::HotplugMonitor`] turns periodic device scans and those removal
//! notices into `connect`/`disconnect` calls on the session.
//!
//! # Testability
//!
//! [`mock::RecordingInputBus`] implements
//! [`InputBus`](crate::application::session::InputBus) in memory and lets
//! tests inject raw events and unplug devices.

pub mod hotplug;
pub mod mock;

#[cfg(target_os = "linux")]
pub mod linux;
