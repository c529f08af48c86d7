//! Infrastructure layer for the padmouse daemon.
//!
//! Contains OS-facing adapters: the evdev input bus and hotplug monitor, the
//! uinput virtual pointer, and configuration file storage.  Each adapter has
//! an in-memory mock next to it.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `padmouse_core`, but MUST NOT be imported by the `application` or domain
//! layers.

pub mod input_bus;
pub mod storage;
pub mod virtual_pointer;
