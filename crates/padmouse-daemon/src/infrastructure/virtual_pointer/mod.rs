//! Virtual pointer infrastructure.
//!
//! On Linux the pointer is a uinput device declaring relative X/Y motion,
//! both wheels, and the left/right buttons.  Reports accumulate in a pending
//! buffer and go out as one `write` followed by `SYN_REPORT` on
//! `synchronize`.
//!
//! # Testability
//!
//! [`mock::MockVirtualPointer`] implements the same
//! [`VirtualPointer`](crate::application::emit_pointer::VirtualPointer) trait
//! and records committed frames in memory.

pub mod mock;

#[cfg(target_os = "linux")]
pub mod linux;
