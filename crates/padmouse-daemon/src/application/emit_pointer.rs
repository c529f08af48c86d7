//! Emission step: applies translated pointer actions to the virtual pointer.
//!
//! This module sits at the application layer and delegates to a
//! [`VirtualPointer`] trait object for the actual device writes.  The
//! platform implementations live in `infrastructure::virtual_pointer`.
//!
//! # Pending state and frames
//!
//! A virtual pointer keeps a pending-state buffer.  `report_*` calls are cheap
//! assignments into that buffer; [`VirtualPointer::synchronize`] flushes the
//! buffer to downstream consumers as one atomic input frame.  Only the
//! dispatch worker ever holds the pointer, so none of these methods need
//! interior locking.

use padmouse_core::{MotionAxis, PointerAction, PointerButton, WheelAxis};
use thiserror::Error;
use tracing::debug;

/// Error type for virtual pointer operations.
#[derive(Debug, Error)]
pub enum PointerError {
    /// The device could not be created or registered with the OS.
    #[error("failed to create virtual pointer: {0}")]
    Create(String),
    /// A frame could not be written to the device.
    #[error("failed to emit frame: {0}")]
    Emit(String),
    /// The device has already been destroyed.
    #[error("virtual pointer has been destroyed")]
    Destroyed,
}

/// Platform-agnostic virtual pointer device.
pub trait VirtualPointer: Send {
    /// Buffers a relative motion on `axis`.
    fn report_motion(&mut self, axis: MotionAxis, delta: i32) -> Result<(), PointerError>;

    /// Buffers a wheel movement on `axis`.
    fn report_wheel(&mut self, axis: WheelAxis, delta: i32) -> Result<(), PointerError>;

    /// Buffers a button state.
    fn report_button(&mut self, button: PointerButton, pressed: bool) -> Result<(), PointerError>;

    /// Commits everything buffered since the last call as one input frame.
    fn synchronize(&mut self) -> Result<(), PointerError>;

    /// Unregisters the device from the OS.  Further calls fail with
    /// [`PointerError::Destroyed`].
    fn destroy(&mut self) -> Result<(), PointerError>;
}

/// Applies `actions` to `pointer` in order.
///
/// Stops at the first failing action.  Anything already buffered stays in the
/// device's pending state and goes out with the next successful synchronize.
///
/// # Errors
///
/// Returns the [`PointerError`] of the first action the device rejected.
pub fn apply_actions(
    pointer: &mut dyn VirtualPointer,
    actions: &[PointerAction],
    verbose: bool,
) -> Result<(), PointerError> {
    for action in actions {
        if verbose {
            debug!("applying {action:?}");
        }
        match *action {
            PointerAction::MoveRelative { axis, delta } => pointer.report_motion(axis, delta)?,
            PointerAction::ScrollRelative { axis, delta } => pointer.report_wheel(axis, delta)?,
            PointerAction::ButtonState { button, pressed } => {
                pointer.report_button(button, pressed)?
            }
            PointerAction::Synchronize => pointer.synchronize()?,
        }
    }
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
