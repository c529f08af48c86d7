//! Pointer actions: the effects the mapping engine asks the virtual pointer
//! to perform.
//!
//! Actions are transient.  The mapping engine produces a short, ordered
//! sequence for each envelope, the dispatch worker applies it to the virtual
//! pointer immediately, and the sequence is then dropped.

use crate::event::{BTN_LEFT, BTN_RIGHT, REL_HWHEEL, REL_WHEEL, REL_X, REL_Y};

/// Relative pointer-motion axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MotionAxis {
    X,
    Y,
}

impl MotionAxis {
    /// The `REL_*` code for this axis.
    pub fn code(self) -> u16 {
        match self {
            MotionAxis::X => REL_X,
            MotionAxis::Y => REL_Y,
        }
    }
}

/// Scroll-wheel axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WheelAxis {
    Horizontal,
    Vertical,
}

impl WheelAxis {
    /// The `REL_*` code for this wheel.
    pub fn code(self) -> u16 {
        match self {
            WheelAxis::Horizontal => REL_HWHEEL,
            WheelAxis::Vertical => REL_WHEEL,
        }
    }
}

/// Pointer button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PointerButton {
    Left,
    Right,
}

impl PointerButton {
    /// The `BTN_*` code for this button.
    pub fn code(self) -> u16 {
        match self {
            PointerButton::Left => BTN_LEFT,
            PointerButton::Right => BTN_RIGHT,
        }
    }
}

/// One translated effect to apply to the virtual pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PointerAction {
    /// Move the cursor by `delta` units along `axis`.
    MoveRelative { axis: MotionAxis, delta: i32 },
    /// Turn a wheel by `delta` detents.
    ScrollRelative { axis: WheelAxis, delta: i32 },
    /// Set a button's pressed state.
    ButtonState { button: PointerButton, pressed: bool },
    /// Commit everything reported since the previous synchronize as one
    /// input frame.
    Synchronize,
}

impl PointerAction {
    /// Returns `true` for the frame commit marker.
    pub fn is_synchronize(&self) -> bool {
        matches!(self, PointerAction::Synchronize)
    }
}

/// The capability set the virtual pointer must declare before it is
/// registered with the OS.
///
/// The set is fixed: padmouse never emits anything outside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointerCapabilities {
    /// Relative motion axes.
    pub motion_axes: Vec<MotionAxis>,
    /// Scroll wheels.
    pub wheel_axes: Vec<WheelAxis>,
    /// Buttons.
    pub buttons: Vec<PointerButton>,
}

impl PointerCapabilities {
    /// Relative X/Y, both wheels, left and right buttons.
    pub fn standard() -> Self {
        Self {
            motion_axes: vec![MotionAxis::X, MotionAxis::Y],
            wheel_axes: vec![WheelAxis::Horizontal, WheelAxis::Vertical],
            buttons: vec![PointerButton::Left, PointerButton::Right],
        }
    }

    /// All `REL_*` codes, motion axes first.
    pub fn relative_codes(&self) -> Vec<u16> {
        self.motion_axes
            .iter()
            .map(|a| a.code())
            .chain(self.wheel_axes.iter().map(|w| w.code()))
            .collect()
    }

    /// All `BTN_*` codes.
    pub fn button_codes(&self) -> Vec<u16> {
        self.buttons.iter().map(|b| b.code()).collect()
    }

    /// Returns `true` if applying `action` stays within this capability set.
    pub fn supports(&self, action: &PointerAction) -> bool {
        match action {
            PointerAction::MoveRelative { axis, .. } => self.motion_axes.contains(axis),
            PointerAction::ScrollRelative { axis, .. } => self.wheel_axes.contains(axis),
            PointerAction::ButtonState { button, .. } => self.buttons.contains(button),
            PointerAction::Synchronize => true,
        }
    }
}

impl Default for PointerCapabilities {
    fn default() -> Self {
        Self::standard()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
