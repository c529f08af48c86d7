//! The mapping engine: gamepad event semantics to pointer action semantics.
//!
//! [`translate`] is a pure function of its input envelope.  It reads no shared
//! state and keeps none between calls, so translating the same envelope twice
//! yields two identical, independent sequences.
//!
//! # Rules
//!
//! | Envelope                       | Actions                                   |
//! |--------------------------------|-------------------------------------------|
//! | `EV_ABS` `ABS_X`   value `v`   | `MoveRelative{X, v / 7500}`, sync         |
//! | `EV_ABS` `ABS_Y`   value `v`   | `MoveRelative{Y, v / 7500}`, sync         |
//! | `EV_ABS` `ABS_HAT0X` value `v` | `ScrollRelative{Horizontal, v * 2}`, sync |
//! | `EV_ABS` `ABS_HAT0Y` value `v` | `ScrollRelative{Vertical, -v}`, sync      |
//! | `EV_KEY` `BTN_A` value 1 / 0   | `ButtonState{Left, true / false}`, sync   |
//! | `EV_KEY` `BTN_B` value 1 / 0   | `ButtonState{Right, true / false}`, sync  |
//! | anything else                  | nothing                                   |
//!
//! Stick division truncates toward zero, so small deflections produce a
//! zero-length move.  That move is still emitted and still closes a frame.
//!
//! Every non-empty sequence ends with exactly one [`PointerAction::Synchronize`]:
//! one physical event becomes one input frame on the virtual pointer.

use crate::action::{MotionAxis, PointerAction, PointerButton, WheelAxis};
use crate::event::{Envelope, EventKind, ABS_HAT0X, ABS_HAT0Y, ABS_X, ABS_Y, BTN_A, BTN_B};

/// Raw stick units per pointer unit.
pub const AXIS_DIVISOR: i32 = 7500;

/// Wheel detents per horizontal d-pad step.
pub const HAT_SCROLL_FACTOR: i32 = 2;

/// Translates one envelope into the ordered pointer actions it causes.
///
/// Returns an empty vector for events with no mapping rule.  This is a
/// defined no-op, not an error.
pub fn translate(envelope: &Envelope) -> Vec<PointerAction> {
    let primary = match envelope.kind() {
        EventKind::AbsoluteAxis => translate_axis(envelope.code(), envelope.value()),
        EventKind::Key => translate_key(envelope.code(), envelope.value()),
        EventKind::Other(_) => None,
    };

    match primary {
        Some(action) => vec![action, PointerAction::Synchronize],
        None => Vec::new(),
    }
}

fn translate_axis(code: u16, value: i32) -> Option<PointerAction> {
    match code {
        ABS_X => Some(PointerAction::MoveRelative {
            axis: MotionAxis::X,
            delta: value / AXIS_DIVISOR,
        }),
        ABS_Y => Some(PointerAction::MoveRelative {
            axis: MotionAxis::Y,
            delta: value / AXIS_DIVISOR,
        }),
        ABS_HAT0X => Some(PointerAction::ScrollRelative {
            axis: WheelAxis::Horizontal,
            delta: value.saturating_mul(HAT_SCROLL_FACTOR),
        }),
        // D-pad "down" is positive but wheel "down" is negative.
        ABS_HAT0Y => Some(PointerAction::ScrollRelative {
            axis: WheelAxis::Vertical,
            delta: value.saturating_neg(),
        }),
        _ => None,
    }
}

fn translate_key(code: u16, value: i32) -> Option<PointerAction> {
    let button = match code {
        BTN_A => PointerButton::Left,
        BTN_B => PointerButton::Right,
        _ => return None,
    };

    // Autorepeat (2) and anything else out of range is dropped.
    let pressed = match value {
        1 => true,
        0 => false,
        _ => return None,
    };

    Some(PointerAction::ButtonState { button, pressed })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
