//! # padmouse-core
//!
//! Shared domain library for padmouse: the pieces of the gamepad-to-pointer
//! translator that have no dependency on the operating system.
//!
//! padmouse reads raw events from one physical gamepad and synthesizes
//! relative-motion, wheel, and button events on a virtual pointer device, so
//! the left stick moves the cursor, the d-pad scrolls, and the A/B buttons
//! click.
//!
//! This crate defines:
//!
//! - **`event`** – The [`Envelope`]: an immutable snapshot of one raw input
//!   event (kind, code, value), plus the Linux input-event-code constants the
//!   mapping rules refer to.
//!
//! - **`action`** – The [`PointerAction`] vocabulary the virtual pointer
//!   understands, and the fixed capability set it must declare.
//!
//! - **`mapping`** – The mapping engine.  [`translate`] turns one envelope
//!   into zero or more pointer actions.  It is pure and deterministic.
//!
//! - **`device`** – Identity of a candidate input device and the fixed
//!   gamepad match used when deciding whether to bind it.

pub mod action;
pub mod device;
pub mod event;
pub mod mapping;

pub use action::{MotionAxis, PointerAction, PointerButton, PointerCapabilities, WheelAxis};
pub use device::{is_supported_gamepad, DeviceInfo, GAMEPAD_NAME};
pub use event::{Envelope, EventKind};
pub use mapping::{translate, AXIS_DIVISOR, HAT_SCROLL_FACTOR};
