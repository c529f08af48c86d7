//! Raw input-event envelopes and the Linux input-event codes padmouse uses.
//!
//! # Why an envelope?
//!
//! The OS input layer hands us `(type, code, value)` triples from a context
//! that must return quickly.  The storage behind that triple may be reused as
//! soon as the callback returns, so the reception path copies the three
//! integers into an [`Envelope`] *by value* and hands ownership of it to the
//! dispatch queue.  Nothing ever refers back to the kernel event it was copied from.
//!
//! # Event codes
//!
//! The numeric constants below are the stable values from the Linux
//! `input-event-codes.h` header.  They are duplicated here so that this crate
//! stays free of any OS bindings; the infrastructure layer converts them to
//! the typed codes of whichever backend it drives.

// ── Event types ───────────────────────────────────────────────────────────────

/// Synchronization event type (`EV_SYN`).
pub const EV_SYN: u16 = 0x00;
/// Key and button event type (`EV_KEY`).
pub const EV_KEY: u16 = 0x01;
/// Relative-axis event type (`EV_REL`).
pub const EV_REL: u16 = 0x02;
/// Absolute-axis event type (`EV_ABS`).
pub const EV_ABS: u16 = 0x03;
/// Miscellaneous event type (`EV_MSC`).
pub const EV_MSC: u16 = 0x04;

// ── Absolute axes (gamepad side) ─────────────────────────────────────────────

/// Left stick, horizontal position.
pub const ABS_X: u16 = 0x00;
/// Left stick, vertical position.
pub const ABS_Y: u16 = 0x01;
/// D-pad, horizontal (-1 left, 0 centre, 1 right).
pub const ABS_HAT0X: u16 = 0x10;
/// D-pad, vertical (-1 up, 0 centre, 1 down).
pub const ABS_HAT0Y: u16 = 0x11;

// ── Buttons ───────────────────────────────────────────────────────────────────

/// Left mouse button.
pub const BTN_LEFT: u16 = 0x110;
/// Right mouse button.
pub const BTN_RIGHT: u16 = 0x111;
/// Gamepad primary action button ("A", also `BTN_SOUTH`).
pub const BTN_A: u16 = 0x130;
/// Gamepad secondary action button ("B", also `BTN_EAST`).
pub const BTN_B: u16 = 0x131;

// ── Relative axes (pointer side) ──────────────────────────────────────────────

/// Horizontal pointer motion.
pub const REL_X: u16 = 0x00;
/// Vertical pointer motion.
pub const REL_Y: u16 = 0x01;
/// Horizontal wheel.
pub const REL_HWHEEL: u16 = 0x06;
/// Vertical wheel.
pub const REL_WHEEL: u16 = 0x08;

/// The event types a gamepad binding asks the OS input layer to deliver.
pub const SUBSCRIBED_EVENT_TYPES: [u16; 4] = [EV_KEY, EV_REL, EV_ABS, EV_MSC];

/// Coarse classification of a raw event, as far as the mapping rules care.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// `EV_ABS`: stick or d-pad position.
    AbsoluteAxis,
    /// `EV_KEY`: button press, release, or autorepeat.
    Key,
    /// Any other event type, kept as its raw value for diagnostics.
    Other(u16),
}

impl EventKind {
    /// Classifies a raw `type` field.
    pub fn from_raw(event_type: u16) -> Self {
        match event_type {
            EV_ABS => EventKind::AbsoluteAxis,
            EV_KEY => EventKind::Key,
            other => EventKind::Other(other),
        }
    }
}

/// An immutable snapshot of one raw input event.
///
/// Fields are private; an envelope can only be built whole and read back, so
/// nothing downstream can alter what was captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Envelope {
    kind: EventKind,
    code: u16,
    value: i32,
}

impl Envelope {
    /// Creates an envelope from an already classified kind.
    pub fn new(kind: EventKind, code: u16, value: i32) -> Self {
        Self { kind, code, value }
    }

    /// Captures a raw `(type, code, value)` triple as delivered by the OS.
    pub fn capture(event_type: u16, code: u16, value: i32) -> Self {
        Self::new(EventKind::from_raw(event_type), code, value)
    }

    /// The classified event type.
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// Axis or button identifier.
    pub fn code(&self) -> u16 {
        self.code
    }

    /// Signed magnitude (axes) or 0/1/2 state (keys).
    pub fn value(&self) -> i32 {
        self.value
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
