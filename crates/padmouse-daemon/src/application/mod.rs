//! Application layer use cases for the padmouse daemon.
//!
//! This layer sits between the domain rules in `padmouse_core` and the
//! OS-facing adapters in `infrastructure`.  It depends only on the
//! [`emit_pointer::VirtualPointer`] and [`session::InputBus`] traits, so every
//! use case here runs unchanged against the in-memory mocks.
//!
//! # Sub-modules
//!
//! - **`emit_pointer`** – The virtual pointer abstraction and the step that
//!   applies translated actions to it.
//!
//! - **`dispatch`** – The deferred dispatch queue.  Reception submits
//!   envelopes without blocking; one worker thread maps and emits them in
//!   order.  This runs on every gamepad event.
//!
//! - **`session`** – The device session state machine: binds at most one
//!   gamepad, routes its events into the queue, and tears everything down in
//!   a fixed order.

pub mod dispatch;
pub mod emit_pointer;
pub mod session;
