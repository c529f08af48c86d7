//! In-memory input bus for testing.
//!
//! Allocates handles from 1, records every call, and keeps the sink of each
//! opened handle so tests can inject raw events as if they came from the
//! kernel.

use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Mutex;

use padmouse_core::DeviceInfo;

use crate::application::session::{BusError, EventSink, HandleId, InputBus};

/// One recorded call on the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusCall {
    Register(String),
    Open(HandleId),
    Close(HandleId),
    Unregister(HandleId),
}

#[derive(Default)]
struct BusState {
    last_handle: u64,
    calls: Vec<BusCall>,
    sinks: HashMap<HandleId, EventSink>,
    fail_register: bool,
    fail_open: bool,
}

/// An [`InputBus`] that lives entirely in memory.
#[derive(Default)]
pub struct RecordingInputBus {
    state: Mutex<BusState>,
    removals: Option<Sender<HandleId>>,
}

impl RecordingInputBus {
    /// Creates a bus with no removal channel.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a bus whose [`unplug`](Self::unplug) notices arrive on the
    /// returned receiver, like the Linux bus's reader threads.
    pub fn with_removals() -> (Self, Receiver<HandleId>) {
        let (tx, rx) = mpsc::channel();
        let bus = Self {
            state: Mutex::new(BusState::default()),
            removals: Some(tx),
        };
        (bus, rx)
    }

    /// Makes the next `register_handle` call fail.
    pub fn fail_next_register(&self) {
        self.lock().fail_register = true;
    }

    /// Makes the next `open_device` call fail.
    pub fn fail_next_open(&self) {
        self.lock().fail_open = true;
    }

    /// Every call made so far, in order.
    pub fn calls(&self) -> Vec<BusCall> {
        self.lock().calls.clone()
    }

    /// Handles that are currently open.
    pub fn open_handles(&self) -> Vec<HandleId> {
        let mut handles: Vec<_> = self.lock().sinks.keys().copied().collect();
        handles.sort();
        handles
    }

    /// Delivers a raw event on `handle`.  Returns `false` if the handle is not
    /// open or the session discarded the event.
    pub fn inject(&self, handle: HandleId, event_type: u16, code: u16, value: i32) -> bool {
        let sink = self.lock().sinks.get(&handle).cloned();
        sink.is_some_and(|sink| sink.deliver(event_type, code, value))
    }

    /// Simulates the device behind `handle` disappearing.  Delivery stops
    /// immediately; the removal notice is sent if a channel exists.
    pub fn unplug(&self, handle: HandleId) {
        self.lock().sinks.remove(&handle);
        if let Some(removals) = &self.removals {
            let _ = removals.send(handle);
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BusState> {
        self.state.lock().expect("lock poisoned")
    }
}

impl InputBus for RecordingInputBus {
    fn register_handle(&self, device: &DeviceInfo) -> Result<HandleId, BusError> {
        let mut state = self.lock();
        state.calls.push(BusCall::Register(device.name.clone()));
        if std::mem::take(&mut state.fail_register) {
            return Err(BusError::Register {
                device: device.to_string(),
                reason: "injected failure".to_string(),
            });
        }
        state.last_handle += 1;
        HandleId::new(state.last_handle).ok_or_else(|| BusError::Register {
            device: device.to_string(),
            reason: "handle space exhausted".to_string(),
        })
    }

    fn open_device(&self, handle: HandleId, sink: EventSink) -> Result<(), BusError> {
        let mut state = self.lock();
        state.calls.push(BusCall::Open(handle));
        if std::mem::take(&mut state.fail_open) {
            return Err(BusError::Open {
                handle,
                reason: "injected failure".to_string(),
            });
        }
        state.sinks.insert(handle, sink);
        Ok(())
    }

    fn close_device(&self, handle: HandleId) {
        let mut state = self.lock();
        state.calls.push(BusCall::Close(handle));
        state.sinks.remove(&handle);
    }

    fn unregister_handle(&self, handle: HandleId) {
        self.lock().calls.push(BusCall::Unregister(handle));
    }
}
