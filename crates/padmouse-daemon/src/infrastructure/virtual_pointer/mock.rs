//! Mock virtual pointer for unit and integration testing.
//!
//! Records every committed frame instead of writing to uinput.  Clones share
//! the same log, so a test can keep one clone and hand the other to the
//! session.

use std::sync::{Arc, Mutex};

use padmouse_core::{MotionAxis, PointerButton, WheelAxis};

use crate::application::emit_pointer::{PointerError, VirtualPointer};

/// One buffered report inside a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Report {
    Motion(MotionAxis, i32),
    Wheel(WheelAxis, i32),
    Button(PointerButton, bool),
}

#[derive(Debug, Default)]
struct PointerLog {
    pending: Vec<Report>,
    frames: Vec<Vec<Report>>,
    destroyed: bool,
    fail_emits: bool,
}

/// A [`VirtualPointer`] that records frames in memory.
#[derive(Debug, Clone, Default)]
pub struct MockVirtualPointer {
    log: Arc<Mutex<PointerLog>>,
}

impl MockVirtualPointer {
    /// Creates an empty mock pointer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent `synchronize` fail with [`PointerError::Emit`].
    pub fn fail_emits(&self, fail: bool) {
        self.log.lock().expect("lock poisoned").fail_emits = fail;
    }

    /// All frames committed so far, oldest first.
    pub fn frames(&self) -> Vec<Vec<Report>> {
        self.log.lock().expect("lock poisoned").frames.clone()
    }

    /// Reports buffered since the last committed frame.
    pub fn pending(&self) -> Vec<Report> {
        self.log.lock().expect("lock poisoned").pending.clone()
    }

    /// Whether `destroy` has been called.
    pub fn is_destroyed(&self) -> bool {
        self.log.lock().expect("lock poisoned").destroyed
    }

    fn record(&self, report: Report) -> Result<(), PointerError> {
        let mut log = self.log.lock().expect("lock poisoned");
        if log.destroyed {
            return Err(PointerError::Destroyed);
        }
        log.pending.push(report);
        Ok(())
    }
}

impl VirtualPointer for MockVirtualPointer {
    fn report_motion(&mut self, axis: MotionAxis, delta: i32) -> Result<(), PointerError> {
        self.record(Report::Motion(axis, delta))
    }

    fn report_wheel(&mut self, axis: WheelAxis, delta: i32) -> Result<(), PointerError> {
        self.record(Report::Wheel(axis, delta))
    }

    fn report_button(&mut self, button: PointerButton, pressed: bool) -> Result<(), PointerError> {
        self.record(Report::Button(button, pressed))
    }

    fn synchronize(&mut self) -> Result<(), PointerError> {
        let mut log = self.log.lock().expect("lock poisoned");
        if log.destroyed {
            return Err(PointerError::Destroyed);
        }
        if log.fail_emits {
            return Err(PointerError::Emit("injected failure".to_string()));
        }
        if !log.pending.is_empty() {
            let frame = std::mem::take(&mut log.pending);
            log.frames.push(frame);
        }
        Ok(())
    }

    fn destroy(&mut self) -> Result<(), PointerError> {
        let mut log = self.log.lock().expect("lock poisoned");
        log.destroyed = true;
        log.pending.clear();
        Ok(())
    }
}
