//! uinput-backed virtual pointer.
//!
//! The device is registered with exactly the capabilities in
//! [`PointerCapabilities`]: `REL_X`, `REL_Y`, `REL_WHEEL`, `REL_HWHEEL`,
//! `BTN_LEFT`, `BTN_RIGHT`.  `report_*` calls only append to a pending
//! buffer.  `synchronize` writes the buffer in one `emit` call; evdev appends
//! the `SYN_REPORT` that closes the frame.

#![cfg(target_os = "linux")]

use evdev::uinput::{VirtualDevice, VirtualDeviceBuilder};
use evdev::{AttributeSet, EventType, InputEvent, Key, RelativeAxisType};
use padmouse_core::{MotionAxis, PointerButton, PointerCapabilities, WheelAxis};
use tracing::{debug, info};

use crate::application::emit_pointer::{PointerError, VirtualPointer};

/// A virtual relative pointer registered through `/dev/uinput`.
pub struct UinputPointer {
    name: String,
    device: Option<VirtualDevice>,
    pending: Vec<InputEvent>,
}

impl UinputPointer {
    /// Registers a new virtual pointer called `name` with `capabilities`.
    ///
    /// # Errors
    ///
    /// Returns [`PointerError::Create`] if `/dev/uinput` cannot be opened or
    /// the kernel rejects the device.
    pub fn create(name: &str, capabilities: &PointerCapabilities) -> Result<Self, PointerError> {
        let mut keys = AttributeSet::<Key>::new();
        for code in capabilities.button_codes() {
            keys.insert(Key::new(code));
        }
        let mut axes = AttributeSet::<RelativeAxisType>::new();
        for code in capabilities.relative_codes() {
            axes.insert(RelativeAxisType(code));
        }

        let device = VirtualDeviceBuilder::new()
            .map_err(|e| PointerError::Create(format!("open /dev/uinput: {e}")))?
            .name(name)
            .with_keys(&keys)
            .map_err(|e| PointerError::Create(format!("button capabilities: {e}")))?
            .with_relative_axes(&axes)
            .map_err(|e| PointerError::Create(format!("relative axis capabilities: {e}")))?
            .build()
            .map_err(|e| PointerError::Create(format!("register device: {e}")))?;

        info!("virtual pointer '{name}' registered");
        Ok(Self {
            name: name.to_string(),
            device: Some(device),
            pending: Vec::with_capacity(4),
        })
    }

    fn push(&mut self, event_type: EventType, code: u16, value: i32) -> Result<(), PointerError> {
        if self.device.is_none() {
            return Err(PointerError::Destroyed);
        }
        self.pending.push(InputEvent::new(event_type, code, value));
        Ok(())
    }
}

impl VirtualPointer for UinputPointer {
    fn report_motion(&mut self, axis: MotionAxis, delta: i32) -> Result<(), PointerError> {
        self.push(EventType::RELATIVE, axis.code(), delta)
    }

    fn report_wheel(&mut self, axis: WheelAxis, delta: i32) -> Result<(), PointerError> {
        self.push(EventType::RELATIVE, axis.code(), delta)
    }

    fn report_button(&mut self, button: PointerButton, pressed: bool) -> Result<(), PointerError> {
        self.push(EventType::KEY, button.code(), i32::from(pressed))
    }

    fn synchronize(&mut self) -> Result<(), PointerError> {
        let device = self.device.as_mut().ok_or(PointerError::Destroyed)?;
        if self.pending.is_empty() {
            return Ok(());
        }
        device
            .emit(&self.pending)
            .map_err(|e| PointerError::Emit(e.to_string()))?;
        self.pending.clear();
        Ok(())
    }

    fn destroy(&mut self) -> Result<(), PointerError> {
        // Closing the uinput fd unregisters the device.
        if self.device.take().is_some() {
            self.pending.clear();
            debug!("virtual pointer '{}' destroyed", self.name);
        }
        Ok(())
    }
}
