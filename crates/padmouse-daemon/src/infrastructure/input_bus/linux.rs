//! evdev-backed input bus and device scanner.
//!
//! Each opened handle gets a reader thread that owns the `Device`, polls it
//! in non-blocking mode, and forwards key, relative, absolute, and misc
//! events to the session.  `SYN_*` events are not forwarded; the virtual
//! pointer produces its own frames.
//!
//! # Safety
//!
//! `unsafe` is used only for the `fcntl` calls that switch the event node to
//! non-blocking mode.

#![cfg(target_os = "linux")]

use std::collections::HashMap;
use std::io;
use std::os::unix::io::AsRawFd;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use evdev::Device;
use padmouse_core::event::SUBSCRIBED_EVENT_TYPES;
use padmouse_core::DeviceInfo;
use tracing::{debug, info, warn};

use super::hotplug::DeviceScanner;
use crate::application::session::{BusError, EventSink, HandleId, InputBus};

/// Sleep between polls when the node has nothing to read.
const POLL_INTERVAL: Duration = Duration::from_millis(5);

struct Reader {
    stop: Arc<AtomicBool>,
    thread: JoinHandle<()>,
}

struct Slot {
    path: PathBuf,
    reader: Option<Reader>,
}

/// [`InputBus`] over `/dev/input/event*` nodes.
pub struct EvdevBus {
    grab: bool,
    last_handle: AtomicU64,
    slots: Mutex<HashMap<HandleId, Slot>>,
    removals: Sender<HandleId>,
}

impl EvdevBus {
    /// Creates the bus.  Handles of devices that disappear are sent on the
    /// returned receiver.
    ///
    /// With `grab` set, opened devices are grabbed exclusively so their
    /// events reach only padmouse.
    pub fn new(grab: bool) -> (Self, Receiver<HandleId>) {
        let (removals, rx) = mpsc::channel();
        let bus = Self {
            grab,
            last_handle: AtomicU64::new(0),
            slots: Mutex::new(HashMap::new()),
            removals,
        };
        (bus, rx)
    }

    fn lock_slots(&self) -> MutexGuard<'_, HashMap<HandleId, Slot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl InputBus for EvdevBus {
    fn register_handle(&self, device: &DeviceInfo) -> Result<HandleId, BusError> {
        let path = device.path.clone().ok_or_else(|| BusError::Register {
            device: device.to_string(),
            reason: "no event node".to_string(),
        })?;
        let raw = self.last_handle.fetch_add(1, Ordering::Relaxed) + 1;
        let handle = HandleId::new(raw).ok_or_else(|| BusError::Register {
            device: device.to_string(),
            reason: "handle space exhausted".to_string(),
        })?;
        self.lock_slots().insert(handle, Slot { path, reader: None });
        Ok(handle)
    }

    fn open_device(&self, handle: HandleId, sink: EventSink) -> Result<(), BusError> {
        let mut slots = self.lock_slots();
        let slot = slots.get_mut(&handle).ok_or(BusError::UnknownHandle(handle))?;
        let open_error = |e: io::Error| BusError::Open {
            handle,
            reason: e.to_string(),
        };

        let mut device = Device::open(&slot.path).map_err(open_error)?;
        set_nonblocking(&device).map_err(open_error)?;
        if self.grab {
            device.grab().map_err(open_error)?;
        }

        let stop = Arc::new(AtomicBool::new(false));
        let reader_stop = Arc::clone(&stop);
        let removals = self.removals.clone();
        let grabbed = self.grab;
        let thread = thread::Builder::new()
            .name(format!("padmouse-reader-{}", handle.get()))
            .spawn(move || read_events(device, grabbed, sink, reader_stop, removals))
            .map_err(open_error)?;

        info!("reading {} as {handle}", slot.path.display());
        slot.reader = Some(Reader { stop, thread });
        Ok(())
    }

    fn close_device(&self, handle: HandleId) {
        let reader = self
            .lock_slots()
            .get_mut(&handle)
            .and_then(|slot| slot.reader.take());
        if let Some(reader) = reader {
            reader.stop.store(true, Ordering::Release);
            if reader.thread.join().is_err() {
                warn!("reader for {handle} panicked");
            }
        }
    }

    fn unregister_handle(&self, handle: HandleId) {
        self.lock_slots().remove(&handle);
    }
}

fn read_events(
    mut device: Device,
    grabbed: bool,
    sink: EventSink,
    stop: Arc<AtomicBool>,
    removals: Sender<HandleId>,
) {
    while !stop.load(Ordering::Acquire) {
        match device.fetch_events() {
            Ok(events) => {
                let mut had_events = false;
                for event in events {
                    had_events = true;
                    let event_type = event.event_type().0;
                    if SUBSCRIBED_EVENT_TYPES.contains(&event_type) {
                        sink.deliver(event_type, event.code(), event.value());
                    }
                }
                if !had_events {
                    thread::sleep(POLL_INTERVAL);
                }
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => thread::sleep(POLL_INTERVAL),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => {
                if e.raw_os_error() == Some(libc::ENODEV) {
                    info!("device behind {} went away", sink.handle());
                } else {
                    warn!("read error on {}: {e}", sink.handle());
                }
                let _ = removals.send(sink.handle());
                return;
            }
        }
    }

    if grabbed {
        let _ = device.ungrab();
    }
    debug!("reader for {} stopped", sink.handle());
}

fn set_nonblocking(device: &Device) -> io::Result<()> {
    let fd = device.as_raw_fd();

    // SAFETY: `fd` is owned by `device`, which outlives both calls.
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    if flags < 0 {
        return Err(io::Error::last_os_error());
    }
    // SAFETY: as above; only O_NONBLOCK is added to the existing flags.
    let rc = unsafe { libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) };
    if rc < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// [`DeviceScanner`] over `/dev/input/event*`.
#[derive(Debug, Default)]
pub struct EvdevScanner;

impl DeviceScanner for EvdevScanner {
    fn scan(&mut self) -> Vec<DeviceInfo> {
        evdev::enumerate()
            .map(|(path, device)| {
                let name = device.name().unwrap_or_default().to_string();
                DeviceInfo::with_path(name, path)
            })
            .collect()
    }
}
