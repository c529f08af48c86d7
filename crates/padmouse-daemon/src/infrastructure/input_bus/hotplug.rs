//! Hotplug monitor: turns device scans and removal notices into session
//! `connect`/`disconnect` calls.
//!
//! Every rescan the monitor compares the scanner's device list with the set
//! it has already announced.  Each new device is announced exactly once; the
//! session decides whether to bind, ignore, or reject it.  A device that
//! vanishes from the scan is forgotten, so it is announced again if it comes
//! back.  A removal notice for the bound handle disconnects it and forgets
//! every device, which lets a gamepad that was rejected while another was
//! bound take over on the next scan.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use padmouse_core::DeviceInfo;
use tracing::{debug, info, warn};

use crate::application::session::{ConnectOutcome, DeviceSession, HandleId, SessionError};

/// Lists the candidate devices currently present.
pub trait DeviceScanner: Send {
    fn scan(&mut self) -> Vec<DeviceInfo>;
}

/// Drives a [`DeviceSession`] from a [`DeviceScanner`] and a removal channel.
pub struct HotplugMonitor<S> {
    session: Arc<DeviceSession>,
    scanner: S,
    removals: Receiver<HandleId>,
    rescan_interval: Duration,
    announced: HashSet<DeviceInfo>,
}

impl<S: DeviceScanner> HotplugMonitor<S> {
    pub fn new(
        session: Arc<DeviceSession>,
        scanner: S,
        removals: Receiver<HandleId>,
        rescan_interval: Duration,
    ) -> Self {
        Self {
            session,
            scanner,
            removals,
            rescan_interval,
            announced: HashSet::new(),
        }
    }

    /// Handles queued removal notices, then rescans once.
    ///
    /// Returns `false` once the session has been terminated.
    pub fn poll_once(&mut self) -> bool {
        while let Ok(handle) = self.removals.try_recv() {
            self.handle_removal(handle);
        }
        let present = self.scanner.scan();
        self.reconcile(present)
    }

    /// Polls until `running` is cleared or the session terminates.
    fn run(mut self, running: Arc<AtomicBool>) {
        while running.load(Ordering::Acquire) {
            if !self.poll_once() {
                break;
            }
            match self.removals.recv_timeout(self.rescan_interval) {
                Ok(handle) => self.handle_removal(handle),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => thread::sleep(self.rescan_interval),
            }
        }
        debug!("hotplug monitor stopped");
    }

    fn handle_removal(&mut self, handle: HandleId) {
        if self.session.disconnect(handle) {
            info!("bound gamepad removed");
        }
        self.announced.clear();
    }

    fn reconcile(&mut self, present: Vec<DeviceInfo>) -> bool {
        for device in &present {
            if !self.announced.insert(device.clone()) {
                continue;
            }
            match self.session.connect(device) {
                Ok(ConnectOutcome::Bound(_) | ConnectOutcome::Ignored) => {}
                Ok(ConnectOutcome::AlreadyBound(_)) => {
                    debug!("{device} will be retried after the bound gamepad is removed");
                }
                Err(SessionError::Terminated) => return false,
                Err(e) => warn!("{device}: {e}"),
            }
        }
        self.announced.retain(|device| present.contains(device));
        true
    }
}

impl<S: DeviceScanner + 'static> HotplugMonitor<S> {
    /// Runs the monitor on a dedicated thread.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the thread cannot be spawned.
    pub fn spawn(self) -> std::io::Result<MonitorHandle> {
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);
        let thread = thread::Builder::new()
            .name("padmouse-hotplug".to_string())
            .spawn(move || self.run(flag))?;
        Ok(MonitorHandle { running, thread })
    }
}

/// A monitor running on its own thread.
pub struct MonitorHandle {
    running: Arc<AtomicBool>,
    thread: JoinHandle<()>,
}

impl MonitorHandle {
    /// Clears the running flag and joins the thread.  Returns within one
    /// rescan interval whatever state the session is in.
    pub fn stop(self) {
        self.running.store(false, Ordering::Release);
        if self.thread.join().is_err() {
            warn!("hotplug monitor panicked");
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
