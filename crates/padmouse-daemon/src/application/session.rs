//! Device session: owns the virtual pointer and the dispatch queue for the
//! lifetime of the daemon, and binds at most one physical gamepad at a time.
//!
//! # States
//!
//! ```text
//! start ──▶ Ready ──connect(match)──▶ Bound
//!             ▲                         │
//!             └──────disconnect─────────┘
//! Ready | Bound ──shutdown──▶ Terminated
//! ```
//!
//! `connect` for a device whose name is not an exact match is ignored with
//! no allocation.  A second matching device while one is bound is rejected
//! with [`ConnectOutcome::AlreadyBound`].
//!
//! # Reception
//!
//! The OS input layer is abstracted by [`InputBus`].  When a device is bound
//! the bus receives an [`EventSink`]; whatever context the bus delivers raw
//! events on calls [`EventSink::deliver`], which captures an envelope and
//! submits it without blocking.  Events for a handle that is no longer bound
//! are discarded.
//!
//! # Teardown
//!
//! `shutdown` stops new bindings, releases the physical handle, drains the
//! queue, and only then destroys the virtual pointer.
//!
//! # Locking
//!
//! `connect`, `disconnect` and `shutdown` are serialized by one transition
//! lock, held across the bus calls.  The state itself sits behind a second
//! lock that is only held for reads and writes, so [`DeviceSession::state`]
//! and [`DeviceSession::queue_stats`] never wait on device I/O.

use std::fmt;
use std::num::NonZeroU64;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use padmouse_core::{is_supported_gamepad, DeviceInfo, Envelope, PointerCapabilities};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::application::dispatch::{
    DispatchConfig, DispatchError, DispatchQueue, QueueStatsSnapshot, SubmitError, Submitter,
};
use crate::application::emit_pointer::{PointerError, VirtualPointer};

// ── Handles ───────────────────────────────────────────────────────────────────

/// Identifies one registration of a physical device with the input bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandleId(NonZeroU64);

impl HandleId {
    /// Returns `None` for 0, which is reserved for "nothing bound".
    pub fn new(raw: u64) -> Option<Self> {
        NonZeroU64::new(raw).map(Self)
    }

    /// The raw, non-zero value.
    pub fn get(self) -> u64 {
        self.0.get()
    }
}

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

const NO_HANDLE: u64 = 0;

// ── Input bus ─────────────────────────────────────────────────────────────────

/// Error type for [`InputBus`] operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BusError {
    /// The bus refused to allocate a handle for the device.
    #[error("failed to register {device}: {reason}")]
    Register { device: String, reason: String },
    /// The handle exists but the device could not be opened.
    #[error("failed to open handle {handle}: {reason}")]
    Open { handle: HandleId, reason: String },
    /// The handle is not known to the bus.
    #[error("unknown handle {0}")]
    UnknownHandle(HandleId),
}

/// The OS input-distribution layer as seen by the session.
///
/// Implementations must deliver every raw event of an opened handle to the
/// sink passed to [`InputBus::open_device`], and stop delivering once
/// [`InputBus::close_device`] returns.
#[cfg_attr(test, mockall::automock)]
pub trait InputBus: Send + Sync {
    /// Allocates a handle for `device`.
    fn register_handle(&self, device: &DeviceInfo) -> Result<HandleId, BusError>;

    /// Starts delivering the device's events to `sink`.
    fn open_device(&self, handle: HandleId, sink: EventSink) -> Result<(), BusError>;

    /// Stops event delivery for `handle`.
    fn close_device(&self, handle: HandleId);

    /// Releases the handle.
    fn unregister_handle(&self, handle: HandleId);
}

/// Reception-side entry point handed to the bus for one bound handle.
#[derive(Debug, Clone)]
pub struct EventSink {
    handle: HandleId,
    bound: Arc<AtomicU64>,
    submitter: Submitter,
}

impl EventSink {
    /// The handle this sink was created for.
    pub fn handle(&self) -> HandleId {
        self.handle
    }

    /// Captures one raw event and enqueues it.  Never blocks.
    ///
    /// Returns `true` if the envelope was queued.  Events for a handle that is
    /// no longer bound, or that do not fit in the queue, are discarded.
    pub fn deliver(&self, event_type: u16, code: u16, value: i32) -> bool {
        deliver(&self.bound, &self.submitter, self.handle, event_type, code, value)
    }
}

fn deliver(
    bound: &AtomicU64,
    submitter: &Submitter,
    handle: HandleId,
    event_type: u16,
    code: u16,
    value: i32,
) -> bool {
    if bound.load(Ordering::Acquire) != handle.get() {
        return false;
    }
    match submitter.submit(Envelope::capture(event_type, code, value)) {
        Ok(()) => true,
        Err(SubmitError::QueueFull) => {
            debug!("queue full; dropped event type={event_type} code={code} value={value}");
            false
        }
        Err(SubmitError::Closed) => false,
    }
}

// ── Session ───────────────────────────────────────────────────────────────────

/// Lifecycle state of a [`DeviceSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Virtual pointer and queue exist; no gamepad bound.
    Ready,
    /// One gamepad bound.
    Bound,
    /// Torn down.  Terminal.
    Terminated,
}

/// Result of [`DeviceSession::connect`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectOutcome {
    /// The device is not the supported gamepad; nothing was allocated.
    Ignored,
    /// The device is now bound under this handle.
    Bound(HandleId),
    /// Another gamepad is already bound under this handle; the new one was
    /// rejected.
    AlreadyBound(HandleId),
}

/// Error type for session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The virtual pointer could not be created.
    #[error("virtual pointer startup failed: {0}")]
    PointerStartup(#[source] PointerError),
    /// The dispatch queue could not be created.
    #[error("dispatch queue startup failed: {0}")]
    QueueStartup(#[source] DispatchError),
    /// Handle registration or device open failed; nothing stays bound.
    #[error("device registration failed: {0}")]
    Registration(#[from] BusError),
    /// The session has already been shut down.
    #[error("session has been terminated")]
    Terminated,
    /// The dispatch worker failed while draining.
    #[error("dispatch queue drain failed: {0}")]
    Drain(#[source] DispatchError),
    /// The virtual pointer could not be destroyed.
    #[error("virtual pointer teardown failed: {0}")]
    PointerTeardown(#[source] PointerError),
}

struct Binding {
    handle: HandleId,
    device: DeviceInfo,
}

struct Inner {
    state: SessionState,
    binding: Option<Binding>,
    queue: Option<DispatchQueue>,
}

/// The device session.  Shared as `Arc<DeviceSession>` between the hotplug
/// monitor and the shutdown path.
pub struct DeviceSession {
    bus: Arc<dyn InputBus>,
    transition: Mutex<()>,
    inner: Mutex<Inner>,
    bound: Arc<AtomicU64>,
    submitter: Submitter,
}

impl DeviceSession {
    /// Creates the virtual pointer through `create_pointer`, starts the
    /// dispatch queue, and returns a session in [`SessionState::Ready`].
    ///
    /// The queue is told the capabilities the pointer was created with,
    /// overriding `config.capabilities`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::PointerStartup`] or
    /// [`SessionError::QueueStartup`].  Nothing is registered with the bus in
    /// either case.
    pub fn start<F>(
        bus: Arc<dyn InputBus>,
        mut config: DispatchConfig,
        create_pointer: F,
    ) -> Result<Self, SessionError>
    where
        F: FnOnce(&PointerCapabilities) -> Result<Box<dyn VirtualPointer>, PointerError>,
    {
        let capabilities = PointerCapabilities::standard();
        let pointer = create_pointer(&capabilities).map_err(SessionError::PointerStartup)?;
        config.capabilities = capabilities;
        let queue = DispatchQueue::spawn(pointer, config).map_err(SessionError::QueueStartup)?;
        let submitter = queue.submitter();

        info!("session ready; waiting for '{}'", padmouse_core::GAMEPAD_NAME);

        Ok(Self {
            bus,
            transition: Mutex::new(()),
            inner: Mutex::new(Inner {
                state: SessionState::Ready,
                binding: None,
                queue: Some(queue),
            }),
            bound: Arc::new(AtomicU64::new(NO_HANDLE)),
            submitter,
        })
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.lock_inner().state
    }

    /// The bound handle, if any.
    pub fn bound_handle(&self) -> Option<HandleId> {
        self.lock_inner().binding.as_ref().map(|b| b.handle)
    }

    /// The bound device, if any.
    pub fn bound_device(&self) -> Option<DeviceInfo> {
        self.lock_inner().binding.as_ref().map(|b| b.device.clone())
    }

    /// Queue counters, or `None` after shutdown.
    pub fn queue_stats(&self) -> Option<QueueStatsSnapshot> {
        self.lock_inner().queue.as_ref().map(DispatchQueue::stats)
    }

    /// Handles the arrival of `device`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Registration`] when the bus fails (any
    /// allocated handle has been released again) and
    /// [`SessionError::Terminated`] after shutdown.
    pub fn connect(&self, device: &DeviceInfo) -> Result<ConnectOutcome, SessionError> {
        if !is_supported_gamepad(device) {
            debug!("ignoring {device}");
            return Ok(ConnectOutcome::Ignored);
        }

        let _transition = self.lock_transition();
        {
            let inner = self.lock_inner();
            if inner.state == SessionState::Terminated {
                return Err(SessionError::Terminated);
            }
            if let Some(existing) = &inner.binding {
                warn!(
                    "rejecting {device}: {} already bound as {}",
                    existing.device, existing.handle
                );
                return Ok(ConnectOutcome::AlreadyBound(existing.handle));
            }
        }

        let handle = self.bus.register_handle(device).map_err(|e| {
            error!("{e}");
            SessionError::Registration(e)
        })?;

        // Published before open so the first events are not discarded.
        self.bound.store(handle.get(), Ordering::Release);
        let sink = EventSink {
            handle,
            bound: Arc::clone(&self.bound),
            submitter: self.submitter.clone(),
        };

        if let Err(e) = self.bus.open_device(handle, sink) {
            self.bound.store(NO_HANDLE, Ordering::Release);
            self.bus.unregister_handle(handle);
            error!("{e}; handle {handle} released");
            return Err(SessionError::Registration(e));
        }

        let mut inner = self.lock_inner();
        inner.binding = Some(Binding {
            handle,
            device: device.clone(),
        });
        inner.state = SessionState::Bound;
        info!("bound {device} as {handle}");
        Ok(ConnectOutcome::Bound(handle))
    }

    /// Handles the removal of the device registered as `handle`.
    ///
    /// Returns `true` if it was the bound device.  Unknown handles are
    /// ignored.
    pub fn disconnect(&self, handle: HandleId) -> bool {
        let _transition = self.lock_transition();
        let binding = {
            let mut inner = self.lock_inner();
            match inner.binding.take() {
                Some(binding) if binding.handle == handle => {
                    if inner.state == SessionState::Bound {
                        inner.state = SessionState::Ready;
                    }
                    binding
                }
                other => {
                    inner.binding = other;
                    debug!("disconnect for unbound handle {handle} ignored");
                    return false;
                }
            }
        };

        self.release(&binding);
        info!("{} disconnected; waiting for a gamepad", binding.device);
        true
    }

    /// Reception entry point for buses that deliver by handle instead of
    /// through an [`EventSink`].  See [`EventSink::deliver`].
    pub fn on_event(&self, handle: HandleId, event_type: u16, code: u16, value: i32) -> bool {
        deliver(&self.bound, &self.submitter, handle, event_type, code, value)
    }

    /// Tears the session down and returns the final queue counters.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Terminated`] if already shut down,
    /// [`SessionError::Drain`] if the worker died, or
    /// [`SessionError::PointerTeardown`] if the device refused to go away.
    pub fn shutdown(&self) -> Result<QueueStatsSnapshot, SessionError> {
        let _transition = self.lock_transition();
        let (binding, queue) = {
            let mut inner = self.lock_inner();
            if inner.state == SessionState::Terminated {
                return Err(SessionError::Terminated);
            }
            inner.state = SessionState::Terminated;
            let queue = inner.queue.take().ok_or(SessionError::Terminated)?;
            (inner.binding.take(), queue)
        };
        if let Some(binding) = binding {
            self.release(&binding);
        }

        let (mut pointer, stats) = queue.drain().map_err(SessionError::Drain)?;
        pointer.destroy().map_err(SessionError::PointerTeardown)?;
        info!("session terminated ({stats})");
        Ok(stats)
    }

    fn release(&self, binding: &Binding) {
        self.bound.store(NO_HANDLE, Ordering::Release);
        self.bus.close_device(binding.handle);
        self.bus.unregister_handle(binding.handle);
    }

    fn lock_transition(&self) -> MutexGuard<'_, ()> {
        self.transition.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for DeviceSession {
    fn drop(&mut self) {
        if self.state() != SessionState::Terminated {
            if let Err(e) = self.shutdown() {
                warn!("session dropped without clean shutdown: {e}");
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::emit_pointer::PointerError;
    use mockall::predicate::eq;
    use padmouse_core::event::{ABS_X, BTN_A, EV_ABS, EV_KEY};
    use padmouse_core::{MotionAxis, PointerButton, WheelAxis, GAMEPAD_NAME};

    // ── Helpers ───────────────────────────────────────────────────────────────

    /// Appends every report and lifecycle call to a shared log.
    struct LogPointer {
        log: Arc<Mutex<Vec<String>>>,
    }

    impl VirtualPointer for LogPointer {
        fn report_motion(&mut self, axis: MotionAxis, delta: i32) -> Result<(), PointerError> {
            self.log.lock().unwrap().push(format!("motion {axis:?} {delta}"));
            Ok(())
        }

        fn report_wheel(&mut self, axis: WheelAxis, delta: i32) -> Result<(), PointerError> {
            self.log.lock().unwrap().push(format!("wheel {axis:?} {delta}"));
            Ok(())
        }

        fn report_button(
            &mut self,
            button: PointerButton,
            pressed: bool,
        ) -> Result<(), PointerError> {
            self.log.lock().unwrap().push(format!("button {button:?} {pressed}"));
            Ok(())
        }

        fn synchronize(&mut self) -> Result<(), PointerError> {
            self.log.lock().unwrap().push("sync".to_string());
            Ok(())
        }

        fn destroy(&mut self) -> Result<(), PointerError> {
            self.log.lock().unwrap().push("destroy".to_string());
            Ok(())
        }
    }

    fn gamepad() -> DeviceInfo {
        DeviceInfo::with_path(GAMEPAD_NAME, "/dev/input/event7")
    }

    fn handle(raw: u64) -> HandleId {
        HandleId::new(raw).unwrap()
    }

    fn start_session(bus: MockInputBus, log: &Arc<Mutex<Vec<String>>>) -> DeviceSession {
        let log = Arc::clone(log);
        DeviceSession::start(Arc::new(bus), DispatchConfig::default(), move |_| {
            Ok(Box::new(LogPointer { log }) as Box<dyn VirtualPointer>)
        })
        .expect("session start")
    }

    /// A bus that registers handle 1, keeps the sink, and logs teardown calls.
    fn binding_bus(
        log: &Arc<Mutex<Vec<String>>>,
        sinks: &Arc<Mutex<Vec<EventSink>>>,
    ) -> MockInputBus {
        let mut bus = MockInputBus::new();
        bus.expect_register_handle().returning(|_| Ok(handle(1)));
        let sinks = Arc::clone(sinks);
        bus.expect_open_device().returning(move |_, sink| {
            sinks.lock().unwrap().push(sink);
            Ok(())
        });
        let close_log = Arc::clone(log);
        bus.expect_close_device()
            .returning(move |h| close_log.lock().unwrap().push(format!("close {h}")));
        let unregister_log = Arc::clone(log);
        bus.expect_unregister_handle()
            .returning(move |h| unregister_log.lock().unwrap().push(format!("unregister {h}")));
        bus
    }

    // ── Startup ───────────────────────────────────────────────────────────────

    #[test]
    fn test_start_reports_ready_with_nothing_bound() {
        // Arrange
        let log = Arc::new(Mutex::new(Vec::new()));

        // Act
        let session = start_session(MockInputBus::new(), &log);

        // Assert
        assert_eq!(session.state(), SessionState::Ready);
        assert_eq!(session.bound_handle(), None);
        assert_eq!(session.queue_stats(), Some(QueueStatsSnapshot::default()));
    }

    #[test]
    fn test_start_fails_when_pointer_cannot_be_created() {
        // Arrange: a bus with no expectations panics on any call
        let bus = Arc::new(MockInputBus::new());

        // Act
        let result = DeviceSession::start(bus, DispatchConfig::default(), |_| {
            Err(PointerError::Create("no uinput".to_string()))
        });

        // Assert
        assert!(matches!(result, Err(SessionError::PointerStartup(_))));
    }

    #[test]
    fn test_start_passes_standard_capabilities_to_pointer_factory() {
        // Arrange
        let log = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::new(Mutex::new(None));
        let seen_in_factory = Arc::clone(&seen);

        // Act
        let _session = DeviceSession::start(
            Arc::new(MockInputBus::new()),
            DispatchConfig::default(),
            move |caps| {
                *seen_in_factory.lock().unwrap() = Some(caps.clone());
                Ok(Box::new(LogPointer { log }) as Box<dyn VirtualPointer>)
            },
        )
        .unwrap();

        // Assert
        assert_eq!(*seen.lock().unwrap(), Some(PointerCapabilities::standard()));
    }

    #[test]
    fn test_start_hands_declared_capabilities_to_queue() {
        // Arrange: the caller's config asks for a reduced button set
        let log = Arc::new(Mutex::new(Vec::new()));
        let sinks = Arc::new(Mutex::new(Vec::new()));
        let config = DispatchConfig {
            capabilities: PointerCapabilities { buttons: vec![], ..PointerCapabilities::standard() },
            ..DispatchConfig::default()
        };
        let pointer_log = Arc::clone(&log);
        let session = DeviceSession::start(Arc::new(binding_bus(&log, &sinks)), config, move |_| {
            Ok(Box::new(LogPointer { log: pointer_log }) as Box<dyn VirtualPointer>)
        })
        .unwrap();
        session.connect(&gamepad()).unwrap();

        // Act
        assert!(session.on_event(handle(1), EV_KEY, BTN_A, 1));
        let stats = session.shutdown().unwrap();

        // Assert: the standard set wins, so the click is applied
        assert!(log.lock().unwrap().iter().any(|l| l == "button Left true"));
        assert_eq!(stats.emit_failures, 0);
    }

    // ── Connect ───────────────────────────────────────────────────────────────

    #[test]
    fn test_connect_ignores_non_matching_name_without_allocating() {
        // Arrange: register_handle has no expectation, so a call would panic
        let log = Arc::new(Mutex::new(Vec::new()));
        let session = start_session(MockInputBus::new(), &log);

        // Act
        let outcome = session.connect(&DeviceInfo::named("Microsoft X-Box One S pad "));

        // Assert
        assert_eq!(outcome.unwrap(), ConnectOutcome::Ignored);
        assert_eq!(session.state(), SessionState::Ready);
    }

    #[test]
    fn test_connect_matching_device_binds_it() {
        // Arrange
        let log = Arc::new(Mutex::new(Vec::new()));
        let sinks = Arc::new(Mutex::new(Vec::new()));
        let mut bus = MockInputBus::new();
        bus.expect_register_handle()
            .withf(|device| device.name == GAMEPAD_NAME)
            .times(1)
            .returning(|_| Ok(handle(7)));
        let sinks_in_open = Arc::clone(&sinks);
        bus.expect_open_device()
            .withf(|h, sink| *h == handle(7) && sink.handle() == handle(7))
            .times(1)
            .returning(move |_, sink| {
                sinks_in_open.lock().unwrap().push(sink);
                Ok(())
            });
        bus.expect_close_device().return_const(());
        bus.expect_unregister_handle().return_const(());
        let session = start_session(bus, &log);

        // Act
        let outcome = session.connect(&gamepad()).unwrap();

        // Assert
        assert_eq!(outcome, ConnectOutcome::Bound(handle(7)));
        assert_eq!(session.state(), SessionState::Bound);
        assert_eq!(session.bound_device(), Some(gamepad()));
        assert_eq!(sinks.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_connect_rejects_second_gamepad_while_bound() {
        // Arrange
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut bus = MockInputBus::new();
        bus.expect_register_handle().times(1).returning(|_| Ok(handle(1)));
        bus.expect_open_device().times(1).returning(|_, _| Ok(()));
        bus.expect_close_device().return_const(());
        bus.expect_unregister_handle().return_const(());
        let session = start_session(bus, &log);
        session.connect(&gamepad()).unwrap();

        // Act
        let second = session.connect(&DeviceInfo::with_path(GAMEPAD_NAME, "/dev/input/event9"));

        // Assert
        assert_eq!(second.unwrap(), ConnectOutcome::AlreadyBound(handle(1)));
        assert_eq!(session.bound_device(), Some(gamepad()));
    }

    #[test]
    fn test_connect_register_failure_leaves_session_ready() {
        // Arrange
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut bus = MockInputBus::new();
        bus.expect_register_handle().returning(|device| {
            Err(BusError::Register { device: device.to_string(), reason: "EBUSY".to_string() })
        });
        let session = start_session(bus, &log);

        // Act
        let result = session.connect(&gamepad());

        // Assert
        assert!(matches!(result, Err(SessionError::Registration(BusError::Register { .. }))));
        assert_eq!(session.state(), SessionState::Ready);
    }

    #[test]
    fn test_connect_open_failure_rolls_back_registration() {
        // Arrange
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut bus = MockInputBus::new();
        bus.expect_register_handle().returning(|_| Ok(handle(3)));
        bus.expect_open_device().returning(|h, _| {
            Err(BusError::Open { handle: h, reason: "EACCES".to_string() })
        });
        bus.expect_unregister_handle().with(eq(handle(3))).times(1).return_const(());
        let session = start_session(bus, &log);

        // Act
        let result = session.connect(&gamepad());

        // Assert
        assert!(matches!(result, Err(SessionError::Registration(BusError::Open { .. }))));
        assert_eq!(session.state(), SessionState::Ready);
        assert_eq!(session.bound_handle(), None);
        assert!(!session.on_event(handle(3), EV_KEY, BTN_A, 1));
    }

    #[test]
    fn test_state_is_readable_while_device_open_is_in_progress() {
        // Arrange: open_device parks until the test releases it
        let log = Arc::new(Mutex::new(Vec::new()));
        let (entered_tx, entered_rx) = std::sync::mpsc::channel();
        let (gate_tx, gate_rx) = std::sync::mpsc::channel::<()>();
        let gate_rx = Mutex::new(gate_rx);
        let mut bus = MockInputBus::new();
        bus.expect_register_handle().returning(|_| Ok(handle(1)));
        bus.expect_open_device().returning(move |_, _| {
            let _ = entered_tx.send(());
            let _ = gate_rx.lock().unwrap().recv_timeout(std::time::Duration::from_secs(5));
            Ok(())
        });
        bus.expect_close_device().return_const(());
        bus.expect_unregister_handle().return_const(());
        let session = Arc::new(start_session(bus, &log));
        let connecting = Arc::clone(&session);
        let connector = std::thread::spawn(move || connecting.connect(&gamepad()));
        entered_rx.recv_timeout(std::time::Duration::from_secs(5)).expect("open entered");

        // Act
        let during_open = session.state();
        let stats_during_open = session.queue_stats();
        gate_tx.send(()).unwrap();
        let outcome = connector.join().unwrap().unwrap();

        // Assert
        assert_eq!(during_open, SessionState::Ready);
        assert!(stats_during_open.is_some());
        assert_eq!(outcome, ConnectOutcome::Bound(handle(1)));
        assert_eq!(session.state(), SessionState::Bound);
    }

    // ── Reception ─────────────────────────────────────────────────────────────

    #[test]
    fn test_events_from_bound_sink_reach_pointer() {
        // Arrange
        let log = Arc::new(Mutex::new(Vec::new()));
        let sinks = Arc::new(Mutex::new(Vec::new()));
        let session = start_session(binding_bus(&log, &sinks), &log);
        session.connect(&gamepad()).unwrap();
        let sink = sinks.lock().unwrap()[0].clone();

        // Act
        assert!(sink.deliver(EV_ABS, ABS_X, 22500));
        assert!(sink.deliver(EV_KEY, BTN_A, 1));
        session.shutdown().unwrap();

        // Assert: bus teardown entries may interleave with the drained frames
        let frames: Vec<String> = log
            .lock()
            .unwrap()
            .iter()
            .filter(|l| !l.starts_with("close") && !l.starts_with("unregister"))
            .cloned()
            .collect();
        assert_eq!(frames, vec!["motion X 3", "sync", "button Left true", "sync", "destroy"]);
    }

    #[test]
    fn test_stale_sink_is_discarded_after_disconnect() {
        // Arrange
        let log = Arc::new(Mutex::new(Vec::new()));
        let sinks = Arc::new(Mutex::new(Vec::new()));
        let session = start_session(binding_bus(&log, &sinks), &log);
        session.connect(&gamepad()).unwrap();
        let sink = sinks.lock().unwrap()[0].clone();

        // Act
        assert!(session.disconnect(handle(1)));
        let accepted = sink.deliver(EV_KEY, BTN_A, 1);
        let stats = session.shutdown().unwrap();

        // Assert
        assert!(!accepted);
        assert_eq!(stats.submitted, 0);
    }

    // ── Disconnect ────────────────────────────────────────────────────────────

    #[test]
    fn test_disconnect_closes_before_unregistering_and_returns_to_ready() {
        // Arrange
        let log = Arc::new(Mutex::new(Vec::new()));
        let sinks = Arc::new(Mutex::new(Vec::new()));
        let session = start_session(binding_bus(&log, &sinks), &log);
        session.connect(&gamepad()).unwrap();

        // Act
        let released = session.disconnect(handle(1));

        // Assert
        assert!(released);
        assert_eq!(session.state(), SessionState::Ready);
        assert_eq!(*log.lock().unwrap(), vec!["close #1", "unregister #1"]);
    }

    #[test]
    fn test_disconnect_of_unknown_handle_is_ignored() {
        // Arrange: close/unregister have no expectations
        let log = Arc::new(Mutex::new(Vec::new()));
        let session = start_session(MockInputBus::new(), &log);

        // Act / Assert
        assert!(!session.disconnect(handle(42)));
        assert_eq!(session.state(), SessionState::Ready);
    }

    #[test]
    fn test_gamepad_can_be_rebound_after_disconnect() {
        // Arrange
        let log = Arc::new(Mutex::new(Vec::new()));
        let sinks = Arc::new(Mutex::new(Vec::new()));
        let session = start_session(binding_bus(&log, &sinks), &log);
        session.connect(&gamepad()).unwrap();
        session.disconnect(handle(1));

        // Act
        let outcome = session.connect(&gamepad()).unwrap();

        // Assert
        assert_eq!(outcome, ConnectOutcome::Bound(handle(1)));
        assert_eq!(session.state(), SessionState::Bound);
    }

    // ── Shutdown ──────────────────────────────────────────────────────────────

    #[test]
    fn test_shutdown_releases_handle_then_drains_then_destroys() {
        // Arrange
        let log = Arc::new(Mutex::new(Vec::new()));
        let sinks = Arc::new(Mutex::new(Vec::new()));
        let session = start_session(binding_bus(&log, &sinks), &log);
        session.connect(&gamepad()).unwrap();
        assert!(session.on_event(handle(1), EV_KEY, BTN_A, 0));

        // Act
        let stats = session.shutdown().unwrap();

        // Assert: the queued frame may land before or after the release, but
        // always before destroy, and destroy is always last
        let log = log.lock().unwrap();
        assert_eq!(log.last().map(String::as_str), Some("destroy"));
        let close = log.iter().position(|l| l == "close #1").unwrap();
        let unregister = log.iter().position(|l| l == "unregister #1").unwrap();
        let sync = log.iter().position(|l| l == "sync").unwrap();
        assert!(close < unregister);
        assert!(sync < log.len() - 1);
        assert_eq!(stats.processed, 1);
        assert_eq!(session.state(), SessionState::Terminated);
    }

    #[test]
    fn test_shutdown_twice_reports_terminated() {
        // Arrange
        let log = Arc::new(Mutex::new(Vec::new()));
        let session = start_session(MockInputBus::new(), &log);
        session.shutdown().unwrap();

        // Act
        let second = session.shutdown();

        // Assert
        assert!(matches!(second, Err(SessionError::Terminated)));
        assert_eq!(*log.lock().unwrap(), vec!["destroy"]);
    }

    #[test]
    fn test_connect_after_shutdown_is_refused() {
        // Arrange
        let log = Arc::new(Mutex::new(Vec::new()));
        let session = start_session(MockInputBus::new(), &log);
        session.shutdown().unwrap();

        // Act
        let result = session.connect(&gamepad());

        // Assert
        assert!(matches!(result, Err(SessionError::Terminated)));
        assert_eq!(session.queue_stats(), None);
    }

    #[test]
    fn test_drop_without_shutdown_still_destroys_pointer() {
        // Arrange
        let log = Arc::new(Mutex::new(Vec::new()));
        let session = start_session(MockInputBus::new(), &log);

        // Act
        drop(session);

        // Assert
        assert_eq!(*log.lock().unwrap(), vec!["destroy"]);
    }

    #[test]
    fn test_handle_zero_is_not_a_valid_handle() {
        assert_eq!(HandleId::new(0), None);
        assert_eq!(handle(5).get(), 5);
        assert_eq!(handle(5).to_string(), "#5");
    }
}
