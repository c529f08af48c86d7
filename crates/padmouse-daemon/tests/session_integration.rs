//! Integration tests for the device session lifecycle.
//!
//! Exercises `DeviceSession` and `HotplugMonitor` against the in-memory bus
//! and pointer, checking which bus calls each transition makes.

use std::sync::Arc;
use std::time::Duration;

use padmouse_core::event::{BTN_A, EV_KEY};
use padmouse_core::{DeviceInfo, GAMEPAD_NAME};
use padmouse_daemon::application::dispatch::DispatchConfig;
use padmouse_daemon::application::emit_pointer::{PointerError, VirtualPointer};
use padmouse_daemon::application::session::{
    ConnectOutcome, DeviceSession, HandleId, SessionError, SessionState,
};
use padmouse_daemon::infrastructure::input_bus::hotplug::{DeviceScanner, HotplugMonitor};
use padmouse_daemon::infrastructure::input_bus::mock::{BusCall, RecordingInputBus};
use padmouse_daemon::infrastructure::virtual_pointer::mock::MockVirtualPointer;

// ── Helpers ───────────────────────────────────────────────────────────────────

fn start(bus: &Arc<RecordingInputBus>, pointer: &MockVirtualPointer) -> DeviceSession {
    let boxed = pointer.clone();
    DeviceSession::start(bus.clone(), DispatchConfig::default(), move |_| {
        Ok(Box::new(boxed) as Box<dyn VirtualPointer>)
    })
    .expect("session start")
}

fn gamepad(node: &str) -> DeviceInfo {
    DeviceInfo::with_path(GAMEPAD_NAME, format!("/dev/input/{node}"))
}

fn handle(raw: u64) -> HandleId {
    HandleId::new(raw).unwrap()
}

// ── Startup ───────────────────────────────────────────────────────────────────

#[test]
fn test_pointer_creation_failure_aborts_start_without_bus_calls() {
    // Arrange
    let bus = Arc::new(RecordingInputBus::new());

    // Act
    let result = DeviceSession::start(bus.clone(), DispatchConfig::default(), |_| {
        Err(PointerError::Create("uinput unavailable".to_string()))
    });

    // Assert
    assert!(matches!(result, Err(SessionError::PointerStartup(_))));
    assert!(bus.calls().is_empty());
}

// ── Binding ───────────────────────────────────────────────────────────────────

#[test]
fn test_non_matching_devices_make_no_bus_calls() {
    // Arrange
    let bus = Arc::new(RecordingInputBus::new());
    let session = start(&bus, &MockVirtualPointer::new());

    // Act
    for name in ["Xbox Wireless Controller", "microsoft x-box one s pad", "Logitech USB Receiver"] {
        let outcome = session.connect(&DeviceInfo::named(name)).unwrap();
        assert_eq!(outcome, ConnectOutcome::Ignored);
    }

    // Assert
    assert!(bus.calls().is_empty());
    assert_eq!(session.state(), SessionState::Ready);
}

#[test]
fn test_open_failure_releases_registration() {
    // Arrange
    let bus = Arc::new(RecordingInputBus::new());
    let session = start(&bus, &MockVirtualPointer::new());
    bus.fail_next_open();

    // Act
    let result = session.connect(&gamepad("event7"));

    // Assert
    assert!(matches!(result, Err(SessionError::Registration(_))));
    assert_eq!(
        bus.calls(),
        vec![
            BusCall::Register(GAMEPAD_NAME.to_string()),
            BusCall::Open(handle(1)),
            BusCall::Unregister(handle(1)),
        ]
    );
    assert_eq!(session.state(), SessionState::Ready);
}

#[test]
fn test_register_failure_leaves_nothing_to_release() {
    // Arrange
    let bus = Arc::new(RecordingInputBus::new());
    let session = start(&bus, &MockVirtualPointer::new());
    bus.fail_next_register();

    // Act
    let result = session.connect(&gamepad("event7"));

    // Assert
    assert!(matches!(result, Err(SessionError::Registration(_))));
    assert_eq!(bus.calls(), vec![BusCall::Register(GAMEPAD_NAME.to_string())]);
}

#[test]
fn test_second_gamepad_is_rejected_while_first_is_bound() {
    // Arrange
    let bus = Arc::new(RecordingInputBus::new());
    let session = start(&bus, &MockVirtualPointer::new());
    session.connect(&gamepad("event7")).unwrap();

    // Act
    let outcome = session.connect(&gamepad("event9")).unwrap();

    // Assert
    assert_eq!(outcome, ConnectOutcome::AlreadyBound(handle(1)));
    assert_eq!(bus.open_handles(), vec![handle(1)]);
}

#[test]
fn test_concurrent_connects_bind_exactly_one_gamepad() {
    // Arrange
    let bus = Arc::new(RecordingInputBus::new());
    let session = Arc::new(start(&bus, &MockVirtualPointer::new()));

    // Act
    let outcomes: Vec<ConnectOutcome> = (0..8)
        .map(|i| {
            let session = Arc::clone(&session);
            std::thread::spawn(move || session.connect(&gamepad(&format!("event{i}"))).unwrap())
        })
        .collect::<Vec<_>>()
        .into_iter()
        .map(|t| t.join().unwrap())
        .collect();

    // Assert
    let bound = outcomes.iter().filter(|o| matches!(o, ConnectOutcome::Bound(_))).count();
    assert_eq!(bound, 1);
    assert_eq!(bus.open_handles().len(), 1);
}

// ── Disconnect ────────────────────────────────────────────────────────────────

#[test]
fn test_events_after_disconnect_are_discarded() {
    // Arrange
    let bus = Arc::new(RecordingInputBus::new());
    let pointer = MockVirtualPointer::new();
    let session = start(&bus, &pointer);
    session.connect(&gamepad("event7")).unwrap();

    // Act
    assert!(session.disconnect(handle(1)));
    let accepted = session.on_event(handle(1), EV_KEY, BTN_A, 1);
    session.shutdown().unwrap();

    // Assert
    assert!(!accepted);
    assert!(pointer.frames().is_empty());
    assert_eq!(
        bus.calls(),
        vec![
            BusCall::Register(GAMEPAD_NAME.to_string()),
            BusCall::Open(handle(1)),
            BusCall::Close(handle(1)),
            BusCall::Unregister(handle(1)),
        ]
    );
}

#[test]
fn test_shutdown_from_ready_destroys_pointer_without_bus_calls() {
    // Arrange
    let bus = Arc::new(RecordingInputBus::new());
    let pointer = MockVirtualPointer::new();
    let session = start(&bus, &pointer);

    // Act
    session.shutdown().unwrap();

    // Assert
    assert!(pointer.is_destroyed());
    assert!(bus.calls().is_empty());
    assert_eq!(session.state(), SessionState::Terminated);
}

// ── Hotplug ───────────────────────────────────────────────────────────────────

struct StaticScanner(Arc<std::sync::Mutex<Vec<DeviceInfo>>>);

impl DeviceScanner for StaticScanner {
    fn scan(&mut self) -> Vec<DeviceInfo> {
        self.0.lock().unwrap().clone()
    }
}

#[test]
fn test_unplug_and_replug_cycle_through_monitor() {
    // Arrange
    let (bus, removals) = RecordingInputBus::with_removals();
    let bus = Arc::new(bus);
    let pointer = MockVirtualPointer::new();
    let session = Arc::new(start(&bus, &pointer));
    let present = Arc::new(std::sync::Mutex::new(vec![gamepad("event7")]));
    let mut monitor = HotplugMonitor::new(
        Arc::clone(&session),
        StaticScanner(Arc::clone(&present)),
        removals,
        Duration::from_millis(10),
    );

    // Act: plug in
    monitor.poll_once();
    assert!(bus.inject(handle(1), EV_KEY, BTN_A, 1));

    // Act: unplug
    present.lock().unwrap().clear();
    bus.unplug(handle(1));
    monitor.poll_once();
    assert_eq!(session.state(), SessionState::Ready);

    // Act: plug back in on a new node
    *present.lock().unwrap() = vec![gamepad("event11")];
    monitor.poll_once();

    // Assert
    assert_eq!(session.bound_handle(), Some(handle(2)));
    assert!(bus.inject(handle(2), EV_KEY, BTN_A, 0));
    session.shutdown().unwrap();
    assert_eq!(pointer.frames().len(), 2);
}
