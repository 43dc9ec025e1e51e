use chrono::NaiveDate;
use serde_json::json;
use std::cell::RefCell;
use std::rc::Rc;
use weft_reminder::{
    FixedClock, KeyValueStore, MemoryStore, MessagePort, Payload, ReminderConfig, ReminderState,
    TARGET_ORIGIN,
};

#[derive(Default)]
struct RecordingPort {
    sent: RefCell<Vec<(serde_json::Value, String)>>,
}

impl MessagePort for RecordingPort {
    fn post(&self, message: serde_json::Value, target_origin: &str) {
        self.sent
            .borrow_mut()
            .push((message, target_origin.to_string()));
    }
}

fn wednesday() -> FixedClock {
    FixedClock(NaiveDate::from_ymd_opt(2024, 3, 6).unwrap())
}

#[test]
fn test_dismissal_persists_for_the_week() {
    let config = ReminderConfig::default();
    let store = Rc::new(MemoryStore::new());
    let state = ReminderState::load(&config, store.clone(), &wednesday());
    assert_eq!(state.key(), "noclock-2024-03-04");
    assert!(state.visible());

    state.is_no_clock().set(true);
    assert_eq!(store.get_item("noclock-2024-03-04").as_deref(), Some("1"));

    // A later day of the same week sees the dismissal.
    let sunday = FixedClock(NaiveDate::from_ymd_opt(2024, 3, 10).unwrap());
    let reloaded = ReminderState::load(&config, store.clone(), &sunday);
    assert!(reloaded.is_no_clock().get());
    assert!(!reloaded.visible());

    reloaded.is_no_clock().set(false);
    assert!(store.is_empty());
}

#[test]
fn test_next_week_starts_fresh() {
    let config = ReminderConfig::default();
    let store = Rc::new(MemoryStore::new());
    store.set_item("noclock-2024-03-04", "1");
    let monday = FixedClock(NaiveDate::from_ymd_opt(2024, 3, 11).unwrap());
    let state = ReminderState::load(&config, store, &monday);
    assert!(!state.is_no_clock().get());
}

#[test]
fn test_register_is_answered_with_state() {
    let config = ReminderConfig::default();
    let parent = ReminderState::load(&config, Rc::new(MemoryStore::new()), &wednesday());
    parent.is_no_clock().set(true);

    let child = ReminderState::load(&config, Rc::new(MemoryStore::new()), &wednesday());
    let to_parent = RecordingPort::default();
    child.register(&to_parent).unwrap();
    let (register, origin) = to_parent.sent.borrow()[0].clone();
    assert_eq!(register, json!({"timesheetReminder": {"register": true}}));
    assert_eq!(origin, TARGET_ORIGIN);

    let to_child = RecordingPort::default();
    let received = parent.receive(&register, &to_child).unwrap();
    assert_eq!(received, Some(Payload::Register { register: true }));
    let (answer, _) = to_child.sent.borrow()[0].clone();

    let unused = RecordingPort::default();
    child.receive(&answer, &unused).unwrap();
    assert!(child.is_no_clock().get());
    assert!(unused.sent.borrow().is_empty());
}

#[test]
fn test_connected_port_sees_changes() {
    let config = ReminderConfig::default();
    let state = ReminderState::load(&config, Rc::new(MemoryStore::new()), &wednesday());
    let port = Rc::new(RecordingPort::default());
    state.connect(port.clone());

    state.in_child_frame().set(true);
    state.in_child_frame().set(true);
    state.is_no_clock().set(true);

    let sent: Vec<_> = port.sent.borrow().iter().map(|(m, _)| m.clone()).collect();
    assert_eq!(
        sent,
        vec![
            json!({"timesheetReminder": {"isNoClock": false, "inChildFrame": true}}),
            json!({"timesheetReminder": {"isNoClock": true, "inChildFrame": true}}),
        ]
    );
}

#[test]
fn test_foreign_messages_are_ignored() {
    let config = ReminderConfig::default();
    let state = ReminderState::load(&config, Rc::new(MemoryStore::new()), &wednesday());
    let port = RecordingPort::default();
    let received = state
        .receive(&json!({"somethingElse": {"isNoClock": true, "inChildFrame": true}}), &port)
        .unwrap();
    assert_eq!(received, None);
    assert!(state.visible());
}

#[test]
fn test_logging_init_only_once() {
    weft_reminder::logging::init("debug");
    assert!(!weft_reminder::logging::init("info"));
}
