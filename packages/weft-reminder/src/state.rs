use crate::config::ReminderConfig;
use crate::error::ReminderError;
use crate::message::{self, MessagePort, Payload, TARGET_ORIGIN};
use crate::store::KeyValueStore;
use crate::week::{Clock, week_key};
use std::rc::Rc;
use weft_signals::{ObservableCell, SubscriberId, WeakCell};

/// Marker written under the week key while the reminder is dismissed.
const DISMISSED: &str = "1";

/// Reactive state of the timesheet reminder for the current week.
///
/// `is_no_clock` is persisted: setting it writes the week key, clearing it
/// removes the key. `in_child_frame` only lives for the page.
pub struct ReminderState {
    namespace: String,
    key: String,
    is_no_clock: ObservableCell<bool>,
    in_child_frame: ObservableCell<bool>,
}

impl ReminderState {
    pub fn load<S>(config: &ReminderConfig, store: Rc<S>, clock: &dyn Clock) -> Self
    where
        S: KeyValueStore + 'static,
    {
        let key = week_key(&config.app_prefix, clock.today());
        let stored = store.get_item(&key).is_some();
        tracing::debug!(%key, dismissed = stored, "loaded reminder state");

        let is_no_clock = ObservableCell::new(stored);
        let persist_key = key.clone();
        is_no_clock.subscribe(move |&dismissed| {
            if dismissed {
                store.set_item(&persist_key, DISMISSED);
            } else {
                store.remove_item(&persist_key);
            }
        });

        Self {
            namespace: config.message_namespace.clone(),
            key,
            is_no_clock,
            in_child_frame: ObservableCell::new(false),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn is_no_clock(&self) -> &ObservableCell<bool> {
        &self.is_no_clock
    }

    pub fn in_child_frame(&self) -> &ObservableCell<bool> {
        &self.in_child_frame
    }

    /// Whether the reminder should be shown at all.
    pub fn visible(&self) -> bool {
        !self.is_no_clock.get() && !self.in_child_frame.get()
    }

    pub fn payload(&self) -> Payload {
        Payload::State {
            is_no_clock: self.is_no_clock.get(),
            in_child_frame: self.in_child_frame.get(),
        }
    }

    /// Applies a state payload; registrations change nothing here.
    pub fn apply(&self, payload: &Payload) -> bool {
        match *payload {
            Payload::State {
                is_no_clock,
                in_child_frame,
            } => {
                self.is_no_clock.set(is_no_clock);
                self.in_child_frame.set(in_child_frame);
                true
            }
            Payload::Register { .. } => false,
        }
    }

    /// Handles an incoming window message. A registration from the other
    /// frame is answered on `reply` with the current state.
    pub fn receive(
        &self,
        message: &serde_json::Value,
        reply: &dyn MessagePort,
    ) -> Result<Option<Payload>, ReminderError> {
        let Some(payload) = message::decode(&self.namespace, message) else {
            return Ok(None);
        };
        match payload {
            Payload::State { .. } => {
                self.apply(&payload);
            }
            Payload::Register { register: true } => {
                reply.post(message::encode(&self.namespace, &self.payload())?, TARGET_ORIGIN);
            }
            Payload::Register { register: false } => {}
        }
        Ok(Some(payload))
    }

    /// Announces this frame to its parent.
    pub fn register(&self, port: &dyn MessagePort) -> Result<(), ReminderError> {
        let message = message::encode(&self.namespace, &Payload::Register { register: true })?;
        port.post(message, TARGET_ORIGIN);
        Ok(())
    }

    /// Posts the state to `port` whenever either cell changes.
    pub fn connect(&self, port: Rc<dyn MessagePort>) -> [SubscriberId; 2] {
        let publish = Rc::new(Publisher {
            namespace: self.namespace.clone(),
            is_no_clock: self.is_no_clock.downgrade(),
            in_child_frame: self.in_child_frame.downgrade(),
            port,
        });
        let first = publish.clone();
        [
            self.is_no_clock.subscribe(move |_| first.publish()),
            self.in_child_frame.subscribe(move |_| publish.publish()),
        ]
    }
}

struct Publisher {
    namespace: String,
    is_no_clock: WeakCell<bool>,
    in_child_frame: WeakCell<bool>,
    port: Rc<dyn MessagePort>,
}

impl Publisher {
    fn publish(&self) {
        let (Some(is_no_clock), Some(in_child_frame)) =
            (self.is_no_clock.upgrade(), self.in_child_frame.upgrade())
        else {
            return;
        };
        let payload = Payload::State {
            is_no_clock: is_no_clock.get(),
            in_child_frame: in_child_frame.get(),
        };
        match message::encode(&self.namespace, &payload) {
            Ok(message) => self.port.post(message, TARGET_ORIGIN),
            Err(err) => tracing::warn!(%err, "could not encode reminder state"),
        }
    }
}
