//! Payloads exchanged between the dashboard and the embedded timesheet
//! frame. Every message is an object with one key, the configured
//! namespace, so unrelated window messages are ignored.

use crate::error::ReminderError;
use serde::{Deserialize, Serialize};

/// Messages are not origin-restricted.
pub const TARGET_ORIGIN: &str = "*";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Payload {
    State {
        #[serde(rename = "isNoClock")]
        is_no_clock: bool,
        #[serde(rename = "inChildFrame")]
        in_child_frame: bool,
    },
    Register {
        register: bool,
    },
}

pub fn encode(namespace: &str, payload: &Payload) -> Result<serde_json::Value, ReminderError> {
    let mut message = serde_json::Map::new();
    message.insert(namespace.to_string(), serde_json::to_value(payload)?);
    Ok(serde_json::Value::Object(message))
}

/// `None` for messages of another namespace or of an unknown shape.
pub fn decode(namespace: &str, message: &serde_json::Value) -> Option<Payload> {
    let inner = message.get(namespace)?;
    match Payload::deserialize(inner) {
        Ok(payload) => Some(payload),
        Err(err) => {
            tracing::debug!(%err, "ignoring malformed message");
            None
        }
    }
}

/// The window-messaging channel to the other frame.
pub trait MessagePort {
    fn post(&self, message: serde_json::Value, target_origin: &str);
}
