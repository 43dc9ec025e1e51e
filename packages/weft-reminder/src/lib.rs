//! # Weft Reminder
//!
//! The timesheet reminder shown on the dashboard until the week's hours are
//! logged. It keeps one flag per week in storage and keeps the dashboard and
//! an embedded timesheet frame in agreement over window messages.

pub mod config;
pub mod error;
pub mod logging;
pub mod message;
pub mod state;
pub mod store;
pub mod week;

pub use config::ReminderConfig;
pub use error::ReminderError;
pub use message::{MessagePort, Payload, TARGET_ORIGIN, decode, encode};
pub use state::ReminderState;
pub use store::{KeyValueStore, MemoryStore};
pub use week::{Clock, FixedClock, SystemClock, week_key, week_start};
