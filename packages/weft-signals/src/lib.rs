//! Fine-grained reactive state for the Weft engine.
//!
//! * [`ObservableCell`] holds one value and pushes every change to its
//!   subscribers.
//! * [`ObservableList`] reports every mutation as a single splice edit and
//!   offers derived views (`map`, `filter`, `slice`, `concat`) that follow
//!   their source incrementally.
//! * [`deep`] turns plain JSON-like data into nested reactive values whose
//!   inner changes bubble up to their containers.
//!
//! Derived state is recomputed on the thread's current
//! [`weft_scheduler`] turn, never synchronously inside the write.

pub mod cell;
pub mod deep;
pub mod error;
pub mod list;
pub mod subscriber;

pub use cell::{IndexHandle, ObservableCell, WeakCell};
pub use deep::{Adopt, ChangeSink, Parent, Record, Value, deep};
pub use error::ListError;
pub use list::{ListEdit, ObservableList, WeakList};
pub use subscriber::{SubscriberId, Watch};
