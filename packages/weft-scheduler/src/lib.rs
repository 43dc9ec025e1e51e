pub mod current;
pub mod queue;
pub mod scheduler;

use futures::future::LocalBoxFuture;

/// The core Scheduler trait that hosts implement.
/// Everything in Weft that must not run synchronously inside the call that
/// caused it (derived recomputation, list notifications, exit animations)
/// goes through this seam.
pub trait Scheduler {
    /// Schedule a microtask. Runs on the next turn, in FIFO order.
    fn schedule_microtask(&self, task: Box<dyn FnOnce()>);

    /// Spawn a local (non-`Send`) future. It is polled during turns until it completes.
    fn spawn_local(&self, future: LocalBoxFuture<'static, ()>);

    /// Run one turn: drain microtasks (including ones queued while draining)
    /// and poll every future that became ready.
    /// Returns `true` if work is still queued afterwards.
    fn tick(&self) -> bool;

    /// Number of spawned futures that have not completed yet.
    fn pending_futures(&self) -> usize;
}

pub use current::{current, defer, install, spawn_local, tick};
pub use queue::TaskQueue;
pub use scheduler::LocalScheduler;
