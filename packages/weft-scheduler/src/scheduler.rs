use crate::Scheduler;
use crate::queue::TaskQueue;
use futures::executor::{LocalPool, LocalSpawner};
use futures::future::LocalBoxFuture;
use futures::task::LocalSpawnExt;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Upper bound on microtask/future rounds inside a single `tick`.
/// A future that keeps re-queueing microtasks forever would otherwise spin.
const MAX_ROUNDS_PER_TICK: usize = 1024;

/// Single-threaded scheduler: a microtask FIFO plus a local futures pool.
///
/// A turn (`tick`) alternates between draining microtasks and polling ready
/// futures until neither side produces more work.
pub struct LocalScheduler {
    microtasks: TaskQueue,
    pool: RefCell<LocalPool>,
    spawner: LocalSpawner,
    in_flight: Rc<Cell<usize>>,
    turns: Cell<u64>,
}

impl Default for LocalScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalScheduler {
    pub fn new() -> Self {
        let pool = LocalPool::new();
        let spawner = pool.spawner();
        Self {
            microtasks: TaskQueue::new(),
            pool: RefCell::new(pool),
            spawner,
            in_flight: Rc::new(Cell::new(0)),
            turns: Cell::new(0),
        }
    }

    /// True when no microtask is queued. Futures parked on an external
    /// wake-up do not count as work.
    pub fn is_idle(&self) -> bool {
        self.microtasks.is_empty()
    }

    /// Number of completed turns.
    pub fn turns(&self) -> u64 {
        self.turns.get()
    }

    fn poll_futures(&self) {
        // A future polled here may itself call `tick`; the pool is already
        // being driven by the outer call in that case.
        if let Ok(mut pool) = self.pool.try_borrow_mut() {
            pool.run_until_stalled();
        }
    }
}

impl Scheduler for LocalScheduler {
    fn schedule_microtask(&self, task: Box<dyn FnOnce()>) {
        self.microtasks.push(task);
    }

    fn spawn_local(&self, future: LocalBoxFuture<'static, ()>) {
        let in_flight = self.in_flight.clone();
        in_flight.set(in_flight.get() + 1);
        let tracked = async move {
            future.await;
            in_flight.set(in_flight.get() - 1);
        };
        if let Err(err) = self.spawner.spawn_local(tracked) {
            self.in_flight.set(self.in_flight.get().saturating_sub(1));
            tracing::warn!("failed to spawn local future: {}", err);
        }
    }

    fn tick(&self) -> bool {
        let mut rounds = 0;
        loop {
            self.microtasks.drain();
            self.poll_futures();
            rounds += 1;
            if self.microtasks.is_empty() {
                break;
            }
            if rounds >= MAX_ROUNDS_PER_TICK {
                tracing::warn!(
                    "tick stopped after {} rounds with {} microtasks still queued",
                    rounds,
                    self.microtasks.len()
                );
                break;
            }
        }
        self.turns.set(self.turns.get() + 1);
        !self.is_idle()
    }

    fn pending_futures(&self) -> usize {
        self.in_flight.get()
    }
}
