//! The thread's current scheduler.
//!
//! Reactive primitives never hold a scheduler themselves; they defer through
//! whatever scheduler is installed for the thread. Tests install a fresh
//! `LocalScheduler` (or rely on the default one) and drive it with [`tick`].

use crate::{LocalScheduler, Scheduler};
use futures::future::{FutureExt, LocalBoxFuture};
use std::cell::RefCell;
use std::future::Future;
use std::rc::Rc;

thread_local! {
    static CURRENT: RefCell<Rc<dyn Scheduler>> = RefCell::new(Rc::new(LocalScheduler::new()));
}

/// Replaces the thread's scheduler, returning the previous one.
pub fn install(scheduler: Rc<dyn Scheduler>) -> Rc<dyn Scheduler> {
    CURRENT.with(|current| std::mem::replace(&mut *current.borrow_mut(), scheduler))
}

pub fn current() -> Rc<dyn Scheduler> {
    CURRENT.with(|current| current.borrow().clone())
}

/// Queue `task` for the next turn. Never runs synchronously.
pub fn defer(task: impl FnOnce() + 'static) {
    current().schedule_microtask(Box::new(task));
}

pub fn spawn_local(future: impl Future<Output = ()> + 'static) {
    let future: LocalBoxFuture<'static, ()> = future.boxed_local();
    current().spawn_local(future);
}

/// Runs one turn of the current scheduler.
pub fn tick() -> bool {
    // Clone out of the thread-local first: tasks may call `defer` while we run.
    let scheduler = current();
    scheduler.tick()
}
