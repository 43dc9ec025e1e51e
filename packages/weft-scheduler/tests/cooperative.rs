use weft_scheduler::{LocalScheduler, Scheduler};
use std::cell::Cell;
use std::rc::Rc;

#[test]
fn test_scheduler_idle_after_tick() {
    let scheduler = LocalScheduler::new();

    // Initially idle
    assert!(scheduler.is_idle());
    assert!(!scheduler.tick());

    scheduler.schedule_microtask(Box::new(|| {}));
    assert!(!scheduler.is_idle());

    // Tick drains the queue, so no more work is pending afterwards.
    assert!(!scheduler.tick());
    assert!(scheduler.is_idle());
    assert_eq!(scheduler.turns(), 2);
}

#[test]
fn test_parked_future_does_not_block_tick() {
    let scheduler = LocalScheduler::new();
    let done = Rc::new(Cell::new(false));
    let (tx, rx) = futures::channel::oneshot::channel::<()>();

    {
        let done = done.clone();
        scheduler.spawn_local(Box::pin(async move {
            let _ = rx.await;
            done.set(true);
        }));
    }

    assert!(!scheduler.tick());
    assert!(!done.get());
    assert_eq!(scheduler.pending_futures(), 1);

    tx.send(()).unwrap();
    scheduler.tick();
    assert!(done.get());
    assert_eq!(scheduler.pending_futures(), 0);
}

#[test]
fn test_thread_current_scheduler_defers() {
    let previous = weft_scheduler::install(Rc::new(LocalScheduler::new()));
    let counter = Rc::new(Cell::new(0));

    {
        let counter = counter.clone();
        weft_scheduler::defer(move || counter.set(counter.get() + 1));
    }
    assert_eq!(counter.get(), 0);

    weft_scheduler::tick();
    assert_eq!(counter.get(), 1);

    weft_scheduler::install(previous);
}
