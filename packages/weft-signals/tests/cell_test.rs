use futures::StreamExt;
use std::cell::RefCell;
use std::rc::Rc;
use weft_signals::{ObservableCell, SubscriberId, Watch};

fn recorder<T: Clone + 'static>() -> (Rc<RefCell<Vec<T>>>, impl Fn(&T) + 'static) {
    let log = Rc::new(RefCell::new(Vec::new()));
    let sink = log.clone();
    (log, move |value: &T| sink.borrow_mut().push(value.clone()))
}

#[test]
fn test_same_value_notifies_once() {
    let cell = ObservableCell::new(0);
    let (log, record) = recorder();
    cell.subscribe(record);

    cell.set(7);
    cell.set(7);

    assert_eq!(*log.borrow(), vec![7]);
}

#[test]
fn test_excluded_subscriber_is_skipped() {
    let cell = ObservableCell::new(String::new());
    let (a_log, a) = recorder();
    let (b_log, b) = recorder();
    let a_id: SubscriberId = cell.subscribe(a);
    cell.subscribe(b);

    cell.set_excluding("typed".to_string(), &[a_id]);

    assert!(a_log.borrow().is_empty());
    assert_eq!(*b_log.borrow(), vec!["typed".to_string()]);
}

#[test]
fn test_bind_calls_immediately() {
    let cell = ObservableCell::new("a");
    let (log, record) = recorder();
    cell.bind(record);
    cell.set("b");
    assert_eq!(*log.borrow(), vec!["a", "b"]);
}

#[test]
fn test_subscribers_run_in_subscription_order() {
    let cell = ObservableCell::new(0);
    let order = Rc::new(RefCell::new(Vec::new()));
    for tag in ["first", "second", "third"] {
        let order = order.clone();
        cell.subscribe(move |_| order.borrow_mut().push(tag));
    }
    cell.set(1);
    assert_eq!(*order.borrow(), vec!["first", "second", "third"]);
}

#[test]
fn test_pipe_recomputes_on_next_turn() {
    let count = ObservableCell::new(2);
    let doubled = count.pipe(|n| n * 2);
    assert_eq!(doubled.get(), 4);

    count.set(5);
    // Never synchronous inside the write.
    assert_eq!(doubled.get(), 4);

    weft_scheduler::tick();
    assert_eq!(doubled.get(), 10);
}

#[test]
fn test_derive_from_mixed_sources() {
    let name = ObservableCell::new("Ada".to_string());
    let visits = ObservableCell::new(1u32);
    let greeting = ObservableCell::derive(&[&name as &dyn Watch, &visits], {
        let name = name.downgrade();
        let visits = visits.downgrade();
        move || {
            let name = name.upgrade().map(|c| c.get()).unwrap_or_default();
            let visits = visits.upgrade().map(|c| c.get()).unwrap_or_default();
            format!("{name} x{visits}")
        }
    });
    assert_eq!(greeting.get(), "Ada x1");

    name.set("Grace".to_string());
    visits.set(3);
    weft_scheduler::tick();

    assert_eq!(greeting.get(), "Grace x3");
}

#[test]
fn test_next_change_resolves_with_written_value() {
    let cell = ObservableCell::new(0);
    let next = cell.next_change();
    cell.set(42);
    assert_eq!(futures::executor::block_on(next), Some(42));
}

#[test]
fn test_next_change_ends_when_cell_dropped() {
    let cell = ObservableCell::new(0);
    let next = cell.next_change();
    drop(cell);
    assert_eq!(futures::executor::block_on(next), None);
}

#[test]
fn test_changes_stream_yields_each_value() {
    let cell = ObservableCell::new(0);
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    let mut changes = cell.changes();
    weft_scheduler::spawn_local(async move {
        while let Some(value) = changes.next().await {
            sink.borrow_mut().push(value);
        }
    });

    weft_scheduler::tick();
    cell.set(1);
    weft_scheduler::tick();
    cell.set(2);
    weft_scheduler::tick();

    assert_eq!(*seen.borrow(), vec![1, 2]);
}
