use proptest::prelude::*;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use weft_signals::{ListError, ObservableCell, ObservableList, Watch};

fn settle() {
    weft_scheduler::tick();
}

fn assert_handles_track(list: &ObservableList<i32>) {
    let entries = list.entries();
    assert_eq!(entries.len(), list.len());
    for (position, (_, handle)) in entries.iter().enumerate() {
        assert_eq!(handle.get(), position as isize);
    }
}

#[test]
fn test_handles_shift_and_detach() {
    let list = ObservableList::new(vec![10, 20, 30, 40]);
    let twenty = list.handle(1).unwrap();
    let forty = list.handle(3).unwrap();

    list.splice(0, 2, [1, 2, 3]).unwrap();

    assert_eq!(twenty.get(), -1);
    assert_eq!(forty.get(), 4);
    assert_handles_track(&list);
}

#[test]
fn test_subscribers_get_deferred_edit() {
    let list = ObservableList::new(vec!['a', 'b']);
    let edits = Rc::new(RefCell::new(Vec::new()));
    let sink = edits.clone();
    list.subscribe(move |edit| {
        sink.borrow_mut()
            .push((edit.start, edit.delete_count, edit.inserted.clone()))
    });

    list.push('c').unwrap();
    list.shift().unwrap();
    assert!(edits.borrow().is_empty());

    settle();
    assert_eq!(*edits.borrow(), vec![(2, 0, vec!['c']), (0, 1, vec![])]);
}

#[test]
fn test_round_trip_restores_content() {
    let list = ObservableList::new(vec![1, 2]);
    list.splice(0, 0, [7, 8, 9]).unwrap();
    let removed = list.splice(0, 3, []).unwrap();

    assert_eq!(removed, vec![7, 8, 9]);
    assert_eq!(list.to_vec(), vec![1, 2]);
    assert_handles_track(&list);
}

#[test]
fn test_map_follows_positional_splice() {
    let source = ObservableList::new(vec![1, 2, 3]);
    let mapped = source.map(|x, _, _| x * 10);
    assert_eq!(mapped.to_vec(), vec![10, 20, 30]);

    source.splice(1, 1, [9]).unwrap();
    settle();

    assert_eq!(mapped.to_vec(), vec![10, 90, 30]);
}

#[test]
fn test_map_receives_index_handle() {
    let source = ObservableList::new(vec!["a", "b"]);
    let labelled = source.map(|item, index, _| format!("{}:{}", index.get(), item));
    source.unshift(["z"]).unwrap();
    settle();
    assert_eq!(labelled.to_vec(), vec!["0:z", "0:a", "1:b"]);
}

#[test]
fn test_derived_lists_are_read_only() {
    let source = ObservableList::new(vec![1]);
    let mapped = source.map(|x, _, _| *x);
    assert!(mapped.is_read_only());
    assert_eq!(mapped.push(2), Err(ListError::ReadOnly));
    assert_eq!(mapped.sort(), Err(ListError::ReadOnly));
}

#[test]
fn test_filter_only_evaluates_inserted_items() {
    let calls = Rc::new(Cell::new(0));
    let counter = calls.clone();
    let source = ObservableList::new(vec![1, 2, 3, 4, 5]);
    let evens = source.filter(
        move |x, _| {
            counter.set(counter.get() + 1);
            x % 2 == 0
        },
        &[],
    );
    assert_eq!(evens.to_vec(), vec![2, 4]);
    assert_eq!(calls.get(), 5);

    source.splice(5, 0, [6]).unwrap();
    settle();

    assert_eq!(evens.to_vec(), vec![2, 4, 6]);
    assert_eq!(calls.get(), 6);
}

#[test]
fn test_filter_removal_and_replacement() {
    let source = ObservableList::new(vec![1, 2, 3, 4, 5, 6]);
    let evens = source.filter(|x, _| x % 2 == 0, &[]);

    source.splice(1, 3, [8, 9]).unwrap();
    settle();
    assert_eq!(source.to_vec(), vec![1, 8, 9, 5, 6]);
    assert_eq!(evens.to_vec(), vec![8, 6]);

    source.splice(0, 1, [10]).unwrap();
    settle();
    assert_eq!(evens.to_vec(), vec![10, 8, 6]);
}

#[test]
fn test_filter_recomputes_on_dependency() {
    let threshold = ObservableCell::new(3);
    let source = ObservableList::new(vec![1, 5, 2, 7]);
    let limit = threshold.downgrade();
    let above = source.filter(
        move |x, _| limit.upgrade().is_some_and(|t| *x > t.get()),
        &[&threshold as &dyn Watch],
    );
    assert_eq!(above.to_vec(), vec![5, 7]);

    threshold.set(1);
    settle();
    assert_eq!(above.to_vec(), vec![5, 2, 7]);

    threshold.set(6);
    settle();
    assert_eq!(above.to_vec(), vec![7]);
}

#[test]
fn test_filter_dependency_change_with_queued_edits() {
    let divisor = ObservableCell::new(2);
    let source = ObservableList::new(vec![2, 3]);
    let by = divisor.downgrade();
    let multiples = source.filter(
        move |x, _| by.upgrade().is_some_and(|d| x % d.get() == 0),
        &[&divisor as &dyn Watch],
    );

    // Same length before and after: remove one, push one.
    divisor.set(3);
    source.remove(0).unwrap();
    source.push(6).unwrap();
    while weft_scheduler::tick() {}

    assert_eq!(source.to_vec(), vec![3, 6]);
    assert_eq!(multiples.to_vec(), vec![3, 6]);

    divisor.set(2);
    source.push(9).unwrap();
    source.remove(0).unwrap();
    while weft_scheduler::tick() {}
    assert_eq!(source.to_vec(), vec![6, 9]);
    assert_eq!(multiples.to_vec(), vec![6]);
}

#[test]
fn test_slice_default_end_drops_last_item() {
    let source = ObservableList::new(vec![1, 2, 3, 4]);
    let head = source.slice(0, None);
    assert_eq!(head.to_vec(), vec![1, 2, 3]);

    let middle = source.slice(1, Some(3));
    assert_eq!(middle.to_vec(), vec![2, 3]);

    // Outside the window: ignored.
    source.splice(3, 1, [40]).unwrap();
    settle();
    assert_eq!(middle.to_vec(), vec![2, 3]);

    // Inside the window, delete clipped to the window.
    source.splice(2, 5, [30]).unwrap();
    settle();
    assert_eq!(middle.to_vec(), vec![2, 30]);
}

#[test]
fn test_concat_offsets_by_tally() {
    let left = ObservableList::new(vec![1, 2]);
    let right = ObservableList::new(vec![10]);
    let both = left.concat(&[right.clone()]);
    assert_eq!(both.to_vec(), vec![1, 2, 10]);

    right.push(11).unwrap();
    left.push(3).unwrap();
    right.splice(0, 1, [9]).unwrap();
    settle();

    assert_eq!(both.to_vec(), vec![1, 2, 3, 9, 11]);
}

#[test]
fn test_index_of_returns_live_handle() {
    let list = ObservableList::new(vec!["x", "y", "z"]);
    let z = list.index_of(&"z");
    let missing = list.index_of(&"w");
    assert_eq!(z.get(), 2);
    assert_eq!(missing.get(), -1);

    list.shift().unwrap();
    list.push("w").unwrap();

    assert_eq!(z.get(), 1);
    // A miss never discovers a later match.
    assert_eq!(missing.get(), -1);
    assert_eq!(list.last_index_of(&"w").get(), 2);
    assert_eq!(list.find_index(|s| s.starts_with('y')).get(), 0);
}

#[test]
fn test_aggregates_recompute_after_edit() {
    let list = ObservableList::new(vec![1, 2, 3]);
    let joined = list.join("-");
    let all_positive = list.every(|x| *x > 0);
    let has_ten = list.some(|x| *x == 10);
    let sum = list.reduce(0, |acc, x| acc + x);
    let digits = list.reduce_right(String::new(), |acc, x| format!("{acc}{x}"));
    let has_two = list.includes(2);

    assert_eq!(joined.get(), "1-2-3");
    assert_eq!(digits.get(), "321");

    list.splice(1, 1, [10, -1]).unwrap();
    settle();

    assert_eq!(joined.get(), "1-10--1-3");
    assert!(!all_positive.get());
    assert!(has_ten.get());
    assert_eq!(sum.get(), 13);
    assert_eq!(digits.get(), "3-1101");
    assert!(!has_two.get());
}

#[test]
fn test_flat_map_is_not_implemented() {
    let list = ObservableList::new(vec![1]);
    let result = list.flat_map(|x| vec![*x, *x]);
    assert!(matches!(result, Err(ListError::NotImplemented("flat_map"))));
}

#[test]
fn test_sort_and_reverse_are_single_splices() {
    let list = ObservableList::new(vec![3, 1, 2]);
    let count = Rc::new(Cell::new(0));
    let seen = count.clone();
    list.subscribe(move |_| seen.set(seen.get() + 1));

    list.sort().unwrap();
    list.reverse().unwrap();
    settle();

    assert_eq!(list.to_vec(), vec![3, 2, 1]);
    assert_eq!(count.get(), 2);
    assert_handles_track(&list);
}

#[test]
fn test_map_in_place_and_set() {
    let list = ObservableList::new(vec![1, 2]);
    list.map_in_place(|x| x + 1).unwrap();
    list.set(2, 9).unwrap();
    assert_eq!(list.to_vec(), vec![2, 3, 9]);
    assert_eq!(list.set(5, 0), Err(ListError::OutOfRange { start: 5, len: 3 }));
}

#[derive(Debug, Clone)]
enum Op {
    Splice(usize, usize, Vec<i32>),
    Pop,
    Unshift(i32),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0usize..12, 0usize..6, prop::collection::vec(any::<i32>(), 0..4))
            .prop_map(|(s, d, items)| Op::Splice(s, d, items)),
        Just(Op::Pop),
        any::<i32>().prop_map(Op::Unshift),
    ]
}

proptest! {
    #[test]
    fn prop_handles_match_positions(initial in prop::collection::vec(any::<i32>(), 0..8), ops in prop::collection::vec(op(), 1..20)) {
        let list = ObservableList::new(initial.clone());
        let mut model = initial;

        for op in ops {
            let before: Vec<_> = list.entries().into_iter().map(|(_, h)| h).collect();
            match op {
                Op::Splice(start, delete, items) => {
                    let result = list.splice(start, delete, items.clone());
                    if start > model.len() {
                        prop_assert_eq!(result, Err(ListError::OutOfRange { start, len: model.len() }));
                        continue;
                    }
                    let end = (start + delete).min(model.len());
                    let removed: Vec<i32> = model.splice(start..end, items).collect();
                    prop_assert_eq!(result, Ok(removed));
                    for handle in &before[start..end] {
                        prop_assert_eq!(handle.get(), -1);
                    }
                }
                Op::Pop => {
                    prop_assert_eq!(list.pop(), Ok(model.pop()));
                }
                Op::Unshift(x) => {
                    list.unshift([x]).unwrap();
                    model.insert(0, x);
                }
            }
            prop_assert_eq!(list.to_vec(), model.clone());
            for (position, (_, handle)) in list.entries().iter().enumerate() {
                prop_assert_eq!(handle.get(), position as isize);
            }
        }
        settle();
        prop_assert_eq!(list.length().get(), list.len());
    }
}
