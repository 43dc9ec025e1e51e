use serde_json::json;
use std::cell::Cell;
use std::rc::Rc;
use weft_signals::{ObservableCell, Value, deep};

fn todo_list() -> weft_signals::ObservableList<Value> {
    let Value::List(list) = deep(&json!([
        { "title": "write", "done": false },
        { "title": "ship", "done": false },
    ])) else {
        panic!("array input builds a list");
    };
    list
}

fn done_flag(item: &Value) -> bool {
    match item {
        Value::Record(record) => record.get("done").and_then(|v| v.as_bool()).unwrap_or(false),
        _ => false,
    }
}

#[test]
fn test_record_field_change_reaches_list() {
    let list = todo_list();
    let hits = Rc::new(Cell::new(0));
    let seen = hits.clone();
    list.on_nested_change(move || seen.set(seen.get() + 1));

    let Some(Value::Record(first)) = list.get(0) else {
        panic!("items are records");
    };
    first.set("done", Value::Bool(true));

    assert_eq!(hits.get(), 1);
}

#[test]
fn test_aggregate_follows_nested_change() {
    let list = todo_list();
    let all_done = list.every(done_flag);
    assert!(!all_done.get());

    for item in list.to_vec() {
        if let Value::Record(record) = item {
            record.set("done", Value::Bool(true));
        }
    }
    weft_scheduler::tick();

    assert!(all_done.get());
}

#[test]
fn test_inserted_records_are_adopted() {
    let list = todo_list();
    let hits = Rc::new(Cell::new(0));
    let seen = hits.clone();
    list.on_nested_change(move || seen.set(seen.get() + 1));

    let extra = deep(&json!({ "title": "rest", "done": false }));
    list.push(extra.clone()).unwrap();
    if let Value::Record(record) = extra {
        record.set("title", Value::from("sleep"));
    }

    assert_eq!(hits.get(), 1);
}

#[test]
fn test_deep_cell_wraps_nested_list() {
    let cell = ObservableCell::deep(deep(&json!([1, 2])));
    let hits = Rc::new(Cell::new(0));
    let seen = hits.clone();
    cell.subscribe(move |_| seen.set(seen.get() + 1));

    let inner = cell.get();
    let Value::List(numbers) = &inner else {
        panic!("expected list");
    };
    let Some(Value::Number(first)) = numbers.get(0) else {
        panic!("expected number");
    };
    assert_eq!(first, 1.0);

    // A record stored in the list reports through the list to the cell.
    let record = deep(&json!({ "n": 0 }));
    numbers.push(record.clone()).unwrap();
    if let Value::Record(record) = record {
        record.set("n", Value::from(1));
    }
    assert_eq!(hits.get(), 1);
    assert_eq!(inner.to_json(), json!([1.0, 2.0, { "n": 1.0 }]));
}
