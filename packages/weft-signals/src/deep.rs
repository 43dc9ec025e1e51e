//! Deep reactivity.
//!
//! Plain aggregate data enters the engine through [`deep`], which builds a new
//! reactive tree (`Value::List` / `Value::Record`) out of a JSON-like input
//! without touching the input. Nested aggregates are *adopted* by the
//! container that holds them so a change anywhere below bubbles upward:
//! record field -> record -> enclosing list (`on_nested_change`) or cell
//! (re-emit).

use crate::cell::ObservableCell;
use crate::list::ObservableList;
use crate::subscriber::{SubscriberId, Subscribers};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};

/// Receives "something below me changed".
pub trait ChangeSink {
    fn child_changed(&self);
}

/// Weak link from a nested aggregate to its container.
#[derive(Clone)]
pub struct Parent(Weak<dyn ChangeSink>);

impl Parent {
    pub(crate) fn new(sink: Weak<dyn ChangeSink>) -> Self {
        Self(sink)
    }

    pub fn notify(&self) {
        if let Some(sink) = self.0.upgrade() {
            sink.child_changed();
        }
    }
}

impl fmt::Debug for Parent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(if self.0.strong_count() > 0 {
            "Parent(live)"
        } else {
            "Parent(dropped)"
        })
    }
}

/// Values that can live in an observable list.
///
/// Leaves ignore the parent; aggregates remember it so nested changes bubble.
pub trait Adopt: Clone + 'static {
    fn adopt(&self, _parent: &Parent) {}
}

macro_rules! adopt_leaf {
    ($($ty:ty),* $(,)?) => {
        $(impl Adopt for $ty {})*
    };
}

adopt_leaf!(
    bool,
    char,
    i8,
    i16,
    i32,
    i64,
    isize,
    u8,
    u16,
    u32,
    u64,
    usize,
    f32,
    f64,
    String,
    &'static str,
    (),
);

impl<T: ?Sized + 'static> Adopt for Rc<T> {}

impl<T: Adopt> Adopt for Option<T> {
    fn adopt(&self, parent: &Parent) {
        if let Some(value) = self {
            value.adopt(parent);
        }
    }
}

impl<T: Adopt> Adopt for ObservableList<T> {
    fn adopt(&self, parent: &Parent) {
        self.set_parent(parent.clone());
    }
}

/// A dynamically typed reactive value.
///
/// Scalars compare by value; `List` and `Record` compare by identity, so
/// assigning the same aggregate again is not a change.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    List(ObservableList<Value>),
    Record(Record),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Truthiness used by boolean attributes: `Null`, `false`, `0`, `NaN`
    /// and `""` are falsy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::Text(s) => !s.is_empty(),
            Value::List(_) | Value::Record(_) => true,
        }
    }

    /// Plain JSON snapshot of the current state.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Text(s) => serde_json::Value::String(s.clone()),
            Value::List(list) => {
                serde_json::Value::Array(list.to_vec().iter().map(Value::to_json).collect())
            }
            Value::Record(record) => record.to_json(),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::List(a), Value::List(b)) => a.ptr_eq(b),
            (Value::Record(a), Value::Record(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{}", *n as i64),
            Value::Number(n) => write!(f, "{}", n),
            Value::Text(s) => f.write_str(s),
            Value::List(list) => {
                let parts: Vec<String> = list.to_vec().iter().map(Value::to_string).collect();
                f.write_str(&parts.join(","))
            }
            Value::Record(_) => f.write_str("[record]"),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("Null"),
            Value::Bool(b) => write!(f, "Bool({})", b),
            Value::Number(n) => write!(f, "Number({})", n),
            Value::Text(s) => write!(f, "Text({:?})", s),
            Value::List(list) => f.debug_list().entries(list.to_vec()).finish(),
            Value::Record(record) => fmt::Debug::fmt(record, f),
        }
    }
}

impl Adopt for Value {
    fn adopt(&self, parent: &Parent) {
        match self {
            Value::List(list) => list.set_parent(parent.clone()),
            Value::Record(record) => record.set_parent(parent.clone()),
            _ => {}
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n as f64)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<ObservableList<Value>> for Value {
    fn from(list: ObservableList<Value>) -> Self {
        Value::List(list)
    }
}

impl From<Record> for Value {
    fn from(record: Record) -> Self {
        Value::Record(record)
    }
}

impl From<&serde_json::Value> for Value {
    fn from(json: &serde_json::Value) -> Self {
        deep(json)
    }
}

/// Builds a deeply reactive copy of `json`. Arrays become observable lists,
/// objects become records; the input is left untouched.
pub fn deep(json: &serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
        serde_json::Value::String(s) => Value::Text(s.clone()),
        serde_json::Value::Array(items) => Value::List(ObservableList::new(items.iter().map(deep).collect())),
        serde_json::Value::Object(map) => Value::Record(Record::from_fields(
            map.iter().map(|(key, value)| (key.clone(), deep(value))),
        )),
    }
}

impl ObservableCell<Value> {
    /// A cell that adopts whatever aggregate it holds: a change inside the
    /// held list or record re-emits the cell.
    pub fn deep(value: Value) -> Self {
        let cell = ObservableCell::new(value);
        let parent = Parent::new(cell.as_sink());
        cell.with(|value| value.adopt(&parent));
        cell.set_hook(Rc::new(move |value: &Value| value.adopt(&parent)));
        cell
    }
}

/// A reactive record: named fields, each an `ObservableCell<Value>`.
#[derive(Clone)]
pub struct Record {
    inner: Rc<RecordInner>,
}

struct RecordInner {
    fields: RefCell<BTreeMap<String, ObservableCell<Value>>>,
    parent: RefCell<Option<Parent>>,
    watchers: Subscribers<dyn Fn()>,
}

impl ChangeSink for RecordInner {
    fn child_changed(&self) {
        for (_, watcher) in self.watchers.snapshot() {
            watcher();
        }
        let parent = self.parent.borrow().clone();
        if let Some(parent) = parent {
            parent.notify();
        }
    }
}

impl Default for Record {
    fn default() -> Self {
        Self::new()
    }
}

impl Record {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RecordInner {
                fields: RefCell::new(BTreeMap::new()),
                parent: RefCell::new(None),
                watchers: Subscribers::default(),
            }),
        }
    }

    pub fn from_fields(fields: impl IntoIterator<Item = (String, Value)>) -> Self {
        let record = Self::new();
        for (name, value) in fields {
            let cell = record.make_field(value);
            record.inner.fields.borrow_mut().insert(name, cell);
        }
        record
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.field(name).map(|cell| cell.get())
    }

    /// The field's own cell, for binding into templates.
    pub fn field(&self, name: &str) -> Option<ObservableCell<Value>> {
        self.inner.fields.borrow().get(name).cloned()
    }

    pub fn set(&self, name: impl Into<String>, value: Value) {
        let name = name.into();
        match self.field(&name) {
            Some(cell) => cell.set(value),
            None => {
                let cell = self.make_field(value);
                self.inner.fields.borrow_mut().insert(name, cell);
                self.inner.child_changed();
            }
        }
    }

    pub fn remove(&self, name: &str) -> Option<Value> {
        let removed = self.inner.fields.borrow_mut().remove(name);
        removed.map(|cell| {
            self.inner.child_changed();
            cell.get()
        })
    }

    pub fn keys(&self) -> Vec<String> {
        self.inner.fields.borrow().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.fields.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.fields.borrow().is_empty()
    }

    /// Called after any change in this record or below it.
    pub fn on_change(&self, f: impl Fn() + 'static) -> SubscriberId {
        self.inner.watchers.add(Rc::new(f))
    }

    pub fn off_change(&self, id: SubscriberId) -> bool {
        self.inner.watchers.remove(id)
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn to_json(&self) -> serde_json::Value {
        let fields = self.inner.fields.borrow();
        serde_json::Value::Object(
            fields
                .iter()
                .map(|(name, cell)| (name.clone(), cell.with(Value::to_json)))
                .collect(),
        )
    }

    pub(crate) fn set_parent(&self, parent: Parent) {
        *self.inner.parent.borrow_mut() = Some(parent);
    }

    fn make_field(&self, value: Value) -> ObservableCell<Value> {
        let cell = ObservableCell::deep(value);
        let sink: Weak<RecordInner> = Rc::downgrade(&self.inner);
        let record = Parent::new(sink);
        cell.subscribe(move |_| record.notify());
        cell
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields = self.inner.fields.borrow();
        let mut map = f.debug_map();
        for (name, cell) in fields.iter() {
            map.entry(name, &cell.get());
        }
        map.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn deep_builds_without_aliasing_input() {
        let input = serde_json::json!({ "name": "Ada", "tags": ["a", "b"] });
        let value = deep(&input);

        let Value::Record(record) = &value else {
            panic!("expected record");
        };
        record.set("name", Value::from("Grace"));

        assert_eq!(input["name"], "Ada");
        assert_eq!(record.get("name"), Some(Value::from("Grace")));
        assert_eq!(value.to_json()["tags"], serde_json::json!(["a", "b"]));
    }

    #[test]
    fn nested_record_change_bubbles_to_outer_record() {
        let value = deep(&serde_json::json!({ "inner": { "count": 1 } }));
        let Value::Record(outer) = value else {
            panic!("expected record");
        };
        let Some(Value::Record(inner)) = outer.get("inner") else {
            panic!("expected nested record");
        };

        let hits = Rc::new(Cell::new(0));
        let seen = hits.clone();
        outer.on_change(move || seen.set(seen.get() + 1));

        inner.set("count", Value::from(2));
        assert_eq!(hits.get(), 1);

        // same value again is not a change
        inner.set("count", Value::from(2));
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn deep_cell_reemits_on_nested_change() {
        let record = Record::from_fields([("done".to_string(), Value::Bool(false))]);
        let cell = ObservableCell::deep(Value::Record(record.clone()));
        let hits = Rc::new(Cell::new(0));
        let seen = hits.clone();
        cell.subscribe(move |_| seen.set(seen.get() + 1));

        record.set("done", Value::Bool(true));
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn number_display_drops_integral_fraction() {
        assert_eq!(Value::Number(3.0).to_string(), "3");
        assert_eq!(Value::Number(2.5).to_string(), "2.5");
        assert_eq!(Value::Null.to_string(), "");
    }
}
