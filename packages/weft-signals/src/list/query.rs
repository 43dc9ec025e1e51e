use super::ObservableList;
use crate::cell::{IndexHandle, ObservableCell};
use crate::deep::Adopt;
use std::fmt::Display;
use std::rc::Rc;

impl<T: Adopt> ObservableList<T> {
    /// The live handle of the first item equal to `value`, or a handle
    /// fixed at `-1` if there is none right now.
    pub fn index_of(&self, value: &T) -> IndexHandle
    where
        T: PartialEq,
    {
        self.find_index(|item| item == value)
    }

    pub fn last_index_of(&self, value: &T) -> IndexHandle
    where
        T: PartialEq,
    {
        let found = self.with(|items| items.iter().rposition(|item| item == value));
        self.handle_or_missing(found)
    }

    pub fn find_index(&self, predicate: impl Fn(&T) -> bool) -> IndexHandle {
        let found = self.with(|items| items.iter().position(predicate));
        self.handle_or_missing(found)
    }

    pub fn find(&self, predicate: impl Fn(&T) -> bool) -> Option<T> {
        self.with(|items| items.iter().find(|item| predicate(item)).cloned())
    }

    fn handle_or_missing(&self, found: Option<usize>) -> IndexHandle {
        found
            .and_then(|index| self.handle(index))
            .unwrap_or_else(|| ObservableCell::new(-1))
    }

    /// Items rendered with `Display` and joined by `separator`.
    pub fn join(&self, separator: &str) -> ObservableCell<String>
    where
        T: Display,
    {
        let separator = separator.to_string();
        self.aggregate(move |items| {
            items
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(&separator)
        })
    }

    pub fn every(&self, predicate: impl Fn(&T) -> bool + 'static) -> ObservableCell<bool> {
        self.aggregate(move |items| items.iter().all(&predicate))
    }

    pub fn some(&self, predicate: impl Fn(&T) -> bool + 'static) -> ObservableCell<bool> {
        self.aggregate(move |items| items.iter().any(&predicate))
    }

    pub fn includes(&self, value: T) -> ObservableCell<bool>
    where
        T: PartialEq,
    {
        self.aggregate(move |items| items.contains(&value))
    }

    pub fn reduce<U, F>(&self, init: U, f: F) -> ObservableCell<U>
    where
        U: Clone + PartialEq + 'static,
        F: Fn(U, &T) -> U + 'static,
    {
        self.aggregate(move |items| items.iter().fold(init.clone(), &f))
    }

    pub fn reduce_right<U, F>(&self, init: U, f: F) -> ObservableCell<U>
    where
        U: Clone + PartialEq + 'static,
        F: Fn(U, &T) -> U + 'static,
    {
        self.aggregate(move |items| items.iter().rev().fold(init.clone(), &f))
    }

    /// A cell recomputed from the whole list after every edit and every
    /// nested change.
    fn aggregate<U, F>(&self, compute: F) -> ObservableCell<U>
    where
        U: Clone + PartialEq + 'static,
        F: Fn(&[T]) -> U + 'static,
    {
        let cell = ObservableCell::new(self.with(&compute));
        let source = self.downgrade();
        let target = cell.clone();
        let refresh: Rc<dyn Fn()> = Rc::new(move || {
            if let Some(source) = source.upgrade() {
                target.set(source.with(&compute));
            }
        });

        let on_edit = refresh.clone();
        self.subscribe(move |_| on_edit());
        self.on_nested_change(move || {
            let refresh = refresh.clone();
            weft_scheduler::defer(move || refresh());
        });
        cell
    }
}
