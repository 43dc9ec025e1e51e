//! Single-value observable container.
//!
//! An `ObservableCell` holds one value and a list of subscribers. Writes that
//! do not change the value are dropped; writes that do are pushed to every
//! subscriber synchronously, in subscription order. Derived cells (`pipe`,
//! `derive`) recompute one scheduler turn after their sources change.

use crate::deep::ChangeSink;
use crate::subscriber::{SubscriberId, Subscribers, Watch};
use futures::channel::oneshot;
use futures::future::{FutureExt, LocalBoxFuture};
use futures::stream::{self, LocalBoxStream, StreamExt};
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

type Callback<T> = dyn Fn(&T);

/// A live position handle for one list item. `-1` once the item is removed.
pub type IndexHandle = ObservableCell<isize>;

pub struct ObservableCell<T> {
    inner: Rc<CellInner<T>>,
}

pub struct WeakCell<T> {
    inner: Weak<CellInner<T>>,
}

pub(crate) struct CellInner<T> {
    value: RefCell<T>,
    subscribers: Subscribers<Callback<T>>,
    // Runs on every accepted write before subscribers; deep cells use it to
    // re-parent nested aggregates.
    on_set: RefCell<Option<Rc<Callback<T>>>>,
    waiters: RefCell<Vec<oneshot::Sender<T>>>,
}

impl<T> Clone for ObservableCell<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> Clone for WeakCell<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Clone + PartialEq + 'static> WeakCell<T> {
    pub fn upgrade(&self) -> Option<ObservableCell<T>> {
        self.inner.upgrade().map(|inner| ObservableCell { inner })
    }
}

impl<T: Clone + PartialEq + 'static> ObservableCell<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Rc::new(CellInner {
                value: RefCell::new(value),
                subscribers: Subscribers::default(),
                on_set: RefCell::new(None),
                waiters: RefCell::new(Vec::new()),
            }),
        }
    }

    pub fn get(&self) -> T {
        self.inner.value.borrow().clone()
    }

    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.value.borrow())
    }

    pub fn set(&self, value: T) {
        self.set_excluding(value, &[]);
    }

    /// Writes `value` and notifies every subscriber except those in `excluded`.
    /// A write equal to the current value notifies nobody.
    pub fn set_excluding(&self, value: T, excluded: &[SubscriberId]) {
        {
            let mut slot = self.inner.value.borrow_mut();
            if *slot == value {
                return;
            }
            *slot = value.clone();
        }
        let hook = self.inner.on_set.borrow().clone();
        if let Some(hook) = hook {
            hook(&value);
        }
        self.inner.notify(&value, excluded);
    }

    /// Registers `f` and calls it once right away with the current value.
    pub fn bind(&self, f: impl Fn(&T) + 'static) -> SubscriberId {
        let callback: Rc<Callback<T>> = Rc::new(f);
        let id = self.inner.subscribers.add(callback.clone());
        let current = self.get();
        callback(&current);
        id
    }

    /// Registers `f` without the initial call.
    pub fn subscribe(&self, f: impl Fn(&T) + 'static) -> SubscriberId {
        self.inner.subscribers.add(Rc::new(f))
    }

    pub fn unbind(&self, id: SubscriberId) -> bool {
        self.inner.subscribers.remove(id)
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.len()
    }

    /// Re-emits the current value to every subscriber.
    pub fn update(&self) {
        let current = self.get();
        self.inner.notify(&current, &[]);
    }

    /// Mutates the value in place, then re-emits it.
    pub fn modify(&self, f: impl FnOnce(&mut T)) {
        {
            let mut slot = self.inner.value.borrow_mut();
            f(&mut slot);
        }
        self.update();
    }

    /// Derives a cell holding `f(current)`. The derived value is recomputed
    /// one turn after each source notification.
    pub fn pipe<U, F>(&self, f: F) -> ObservableCell<U>
    where
        U: Clone + PartialEq + 'static,
        F: Fn(&T) -> U + 'static,
    {
        let derived = ObservableCell::new(self.with(&f));
        let f = Rc::new(f);
        let source = self.downgrade();
        let target = derived.clone();
        self.subscribe(move |_| {
            let source = source.clone();
            let target = target.clone();
            let f = f.clone();
            weft_scheduler::defer(move || {
                if let Some(source) = source.upgrade() {
                    target.set(source.with(|value| f(value)));
                }
            });
        });
        derived
    }

    /// Derives a cell from several sources of any type.
    ///
    /// `compute` is re-run one turn after any source changes. The sources keep
    /// the derived cell alive; capture them in `compute` through `downgrade`
    /// to avoid a reference cycle.
    pub fn derive<F>(sources: &[&dyn Watch], compute: F) -> Self
    where
        F: Fn() -> T + 'static,
    {
        let cell = ObservableCell::new(compute());
        let compute = Rc::new(compute);
        for source in sources {
            let target = cell.clone();
            let compute = compute.clone();
            source.watch(Rc::new(move || {
                let target = target.clone();
                let compute = compute.clone();
                weft_scheduler::defer(move || target.set(compute()));
            }));
        }
        cell
    }

    /// Resolves with the value of the next notification, or `None` if the
    /// cell is dropped first.
    pub fn next_change(&self) -> LocalBoxFuture<'static, Option<T>> {
        let (tx, rx) = oneshot::channel();
        self.inner.waiters.borrow_mut().push(tx);
        async move { rx.await.ok() }.boxed_local()
    }

    /// Endless stream of future values. Every call starts a fresh stream; the
    /// stream ends only when the cell is dropped.
    pub fn changes(&self) -> LocalBoxStream<'static, T> {
        stream::unfold(self.downgrade(), |weak| async move {
            let next = weak.upgrade()?.next_change();
            let value = next.await?;
            Some((value, weak))
        })
        .boxed_local()
    }

    pub fn downgrade(&self) -> WeakCell<T> {
        WeakCell {
            inner: Rc::downgrade(&self.inner),
        }
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn set_hook(&self, hook: Rc<Callback<T>>) {
        *self.inner.on_set.borrow_mut() = Some(hook);
    }

    pub(crate) fn as_sink(&self) -> Weak<dyn ChangeSink> {
        let weak: Weak<CellInner<T>> = Rc::downgrade(&self.inner);
        weak
    }
}

impl<T: Clone + PartialEq + 'static> CellInner<T> {
    fn notify(&self, value: &T, excluded: &[SubscriberId]) {
        for (id, callback) in self.subscribers.snapshot() {
            if excluded.contains(&id) {
                continue;
            }
            callback(value);
        }
        let waiters = std::mem::take(&mut *self.waiters.borrow_mut());
        for waiter in waiters {
            let _ = waiter.send(value.clone());
        }
    }
}

impl<T: Clone + PartialEq + 'static> ChangeSink for CellInner<T> {
    fn child_changed(&self) {
        let current = self.value.borrow().clone();
        self.notify(&current, &[]);
    }
}

impl<T: Clone + PartialEq + 'static> Watch for ObservableCell<T> {
    fn watch(&self, f: Rc<dyn Fn()>) -> SubscriberId {
        self.subscribe(move |_| f())
    }

    fn unwatch(&self, id: SubscriberId) -> bool {
        self.unbind(id)
    }
}

impl<T: Clone + PartialEq + Default + 'static> Default for ObservableCell<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: fmt::Debug> fmt::Debug for ObservableCell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.value.try_borrow() {
            Ok(value) => f.debug_tuple("ObservableCell").field(&*value).finish(),
            Err(_) => f.write_str("ObservableCell(<borrowed>)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn modify_reemits_even_when_equal() {
        let cell = ObservableCell::new(vec![1, 2]);
        let calls = Rc::new(Cell::new(0));
        let seen = calls.clone();
        cell.subscribe(move |_| seen.set(seen.get() + 1));

        cell.modify(|v| v.push(3));
        assert_eq!(cell.get(), vec![1, 2, 3]);
        assert_eq!(calls.get(), 1);

        cell.update();
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn unbind_stops_notifications() {
        let cell = ObservableCell::new(0);
        let calls = Rc::new(Cell::new(0));
        let seen = calls.clone();
        let id = cell.subscribe(move |_| seen.set(seen.get() + 1));

        cell.set(1);
        assert!(cell.unbind(id));
        cell.set(2);
        assert_eq!(calls.get(), 1);
        assert_eq!(cell.subscriber_count(), 0);
    }

    #[test]
    fn weak_cell_does_not_keep_value_alive() {
        let cell = ObservableCell::new(String::from("x"));
        let weak = cell.downgrade();
        assert!(weak.upgrade().is_some());
        drop(cell);
        assert!(weak.upgrade().is_none());
    }
}
