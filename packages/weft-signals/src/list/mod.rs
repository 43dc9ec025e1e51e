//! Observable ordered collections.
//!
//! Every mutation funnels into one primitive, [`ObservableList::splice`].
//! Subscribers receive the resulting [`ListEdit`] one scheduler turn later,
//! each in its own deferred task. Item positions are exposed as live
//! [`IndexHandle`]s that follow their item as earlier edits shift it.

mod derived;
mod query;

use crate::cell::{IndexHandle, ObservableCell};
use crate::deep::{Adopt, ChangeSink, Parent};
use crate::error::ListError;
use crate::subscriber::{SubscriberId, Subscribers, Watch};
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

/// One normalized list change: `delete_count` items at `start` were replaced
/// by `inserted`. `handles` are the fresh index handles of the inserted items.
#[derive(Debug, Clone)]
pub struct ListEdit<T> {
    pub start: usize,
    pub delete_count: usize,
    pub inserted: Vec<T>,
    pub handles: Vec<IndexHandle>,
}

type EditCallback<T> = dyn Fn(&ListEdit<T>);

pub struct ObservableList<T> {
    inner: Rc<ListInner<T>>,
}

pub struct WeakList<T> {
    inner: Weak<ListInner<T>>,
}

pub(crate) struct ListInner<T> {
    items: RefCell<Vec<T>>,
    handles: RefCell<Vec<IndexHandle>>,
    subscribers: Subscribers<EditCallback<T>>,
    nested: Subscribers<dyn Fn()>,
    parent: RefCell<Option<Parent>>,
    length: ObservableCell<usize>,
    read_only: bool,
}

impl<T> Clone for ObservableList<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> Clone for WeakList<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Adopt> WeakList<T> {
    pub fn upgrade(&self) -> Option<ObservableList<T>> {
        self.inner.upgrade().map(|inner| ObservableList { inner })
    }
}

impl<T: Adopt> Default for ObservableList<T> {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl<T: Adopt> From<Vec<T>> for ObservableList<T> {
    fn from(items: Vec<T>) -> Self {
        Self::new(items)
    }
}

impl<T: Adopt> ObservableList<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self::build(items, false)
    }

    /// Lists produced by `map`, `filter`, `slice` and `concat`: public
    /// mutators return [`ListError::ReadOnly`].
    pub(crate) fn derived(items: Vec<T>) -> Self {
        Self::build(items, true)
    }

    fn build(items: Vec<T>, read_only: bool) -> Self {
        let handles = (0..items.len())
            .map(|i| ObservableCell::new(i as isize))
            .collect();
        let list = Self {
            inner: Rc::new(ListInner {
                length: ObservableCell::new(items.len()),
                items: RefCell::new(items),
                handles: RefCell::new(handles),
                subscribers: Subscribers::default(),
                nested: Subscribers::default(),
                parent: RefCell::new(None),
                read_only,
            }),
        };
        if !read_only {
            let parent = list.as_parent();
            for item in list.inner.items.borrow().iter() {
                item.adopt(&parent);
            }
        }
        list
    }

    pub fn len(&self) -> usize {
        self.inner.items.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.items.borrow().is_empty()
    }

    pub fn is_read_only(&self) -> bool {
        self.inner.read_only
    }

    pub fn get(&self, index: usize) -> Option<T> {
        self.inner.items.borrow().get(index).cloned()
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.inner.items.borrow().clone()
    }

    pub fn with<R>(&self, f: impl FnOnce(&[T]) -> R) -> R {
        f(&self.inner.items.borrow())
    }

    /// Items paired with their live index handles.
    pub fn entries(&self) -> Vec<(T, IndexHandle)> {
        let items = self.inner.items.borrow();
        let handles = self.inner.handles.borrow();
        items.iter().cloned().zip(handles.iter().cloned()).collect()
    }

    /// The live position handle of the item currently at `index`.
    pub fn handle(&self, index: usize) -> Option<IndexHandle> {
        self.inner.handles.borrow().get(index).cloned()
    }

    /// Length as a cell. Follows the list one turn after each edit.
    pub fn length(&self) -> ObservableCell<usize> {
        self.inner.length.clone()
    }

    /// Replaces `delete_count` items at `start` with `items` and returns the
    /// removed ones. `start` may equal the length (append) but not exceed it;
    /// `delete_count` is clamped to the items available.
    pub fn splice(
        &self,
        start: usize,
        delete_count: usize,
        items: impl IntoIterator<Item = T>,
    ) -> Result<Vec<T>, ListError> {
        self.check_writable()?;
        self.apply(start, delete_count, items.into_iter().collect())
    }

    /// Appends one item, returning the new length.
    pub fn push(&self, item: T) -> Result<usize, ListError> {
        self.extend([item])
    }

    pub fn extend(&self, items: impl IntoIterator<Item = T>) -> Result<usize, ListError> {
        let len = self.len();
        self.splice(len, 0, items)?;
        Ok(self.len())
    }

    pub fn pop(&self) -> Result<Option<T>, ListError> {
        self.check_writable()?;
        let len = self.len();
        if len == 0 {
            return Ok(None);
        }
        Ok(self.apply(len - 1, 1, Vec::new())?.pop())
    }

    pub fn shift(&self) -> Result<Option<T>, ListError> {
        self.check_writable()?;
        if self.is_empty() {
            return Ok(None);
        }
        Ok(self.apply(0, 1, Vec::new())?.into_iter().next())
    }

    pub fn unshift(&self, items: impl IntoIterator<Item = T>) -> Result<usize, ListError> {
        self.splice(0, 0, items)?;
        Ok(self.len())
    }

    pub fn insert(&self, index: usize, item: T) -> Result<(), ListError> {
        self.splice(index, 0, [item]).map(|_| ())
    }

    pub fn remove(&self, index: usize) -> Result<Option<T>, ListError> {
        Ok(self.splice(index, 1, [])?.into_iter().next())
    }

    pub fn clear(&self) -> Result<Vec<T>, ListError> {
        let len = self.len();
        self.splice(0, len, [])
    }

    /// Writes `item` at `index`. Writing one past the end appends.
    pub fn set(&self, index: usize, item: T) -> Result<(), ListError> {
        let len = self.len();
        if index > len {
            return Err(ListError::OutOfRange { start: index, len });
        }
        self.splice(index, 1, [item]).map(|_| ())
    }

    /// Overwrites `start..end` (default: to the end) with clones of `value`.
    pub fn fill(&self, value: T, start: usize, end: Option<usize>) -> Result<(), ListError> {
        let len = self.len();
        let start = start.min(len);
        let end = end.unwrap_or(len).clamp(start, len);
        self.splice(start, end - start, vec![value; end - start])
            .map(|_| ())
    }

    /// Copies `start..end` over the items beginning at `target`, without
    /// changing the length.
    pub fn copy_within(&self, target: usize, start: usize, end: Option<usize>) -> Result<(), ListError> {
        let len = self.len();
        let start = start.min(len);
        let end = end.unwrap_or(len).clamp(start, len);
        if target >= len {
            return Ok(());
        }
        let count = (end - start).min(len - target);
        if count == 0 {
            return Ok(());
        }
        let copied = self.with(|items| items[start..start + count].to_vec());
        self.splice(target, count, copied).map(|_| ())
    }

    pub fn sort(&self) -> Result<(), ListError>
    where
        T: Ord,
    {
        self.sort_by(Ord::cmp)
    }

    pub fn sort_by(&self, compare: impl FnMut(&T, &T) -> std::cmp::Ordering) -> Result<(), ListError> {
        let mut items = self.to_vec();
        items.sort_by(compare);
        let len = items.len();
        self.splice(0, len, items).map(|_| ())
    }

    pub fn reverse(&self) -> Result<(), ListError> {
        let mut items = self.to_vec();
        items.reverse();
        let len = items.len();
        self.splice(0, len, items).map(|_| ())
    }

    /// Removes every item failing `keep`, one splice per contiguous run.
    pub fn retain(&self, mut keep: impl FnMut(&T) -> bool) -> Result<(), ListError> {
        self.check_writable()?;
        let verdicts: Vec<bool> = self.with(|items| items.iter().map(&mut keep).collect());
        let mut end = verdicts.len();
        while end > 0 {
            if verdicts[end - 1] {
                end -= 1;
                continue;
            }
            let mut start = end - 1;
            while start > 0 && !verdicts[start - 1] {
                start -= 1;
            }
            self.apply(start, end - start, Vec::new())?;
            end = start;
        }
        Ok(())
    }

    /// Replaces each item with `f(item)`, one splice per item.
    pub fn map_in_place(&self, f: impl Fn(&T) -> T) -> Result<(), ListError> {
        self.check_writable()?;
        for index in 0..self.len() {
            let Some(next) = self.with(|items| items.get(index).map(&f)) else {
                break;
            };
            self.apply(index, 1, vec![next])?;
        }
        Ok(())
    }

    /// Registers `f` for every future edit. No initial call.
    pub fn subscribe(&self, f: impl Fn(&ListEdit<T>) + 'static) -> SubscriberId {
        self.inner.subscribers.add(Rc::new(f))
    }

    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let edits = self.inner.subscribers.remove(id);
        let nested = self.inner.nested.remove(id);
        edits || nested
    }

    /// Called synchronously when an adopted item reports an inner change.
    pub fn on_nested_change(&self, f: impl Fn() + 'static) -> SubscriberId {
        self.inner.nested.add(Rc::new(f))
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.len()
    }

    pub fn downgrade(&self) -> WeakList<T> {
        WeakList {
            inner: Rc::downgrade(&self.inner),
        }
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn set_parent(&self, parent: Parent) {
        *self.inner.parent.borrow_mut() = Some(parent);
    }

    fn as_parent(&self) -> Parent {
        let sink: Weak<ListInner<T>> = Rc::downgrade(&self.inner);
        Parent::new(sink)
    }

    fn check_writable(&self) -> Result<(), ListError> {
        if self.inner.read_only {
            Err(ListError::ReadOnly)
        } else {
            Ok(())
        }
    }

    /// The splice primitive, also used by derived views to write into their
    /// read-only output.
    pub(crate) fn apply(
        &self,
        start: usize,
        delete_count: usize,
        inserted: Vec<T>,
    ) -> Result<Vec<T>, ListError> {
        let len = self.len();
        if start > len {
            return Err(ListError::OutOfRange { start, len });
        }
        let delete_count = delete_count.min(len - start);
        let end = start + delete_count;

        // Derived views share their items with the source, which keeps
        // ownership of them.
        if !self.inner.read_only {
            let parent = self.as_parent();
            for item in &inserted {
                item.adopt(&parent);
            }
        }
        let fresh: Vec<IndexHandle> = (0..inserted.len())
            .map(|offset| ObservableCell::new((start + offset) as isize))
            .collect();

        let removed_handles: Vec<IndexHandle> = self
            .inner
            .handles
            .borrow_mut()
            .splice(start..end, fresh.iter().cloned())
            .collect();
        let removed: Vec<T> = self
            .inner
            .items
            .borrow_mut()
            .splice(start..end, inserted.iter().cloned())
            .collect();

        // Handle writes notify synchronously; no borrow may be held here.
        for handle in removed_handles {
            handle.set(-1);
        }
        if inserted.len() != delete_count {
            let shifted: Vec<IndexHandle> =
                self.inner.handles.borrow()[start + inserted.len()..].to_vec();
            let first = start + inserted.len();
            for (offset, handle) in shifted.into_iter().enumerate() {
                handle.set((first + offset) as isize);
            }
        }

        tracing::trace!(
            start,
            delete_count,
            inserted = inserted.len(),
            "list splice"
        );

        let weak = self.downgrade();
        weft_scheduler::defer(move || {
            if let Some(list) = weak.upgrade() {
                list.inner.length.set(list.len());
            }
        });

        let edit = Rc::new(ListEdit {
            start,
            delete_count,
            inserted,
            handles: fresh,
        });
        for (_, subscriber) in self.inner.subscribers.snapshot() {
            let edit = edit.clone();
            weft_scheduler::defer(move || subscriber(&edit));
        }
        Ok(removed)
    }
}

impl<T: Adopt> ChangeSink for ListInner<T> {
    fn child_changed(&self) {
        for (_, watcher) in self.nested.snapshot() {
            watcher();
        }
        let parent = self.parent.borrow().clone();
        if let Some(parent) = parent {
            parent.notify();
        }
    }
}

impl<T: Adopt> Watch for ObservableList<T> {
    /// Fires after every delivered edit and every nested change.
    fn watch(&self, f: Rc<dyn Fn()>) -> SubscriberId {
        let on_edit = f.clone();
        let id = self.subscribe(move |_| on_edit());
        self.inner.nested.insert(id, f);
        id
    }

    fn unwatch(&self, id: SubscriberId) -> bool {
        self.unsubscribe(id)
    }
}

impl<T: fmt::Debug> fmt::Debug for ObservableList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.items.try_borrow() {
            Ok(items) => f.debug_list().entries(items.iter()).finish(),
            Err(_) => f.write_str("ObservableList(<borrowed>)"),
        }
    }
}
