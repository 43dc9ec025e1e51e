use smallvec::SmallVec;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

thread_local! {
    static NEXT_SUBSCRIBER: Cell<u64> = const { Cell::new(1) };
}

/// Identifies one registered callback on a cell or list.
///
/// Passed back to `set_excluding` so a writer can skip the subscriber that
/// produced the write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl SubscriberId {
    pub fn new() -> Self {
        NEXT_SUBSCRIBER.with(|next| {
            let id = next.get();
            next.set(id + 1);
            SubscriberId(id)
        })
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) type Entries<F> = SmallVec<[(SubscriberId, Rc<F>); 4]>;

/// Insertion-ordered callback list.
pub(crate) struct Subscribers<F: ?Sized> {
    entries: RefCell<Entries<F>>,
}

impl<F: ?Sized> Default for Subscribers<F> {
    fn default() -> Self {
        Self {
            entries: RefCell::new(SmallVec::new()),
        }
    }
}

impl<F: ?Sized> Subscribers<F> {
    pub(crate) fn add(&self, callback: Rc<F>) -> SubscriberId {
        let id = SubscriberId::new();
        self.entries.borrow_mut().push((id, callback));
        id
    }

    /// Registers `callback` under an id issued elsewhere, so one logical
    /// watcher can span several callback lists.
    pub(crate) fn insert(&self, id: SubscriberId, callback: Rc<F>) {
        self.entries.borrow_mut().push((id, callback));
    }

    pub(crate) fn remove(&self, id: SubscriberId) -> bool {
        let mut entries = self.entries.borrow_mut();
        let before = entries.len();
        entries.retain(|(entry, _)| *entry != id);
        entries.len() != before
    }

    /// Copy of the current callbacks, so callers can invoke them without
    /// holding the borrow (callbacks routinely subscribe or read back).
    pub(crate) fn snapshot(&self) -> Entries<F> {
        self.entries.borrow().clone()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.borrow().len()
    }
}

/// Type-erased change notification, used where sources of different value
/// types feed one derivation.
pub trait Watch {
    /// Calls `f` after every change. Returns the id to pass to `unwatch`.
    fn watch(&self, f: Rc<dyn Fn()>) -> SubscriberId;

    fn unwatch(&self, id: SubscriberId) -> bool;
}
