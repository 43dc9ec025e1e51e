//! What a rendered view has to undo when it is released: cell and list
//! subscriptions, the slots it created and the views nested into it.

use crate::content::View;
use crate::renderer::Renderer;
use crate::slot::{Slot, SlotList};
use std::cell::RefCell;

type Cleanup = Box<dyn FnOnce()>;

#[derive(Default)]
pub(crate) struct Scope {
    cleanups: RefCell<Vec<Cleanup>>,
    slots: RefCell<Vec<Slot>>,
    lists: RefCell<Vec<SlotList>>,
    children: RefCell<Vec<View>>,
}

impl Scope {
    pub(crate) fn on_teardown(&self, f: impl FnOnce() + 'static) {
        self.cleanups.borrow_mut().push(Box::new(f));
    }

    pub(crate) fn adopt_slot(&self, slot: Slot) {
        self.slots.borrow_mut().push(slot);
    }

    pub(crate) fn adopt_list(&self, list: SlotList) {
        self.lists.borrow_mut().push(list);
    }

    pub(crate) fn adopt_view(&self, view: View) {
        self.children.borrow_mut().push(view);
    }

    /// Unbinds first so no update lands on nodes being freed.
    pub(crate) fn teardown(&self, renderer: &Renderer) {
        let cleanups = std::mem::take(&mut *self.cleanups.borrow_mut());
        for cleanup in cleanups {
            cleanup();
        }
        let slots = std::mem::take(&mut *self.slots.borrow_mut());
        for slot in slots {
            slot.teardown(renderer);
        }
        let lists = std::mem::take(&mut *self.lists.borrow_mut());
        for list in lists {
            list.teardown(renderer);
        }
        let children = std::mem::take(&mut *self.children.borrow_mut());
        for child in children {
            renderer.release_view(child);
        }
    }
}
