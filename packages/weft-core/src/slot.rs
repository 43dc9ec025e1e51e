//! Live regions of the tree.
//!
//! A [`Slot`] owns the nodes between two anchor comments and swaps them when
//! its content changes. Nodes with an exit task stay in place, marked as
//! leaving, until that task settles. A [`SlotList`] keeps one slot per item
//! of an observable list.

use crate::content::{Content, DynList, ExitFuture, View};
use crate::dom::{DomTree, NodeId};
use crate::error::TemplateError;
use crate::renderer::{Renderer, WeakRenderer};
use futures::future::{self, FutureExt, LocalBoxFuture, Shared};
use rustc_hash::FxHashSet;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use weft_signals::SubscriberId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Constructed,
    Updating,
    Disposing,
    Removed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Piece {
    Node(NodeId),
    View(View),
}

impl Piece {
    fn nodes(&self, tree: &DomTree) -> Vec<NodeId> {
        match self {
            Piece::Node(node) => vec![*node],
            Piece::View(view) => view.nodes(tree),
        }
    }
}

type Settling = Shared<LocalBoxFuture<'static, ()>>;

pub(crate) struct SlotInner {
    renderer: WeakRenderer,
    start: NodeId,
    end: NodeId,
    pieces: RefCell<Vec<Piece>>,
    leaving: RefCell<FxHashSet<NodeId>>,
    state: Cell<SlotState>,
    pending: RefCell<Vec<Settling>>,
}

#[derive(Clone)]
pub struct Slot {
    inner: Rc<SlotInner>,
}

impl Slot {
    /// Creates the anchors under `parent`, before `reference`.
    pub(crate) fn before(renderer: &Renderer, parent: NodeId, reference: Option<NodeId>) -> Self {
        let (start, end) = {
            let mut tree = renderer.dom().borrow_mut();
            let start = tree.create_comment("");
            let end = tree.create_comment("");
            tree.insert_before(parent, start, reference);
            tree.insert_before(parent, end, reference);
            (start, end)
        };
        Self {
            inner: Rc::new(SlotInner {
                renderer: renderer.downgrade(),
                start,
                end,
                pieces: RefCell::new(Vec::new()),
                leaving: RefCell::new(FxHashSet::default()),
                state: Cell::new(SlotState::Constructed),
                pending: RefCell::new(Vec::new()),
            }),
        }
    }

    pub(crate) fn from_inner(inner: Rc<SlotInner>) -> Self {
        Self { inner }
    }

    pub(crate) fn weak(&self) -> std::rc::Weak<SlotInner> {
        Rc::downgrade(&self.inner)
    }

    pub fn start(&self) -> NodeId {
        self.inner.start
    }

    pub fn end(&self) -> NodeId {
        self.inner.end
    }

    pub fn state(&self) -> SlotState {
        self.inner.state.get()
    }

    pub fn ptr_eq(&self, other: &Slot) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Nodes currently between the anchors, leaving nodes excluded.
    pub fn nodes(&self) -> Vec<NodeId> {
        let Some(renderer) = self.inner.renderer.upgrade() else {
            return Vec::new();
        };
        let tree = renderer.dom().borrow();
        let leaving = self.inner.leaving.borrow();
        let mut nodes = Vec::new();
        let mut cursor = tree.next_sibling(self.inner.start);
        while let Some(node) = cursor {
            if node == self.inner.end {
                break;
            }
            if !leaving.contains(&node) {
                nodes.push(node);
            }
            cursor = tree.next_sibling(node);
        }
        nodes
    }

    /// Disposes the current content and inserts `content` in its place.
    /// Text is always written to a new text node.
    pub fn update(&self, content: Content) {
        if matches!(self.state(), SlotState::Disposing | SlotState::Removed) {
            tracing::warn!(state = ?self.state(), "update on a slot being removed");
            return;
        }
        let Some(renderer) = self.inner.renderer.upgrade() else {
            return;
        };
        self.inner.state.set(SlotState::Updating);
        let old = std::mem::take(&mut *self.inner.pieces.borrow_mut());
        self.dispose(&renderer, old);
        if let Some(piece) = self.insert(&renderer, content, self.inner.end) {
            self.inner.pieces.borrow_mut().push(piece);
        }
    }

    /// Replaces one node of this slot without touching the rest of it.
    pub fn replace_item(&self, old: NodeId, content: Content) -> Result<(), TemplateError> {
        let renderer = self
            .inner
            .renderer
            .upgrade()
            .ok_or(TemplateError::RendererGone)?;
        let found = {
            let tree = renderer.dom().borrow();
            let pieces = self.inner.pieces.borrow();
            pieces.iter().enumerate().find_map(|(index, piece)| {
                let owns = match piece {
                    Piece::Node(node) => *node == old,
                    Piece::View(view) => view.content(&tree).contains(&old),
                };
                owns.then(|| (index, piece.clone()))
            })
        };
        let Some((index, piece)) = found else {
            return Err(TemplateError::NotTracked);
        };

        let replacement = self.insert(&renderer, content, old);
        match piece {
            Piece::Node(_) => {
                {
                    let mut pieces = self.inner.pieces.borrow_mut();
                    match replacement {
                        Some(new) => pieces[index] = new,
                        None => {
                            pieces.remove(index);
                        }
                    }
                }
                self.dispose(&renderer, vec![piece]);
            }
            // The view keeps its range; the new nodes now sit inside it.
            Piece::View(view) => {
                if let Some(Piece::View(inserted)) = replacement {
                    view.scope().adopt_view(inserted);
                }
                self.dispose(&renderer, vec![Piece::Node(old)]);
            }
        }
        Ok(())
    }

    /// Disposes the content, then removes the anchors once every exit task
    /// has settled. The synchronous part runs immediately; the returned
    /// future must be polled or spawned for the anchors to go.
    pub fn remove(&self) -> LocalBoxFuture<'static, ()> {
        if matches!(self.state(), SlotState::Disposing | SlotState::Removed) {
            return self.settled();
        }
        self.inner.state.set(SlotState::Disposing);
        let Some(renderer) = self.inner.renderer.upgrade() else {
            self.inner.state.set(SlotState::Removed);
            return future::ready(()).boxed_local();
        };
        let old = std::mem::take(&mut *self.inner.pieces.borrow_mut());
        self.dispose(&renderer, old);

        let pending = self.pending();
        if pending.is_empty() {
            self.finish(&renderer);
            return future::ready(()).boxed_local();
        }
        let slot = self.clone();
        async move {
            future::join_all(pending).await;
            if let Some(renderer) = slot.inner.renderer.upgrade() {
                slot.finish(&renderer);
            }
        }
        .boxed_local()
    }

    /// Resolves once every exit task started so far has settled.
    pub fn settled(&self) -> LocalBoxFuture<'static, ()> {
        let pending = self.pending();
        async move {
            future::join_all(pending).await;
        }
        .boxed_local()
    }

    fn pending(&self) -> Vec<Settling> {
        let mut pending = self.inner.pending.borrow_mut();
        pending.retain(|settling| settling.peek().is_none());
        pending.clone()
    }

    fn finish(&self, renderer: &Renderer) {
        renderer.destroy(self.inner.start);
        renderer.destroy(self.inner.end);
        self.inner.state.set(SlotState::Removed);
    }

    /// Drops everything at once, without exit tasks: the enclosing view is
    /// being released.
    pub(crate) fn teardown(&self, renderer: &Renderer) {
        self.inner.state.set(SlotState::Removed);
        let pieces = std::mem::take(&mut *self.inner.pieces.borrow_mut());
        for piece in pieces {
            let nodes = piece.nodes(&renderer.dom().borrow());
            for node in nodes {
                renderer.unbrand(node);
            }
            release(renderer, piece);
        }
        renderer.destroy(self.inner.start);
        renderer.destroy(self.inner.end);
    }

    fn insert(&self, renderer: &Renderer, content: Content, reference: NodeId) -> Option<Piece> {
        let (piece, nodes) = {
            let mut tree = renderer.dom().borrow_mut();
            let parent = tree.parent(reference)?;
            let piece = match content {
                Content::Empty => return None,
                Content::Text(text) => Piece::Node(tree.create_text(&text)),
                Content::View(view) => Piece::View(view),
            };
            let nodes = piece.nodes(&tree);
            for &node in &nodes {
                tree.insert_before(parent, node, Some(reference));
            }
            (piece, nodes)
        };
        for node in nodes {
            renderer.brand(node, self.weak());
        }
        Some(piece)
    }

    /// Runs the exit tasks of every top-level node and detaches each piece
    /// once its own tasks have settled. Pieces settle independently.
    fn dispose(&self, renderer: &Renderer, pieces: Vec<Piece>) {
        for piece in pieces {
            let nodes = piece.nodes(&renderer.dom().borrow());
            for &node in &nodes {
                renderer.unbrand(node);
            }
            let exits: Vec<ExitFuture> = nodes
                .iter()
                .filter_map(|&node| renderer.exit_for(node).and_then(|exit| exit(node)))
                .collect();
            if exits.is_empty() {
                release(renderer, piece);
                continue;
            }

            self.inner.leaving.borrow_mut().extend(nodes.iter().copied());
            let weak_renderer = renderer.downgrade();
            let slot = self.weak();
            let settling = async move {
                for result in future::join_all(exits).await {
                    if let Err(err) = result {
                        tracing::warn!(%err, "exit task failed; detaching anyway");
                    }
                }
                if let Some(renderer) = weak_renderer.upgrade() {
                    release(&renderer, piece);
                }
                if let Some(slot) = slot.upgrade() {
                    let mut leaving = slot.leaving.borrow_mut();
                    for node in &nodes {
                        leaving.remove(node);
                    }
                }
            }
            .boxed_local()
            .shared();
            weft_scheduler::spawn_local(settling.clone());
            let mut pending = self.inner.pending.borrow_mut();
            pending.retain(|settling| settling.peek().is_none());
            pending.push(settling);
        }
    }
}

/// Takes a piece out of the tree for good. Slot-made nodes are freed. A
/// view goes back to its own fragment, and is released unless someone
/// still holds it.
fn release(renderer: &Renderer, piece: Piece) {
    match piece {
        Piece::Node(node) => renderer.destroy(node),
        Piece::View(view) => {
            renderer.unmount(&view);
            renderer.release_view(view);
        }
    }
}

struct SlotListInner {
    renderer: WeakRenderer,
    start: NodeId,
    end: NodeId,
    slots: RefCell<Vec<Slot>>,
}

/// One slot per item of a list, in list order.
#[derive(Clone)]
pub struct SlotList {
    inner: Rc<SlotListInner>,
}

impl SlotList {
    /// Builds a slot per current item. See [`SlotList::follow`].
    pub(crate) fn before(
        renderer: &Renderer,
        parent: NodeId,
        reference: Option<NodeId>,
        list: &dyn DynList,
    ) -> Self {
        let (start, end) = {
            let mut tree = renderer.dom().borrow_mut();
            let start = tree.create_comment("");
            let end = tree.create_comment("");
            tree.insert_before(parent, start, reference);
            tree.insert_before(parent, end, reference);
            (start, end)
        };
        let slots = Self {
            inner: Rc::new(SlotListInner {
                renderer: renderer.downgrade(),
                start,
                end,
                slots: RefCell::new(Vec::new()),
            }),
        };
        slots.apply(0, 0, list.contents());
        slots
    }

    /// Applies every later edit of `list`. The subscription keeps the slot
    /// list alive until it is unobserved.
    pub(crate) fn follow(&self, list: &dyn DynList) -> SubscriberId {
        let target = self.clone();
        list.observe(Rc::new(
            move |start: usize, delete_count: usize, inserted: Vec<Content>| {
                target.apply(start, delete_count, inserted)
            },
        ))
    }

    pub(crate) fn teardown(&self, renderer: &Renderer) {
        let slots = std::mem::take(&mut *self.inner.slots.borrow_mut());
        for slot in slots {
            slot.teardown(renderer);
        }
        renderer.destroy(self.inner.start);
        renderer.destroy(self.inner.end);
    }

    /// Removes `delete_count` slots at `start` and inserts one new slot per
    /// content item there. Removed slots dispose in the background.
    pub fn apply(&self, start: usize, delete_count: usize, contents: Vec<Content>) {
        let Some(renderer) = self.inner.renderer.upgrade() else {
            return;
        };
        let removed: Vec<Slot> = {
            let mut slots = self.inner.slots.borrow_mut();
            let lo = start.min(slots.len());
            let hi = start.saturating_add(delete_count).min(slots.len());
            slots.drain(lo..hi).collect()
        };
        for slot in removed {
            weft_scheduler::spawn_local(slot.remove());
        }

        let at = start.min(self.inner.slots.borrow().len());
        let reference = self
            .inner
            .slots
            .borrow()
            .get(at)
            .map_or(self.inner.end, Slot::start);
        let Some(parent) = renderer.dom().borrow().parent(self.inner.start) else {
            return;
        };
        let created: Vec<Slot> = contents
            .into_iter()
            .map(|content| {
                let slot = Slot::before(&renderer, parent, Some(reference));
                slot.update(content);
                slot
            })
            .collect();
        self.inner.slots.borrow_mut().splice(at..at, created);
    }

    pub fn len(&self) -> usize {
        self.inner.slots.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn slots(&self) -> Vec<Slot> {
        self.inner.slots.borrow().clone()
    }

    pub fn start(&self) -> NodeId {
        self.inner.start
    }

    pub fn end(&self) -> NodeId {
        self.inner.end
    }
}
