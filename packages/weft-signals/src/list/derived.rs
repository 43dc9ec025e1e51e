//! Read-only views that follow a source list edit by edit.
//!
//! A view is kept alive by its subscription on the source and holds the
//! source only weakly.

use super::{ListEdit, ObservableList};
use crate::cell::IndexHandle;
use crate::deep::Adopt;
use crate::error::ListError;
use crate::subscriber::Watch;
use std::cell::RefCell;
use std::rc::Rc;

fn forward<T: Adopt>(
    target: &ObservableList<T>,
    start: usize,
    delete_count: usize,
    inserted: Vec<T>,
) {
    if let Err(err) = target.apply(start, delete_count, inserted) {
        tracing::warn!(%err, "derived list out of step with its source");
    }
}

impl<T: Adopt> ObservableList<T> {
    /// Maps every item through `f(item, index_handle, source)`. Each source
    /// edit recomputes exactly the inserted range.
    pub fn map<U, F>(&self, f: F) -> ObservableList<U>
    where
        U: Adopt,
        F: Fn(&T, &IndexHandle, &ObservableList<T>) -> U + 'static,
    {
        let items = self
            .entries()
            .iter()
            .map(|(item, handle)| f(item, handle, self))
            .collect();
        let mapped = ObservableList::derived(items);
        let source = self.downgrade();
        let target = mapped.clone();
        self.subscribe(move |edit| {
            let Some(source) = source.upgrade() else {
                return;
            };
            let inserted = edit
                .inserted
                .iter()
                .zip(&edit.handles)
                .map(|(item, handle)| f(item, handle, &source))
                .collect();
            forward(&target, edit.start, edit.delete_count, inserted);
        });
        mapped
    }

    /// Items passing `predicate`, maintained incrementally.
    ///
    /// A source edit re-evaluates the predicate for the inserted items only.
    /// A change in any of `deps` re-evaluates every item one turn later and
    /// shows or hides exactly the items whose verdict flipped.
    pub fn filter<P>(&self, predicate: P, deps: &[&dyn Watch]) -> ObservableList<T>
    where
        P: Fn(&T, &IndexHandle) -> bool + 'static,
    {
        let mut mask = Vec::new();
        let mut shown = Vec::new();
        let seen = self.entries();
        for (item, handle) in &seen {
            let pass = predicate(item, handle);
            mask.push(MaskEntry {
                shown: pass,
                pos: shown.len(),
            });
            if pass {
                shown.push(item.clone());
            }
        }

        let state = Rc::new(FilterState {
            mask: RefCell::new(mask),
            seen: RefCell::new(seen),
            predicate: Box::new(predicate),
            output: ObservableList::derived(shown),
        });

        let on_edit = state.clone();
        self.subscribe(move |edit| on_edit.apply_edit(edit));
        for dep in deps {
            let state = state.clone();
            dep.watch(Rc::new(move || {
                let state = state.clone();
                weft_scheduler::defer(move || state.recompute());
            }));
        }
        state.output.clone()
    }

    /// Items `start..end`. `end` defaults to `len - 1`, so the last item is
    /// left out unless an explicit end is given.
    ///
    /// The window stays fixed in source positions: edits starting inside it
    /// propagate with their delete count clipped to the window, all others
    /// are ignored.
    pub fn slice(&self, start: usize, end: Option<usize>) -> ObservableList<T> {
        let len = self.len();
        let end = end.unwrap_or(len.saturating_sub(1)).max(start);
        let initial = self.with(|items| {
            let lo = start.min(items.len());
            let hi = end.min(items.len());
            items[lo..hi].to_vec()
        });
        let sliced = ObservableList::derived(initial);
        let target = sliced.clone();
        self.subscribe(move |edit| {
            if edit.start < start || edit.start >= end {
                return;
            }
            let delete_count = edit.delete_count.min(end - edit.start);
            forward(&target, edit.start - start, delete_count, edit.inserted.clone());
        });
        sliced
    }

    /// This list followed by `others`. Each source's running length is
    /// tallied so its edits land at the right offset.
    pub fn concat(&self, others: &[ObservableList<T>]) -> ObservableList<T> {
        let sources: Vec<ObservableList<T>> = std::iter::once(self.clone())
            .chain(others.iter().cloned())
            .collect();
        let tallies = Rc::new(RefCell::new(
            sources.iter().map(ObservableList::len).collect::<Vec<_>>(),
        ));
        let joined = ObservableList::derived(sources.iter().flat_map(ObservableList::to_vec).collect());

        for (position, source) in sources.iter().enumerate() {
            let tallies = tallies.clone();
            let target = joined.clone();
            source.subscribe(move |edit| {
                let offset = {
                    let mut tallies = tallies.borrow_mut();
                    let offset: usize = tallies[..position].iter().sum();
                    let own = &mut tallies[position];
                    *own = own.saturating_sub(edit.delete_count) + edit.inserted.len();
                    offset
                };
                forward(
                    &target,
                    offset + edit.start,
                    edit.delete_count,
                    edit.inserted.clone(),
                );
            });
        }
        joined
    }

    /// Always fails: flattening views are not supported.
    pub fn flat_map<U, F>(&self, _f: F) -> Result<ObservableList<U>, ListError>
    where
        U: Adopt,
        F: Fn(&T) -> Vec<U> + 'static,
    {
        Err(ListError::NotImplemented("flat_map"))
    }
}

#[derive(Debug, Clone, Copy)]
struct MaskEntry {
    shown: bool,
    // Output position if shown, else the position the next shown item takes.
    pos: usize,
}

struct FilterState<T> {
    mask: RefCell<Vec<MaskEntry>>,
    // The source items as of the last delivered edit, parallel to `mask`.
    // Edits still queued on the source are not reflected here.
    seen: RefCell<Vec<(T, IndexHandle)>>,
    predicate: Box<dyn Fn(&T, &IndexHandle) -> bool>,
    output: ObservableList<T>,
}

impl<T: Adopt> FilterState<T> {
    fn apply_edit(&self, edit: &ListEdit<T>) {
        let (out_start, hidden, shown) = {
            let mut mask = self.mask.borrow_mut();
            let start = edit.start.min(mask.len());
            let end = (start + edit.delete_count).min(mask.len());
            let out_start = match start.checked_sub(1).map(|prev| mask[prev]) {
                Some(prev) => prev.pos + usize::from(prev.shown),
                None => 0,
            };
            let hidden = mask[start..end].iter().filter(|entry| entry.shown).count();

            let mut shown = Vec::new();
            let entries: Vec<MaskEntry> = edit
                .inserted
                .iter()
                .zip(&edit.handles)
                .map(|(item, handle)| {
                    let pass = (self.predicate)(item, handle);
                    let entry = MaskEntry {
                        shown: pass,
                        pos: out_start + shown.len(),
                    };
                    if pass {
                        shown.push(item.clone());
                    }
                    entry
                })
                .collect();
            let added = entries.len();
            mask.splice(start..end, entries);
            self.seen.borrow_mut().splice(
                start..end,
                edit.inserted.iter().cloned().zip(edit.handles.iter().cloned()),
            );

            let delta = shown.len() as isize - hidden as isize;
            if delta != 0 {
                for entry in &mut mask[start + added..] {
                    entry.pos = entry.pos.saturating_add_signed(delta);
                }
            }
            (out_start, hidden, shown)
        };
        forward(&self.output, out_start, hidden, shown);
    }

    fn recompute(&self) {
        let seen = self.seen.borrow().clone();
        let mut flips = Vec::new();
        {
            let mut mask = self.mask.borrow_mut();
            let mut pos = 0;
            for ((item, handle), entry) in seen.iter().zip(mask.iter_mut()) {
                let pass = (self.predicate)(item, handle);
                entry.pos = pos;
                if pass != entry.shown {
                    entry.shown = pass;
                    flips.push((pos, pass.then(|| item.clone())));
                }
                if pass {
                    pos += 1;
                }
            }
        }
        tracing::trace!(flips = flips.len(), "filter recomputed");
        for (pos, item) in flips {
            match item {
                Some(item) => forward(&self.output, pos, 0, vec![item]),
                None => forward(&self.output, pos, 1, Vec::new()),
            }
        }
    }
}
