//! In-memory document tree.
//!
//! The engine never talks to a browser directly. It builds and patches a
//! `DomTree` arena, and every write is appended to a [`Mutation`] log that a
//! host adapter can replay. Tests inspect the tree itself.

use crate::mutations::{Mutation, ffi};
use slotmap::{SlotMap, new_key_type};
use smallvec::SmallVec;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::rc::Rc;
use weft_signals::Value;

new_key_type! {
    pub struct NodeId;
}

/// Shared handle to the tree. Never hold a borrow across a call into user
/// code (listeners, exit callbacks, components).
pub type Dom = Rc<RefCell<DomTree>>;

pub type Listener = Rc<dyn Fn(&Event)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListenerOptions {
    pub capture: bool,
    pub once: bool,
    pub passive: bool,
}

#[derive(Debug, Clone)]
pub struct Event {
    pub name: String,
    pub target: NodeId,
    pub current_target: NodeId,
}

pub struct ListenerEntry {
    pub id: ListenerId,
    pub event: String,
    pub callback: Listener,
    pub options: ListenerOptions,
}

pub struct ElementData {
    pub tag: String,
    pub namespace: Option<String>,
    pub attributes: Vec<(String, String)>,
    pub properties: BTreeMap<String, Value>,
    pub listeners: Vec<ListenerEntry>,
    pub calls: Vec<(String, Vec<Value>)>,
    pub shadow_root: Option<NodeId>,
}

pub enum NodeKind {
    Element(ElementData),
    Text(String),
    Comment(String),
    Fragment,
}

pub struct NodeData {
    pub kind: NodeKind,
    pub parent: Option<NodeId>,
    pub children: SmallVec<[NodeId; 4]>,
}

#[derive(Default)]
pub struct DomTree {
    nodes: SlotMap<NodeId, NodeData>,
    mutations: Vec<Mutation>,
    next_listener: u64,
}

impl DomTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> Dom {
        Rc::new(RefCell::new(Self::new()))
    }

    fn insert(&mut self, kind: NodeKind) -> NodeId {
        self.nodes.insert(NodeData {
            kind,
            parent: None,
            children: SmallVec::new(),
        })
    }

    pub fn create_element(&mut self, tag: &str, namespace: Option<&str>) -> NodeId {
        let id = self.insert(NodeKind::Element(ElementData {
            tag: tag.to_string(),
            namespace: namespace.map(str::to_string),
            attributes: Vec::new(),
            properties: BTreeMap::new(),
            listeners: Vec::new(),
            calls: Vec::new(),
            shadow_root: None,
        }));
        self.mutations.push(Mutation::CreateElement {
            name: tag.to_string(),
            ns: namespace.map(str::to_string),
            id: ffi(id),
        });
        id
    }

    pub fn create_text(&mut self, text: &str) -> NodeId {
        let id = self.insert(NodeKind::Text(text.to_string()));
        self.mutations.push(Mutation::CreateTextNode {
            value: text.to_string(),
            id: ffi(id),
        });
        id
    }

    pub fn create_comment(&mut self, text: &str) -> NodeId {
        let id = self.insert(NodeKind::Comment(text.to_string()));
        self.mutations.push(Mutation::CreatePlaceholder { id: ffi(id) });
        id
    }

    pub fn create_fragment(&mut self) -> NodeId {
        let id = self.insert(NodeKind::Fragment);
        self.mutations.push(Mutation::CreateFragment { id: ffi(id) });
        id
    }

    /// Copies a node, and with `deep` its subtree. Like the browser's
    /// `cloneNode`, listeners, method calls and shadow roots are not copied.
    pub fn clone_node(&mut self, id: NodeId, deep: bool) -> Option<NodeId> {
        let copy = match &self.nodes.get(id)?.kind {
            NodeKind::Text(text) => {
                let text = text.clone();
                self.create_text(&text)
            }
            NodeKind::Comment(text) => {
                let text = text.clone();
                self.create_comment(&text)
            }
            NodeKind::Fragment => self.create_fragment(),
            NodeKind::Element(el) => {
                let tag = el.tag.clone();
                let namespace = el.namespace.clone();
                let attributes = el.attributes.clone();
                let properties = el.properties.clone();
                let copy = self.create_element(&tag, namespace.as_deref());
                for (name, value) in &attributes {
                    self.set_attribute(copy, name, value);
                }
                if let Some(el) = self.element_mut(copy) {
                    el.properties = properties;
                }
                copy
            }
        };
        if deep {
            for child in self.children(id) {
                if let Some(child) = self.clone_node(child, true) {
                    self.append_child(copy, child);
                }
            }
        }
        Some(copy)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn node(&self, id: NodeId) -> Option<&NodeData> {
        self.nodes.get(id)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id).and_then(|node| node.parent)
    }

    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.nodes
            .get(id)
            .map(|node| node.children.to_vec())
            .unwrap_or_default()
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let siblings = &self.nodes.get(parent)?.children;
        let index = siblings.iter().position(|&child| child == id)?;
        siblings.get(index + 1).copied()
    }

    pub fn is_fragment(&self, id: NodeId) -> bool {
        matches!(self.nodes.get(id).map(|n| &n.kind), Some(NodeKind::Fragment))
    }

    pub fn tag(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|el| el.tag.as_str())
    }

    pub fn element(&self, id: NodeId) -> Option<&ElementData> {
        match self.nodes.get(id).map(|n| &n.kind) {
            Some(NodeKind::Element(el)) => Some(el),
            _ => None,
        }
    }

    fn element_mut(&mut self, id: NodeId) -> Option<&mut ElementData> {
        match self.nodes.get_mut(id).map(|n| &mut n.kind) {
            Some(NodeKind::Element(el)) => Some(el),
            _ => None,
        }
    }

    pub fn text(&self, id: NodeId) -> Option<&str> {
        match self.nodes.get(id).map(|n| &n.kind) {
            Some(NodeKind::Text(text)) | Some(NodeKind::Comment(text)) => Some(text.as_str()),
            _ => None,
        }
    }

    pub fn set_text(&mut self, id: NodeId, value: &str) {
        if let Some(NodeData {
            kind: NodeKind::Text(text),
            ..
        }) = self.nodes.get_mut(id)
        {
            *text = value.to_string();
            self.mutations.push(Mutation::SetText {
                value: value.to_string(),
                id: ffi(id),
            });
        }
    }

    fn detach(&mut self, id: NodeId) {
        let Some(parent) = self.nodes.get_mut(id).and_then(|node| node.parent.take()) else {
            return;
        };
        if let Some(parent) = self.nodes.get_mut(parent) {
            parent.children.retain(|child| *child != id);
        }
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.insert_before(parent, child, None);
    }

    /// Moves `child` under `parent`, before `reference` (or last). A fragment
    /// child moves its children instead and is left empty.
    pub fn insert_before(&mut self, parent: NodeId, child: NodeId, reference: Option<NodeId>) {
        if !self.contains(parent) || !self.contains(child) || parent == child {
            tracing::warn!(?parent, ?child, "insert_before on a missing node");
            return;
        }
        if self.is_fragment(child) {
            for grandchild in self.children(child) {
                self.insert_before(parent, grandchild, reference);
            }
            return;
        }
        self.detach(child);

        let Some(parent_node) = self.nodes.get_mut(parent) else {
            return;
        };
        let index = reference
            .and_then(|r| parent_node.children.iter().position(|&c| c == r))
            .unwrap_or(parent_node.children.len());
        parent_node.children.insert(index, child);
        if let Some(node) = self.nodes.get_mut(child) {
            node.parent = Some(parent);
        }
        self.mutations.push(Mutation::InsertBefore {
            parent: ffi(parent),
            id: ffi(child),
            reference: reference.map(ffi),
        });
    }

    /// Detaches `id` from its parent. The node stays valid and can be
    /// inserted again.
    pub fn remove(&mut self, id: NodeId) {
        if self.parent(id).is_none() {
            return;
        }
        self.detach(id);
        self.mutations.push(Mutation::Remove { id: ffi(id) });
    }

    /// Detaches `id` and frees it with its whole subtree, shadow roots
    /// included. Returns the freed ids; unknown ids free nothing.
    pub fn destroy(&mut self, id: NodeId) -> Vec<NodeId> {
        if !self.contains(id) {
            return Vec::new();
        }
        self.remove(id);
        let mut freed = Vec::new();
        let mut stack = vec![id];
        while let Some(node) = stack.pop() {
            let Some(data) = self.nodes.remove(node) else {
                continue;
            };
            stack.extend(data.children.iter().copied());
            if let NodeKind::Element(ElementData {
                shadow_root: Some(root),
                ..
            }) = data.kind
            {
                stack.push(root);
            }
            freed.push(node);
        }
        self.mutations.push(Mutation::FreeNode { id: ffi(id) });
        freed
    }

    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id)?
            .attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn attributes(&self, id: NodeId) -> Vec<(String, String)> {
        self.element(id)
            .map(|el| el.attributes.clone())
            .unwrap_or_default()
    }

    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) {
        let Some(el) = self.element_mut(id) else {
            return;
        };
        match el.attributes.iter_mut().find(|(key, _)| key == name) {
            Some((_, current)) => *current = value.to_string(),
            None => el.attributes.push((name.to_string(), value.to_string())),
        }
        self.mutations.push(Mutation::SetAttribute {
            name: name.to_string(),
            value: value.to_string(),
            id: ffi(id),
            ns: None,
        });
    }

    pub fn remove_attribute(&mut self, id: NodeId, name: &str) {
        let Some(el) = self.element_mut(id) else {
            return;
        };
        let before = el.attributes.len();
        el.attributes.retain(|(key, _)| key != name);
        if el.attributes.len() != before {
            self.mutations.push(Mutation::RemoveAttribute {
                name: name.to_string(),
                id: ffi(id),
                ns: None,
            });
        }
    }

    pub fn property(&self, id: NodeId, name: &str) -> Option<Value> {
        self.element(id)?.properties.get(name).cloned()
    }

    pub fn set_property(&mut self, id: NodeId, name: &str, value: Value) {
        let json = value.to_json();
        let Some(el) = self.element_mut(id) else {
            return;
        };
        el.properties.insert(name.to_string(), value);
        self.mutations.push(Mutation::SetProperty {
            name: name.to_string(),
            value: json,
            id: ffi(id),
        });
    }

    /// Records a method invocation on an element.
    pub fn call_method(&mut self, id: NodeId, name: &str, args: Vec<Value>) {
        let json = args.iter().map(Value::to_json).collect();
        let Some(el) = self.element_mut(id) else {
            return;
        };
        el.calls.push((name.to_string(), args));
        self.mutations.push(Mutation::CallMethod {
            name: name.to_string(),
            args: json,
            id: ffi(id),
        });
    }

    pub fn calls(&self, id: NodeId) -> Vec<(String, Vec<Value>)> {
        self.element(id)
            .map(|el| el.calls.clone())
            .unwrap_or_default()
    }

    pub fn add_listener(
        &mut self,
        id: NodeId,
        event: &str,
        callback: Listener,
        options: ListenerOptions,
    ) -> Option<ListenerId> {
        let listener = ListenerId(self.next_listener);
        self.next_listener += 1;
        let el = self.element_mut(id)?;
        el.listeners.push(ListenerEntry {
            id: listener,
            event: event.to_string(),
            callback,
            options,
        });
        self.mutations.push(Mutation::NewEventListener {
            name: event.to_string(),
            id: ffi(id),
        });
        Some(listener)
    }

    pub fn remove_listener(&mut self, id: NodeId, listener: ListenerId) {
        let Some(el) = self.element_mut(id) else {
            return;
        };
        let Some(index) = el.listeners.iter().position(|entry| entry.id == listener) else {
            return;
        };
        let entry = el.listeners.remove(index);
        self.mutations.push(Mutation::RemoveEventListener {
            name: entry.event,
            id: ffi(id),
        });
    }

    pub fn listener_count(&self, id: NodeId, event: &str) -> usize {
        self.element(id)
            .map(|el| el.listeners.iter().filter(|l| l.event == event).count())
            .unwrap_or(0)
    }

    /// Returns the element's isolated subtree root, creating it on first use.
    pub fn attach_shadow(&mut self, host: NodeId) -> Option<NodeId> {
        if let Some(existing) = self.shadow_root(host) {
            return Some(existing);
        }
        self.element(host)?;
        let root = self.insert(NodeKind::Fragment);
        if let Some(el) = self.element_mut(host) {
            el.shadow_root = Some(root);
        }
        self.mutations.push(Mutation::AttachShadow {
            host: ffi(host),
            id: ffi(root),
        });
        Some(root)
    }

    pub fn shadow_root(&self, host: NodeId) -> Option<NodeId> {
        self.element(host)?.shadow_root
    }

    /// Concatenated text of every descendant text node.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        let Some(node) = self.nodes.get(id) else {
            return;
        };
        if let NodeKind::Text(text) = &node.kind {
            out.push_str(text);
        }
        for &child in &node.children {
            self.collect_text(child, out);
        }
    }

    /// Serialises `id` and its subtree. Comments are skipped; a shadow root
    /// is written as a declarative `<template shadowrootmode="open">`.
    pub fn to_markup(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.write_markup(id, &mut out);
        out
    }

    /// Serialises the children of `id` without `id` itself.
    pub fn inner_markup(&self, id: NodeId) -> String {
        let mut out = String::new();
        for child in self.children(id) {
            self.write_markup(child, &mut out);
        }
        out
    }

    fn write_markup(&self, id: NodeId, out: &mut String) {
        let Some(node) = self.nodes.get(id) else {
            return;
        };
        match &node.kind {
            NodeKind::Text(text) => out.push_str(&escape(text, false)),
            NodeKind::Comment(_) => {}
            NodeKind::Fragment => {
                for &child in &node.children {
                    self.write_markup(child, out);
                }
            }
            NodeKind::Element(el) => {
                out.push('<');
                out.push_str(&el.tag);
                for (name, value) in &el.attributes {
                    let _ = write!(out, " {}=\"{}\"", name, escape(value, true));
                }
                out.push('>');
                if let Some(root) = el.shadow_root {
                    out.push_str("<template shadowrootmode=\"open\">");
                    self.write_markup(root, out);
                    out.push_str("</template>");
                }
                for &child in &node.children {
                    self.write_markup(child, out);
                }
                let _ = write!(out, "</{}>", el.tag);
            }
        }
    }

    pub fn drain_mutations(&mut self) -> Vec<Mutation> {
        std::mem::take(&mut self.mutations)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

fn escape(text: &str, attribute: bool) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Dispatches `event` at `target`: capture listeners from the root down,
/// then bubbling listeners from the target up. `once` listeners are removed
/// after their first call. Returns how many listeners ran.
pub fn dispatch(dom: &Dom, target: NodeId, event: &str) -> usize {
    let path = {
        let tree = dom.borrow();
        let mut path = vec![target];
        let mut cursor = tree.parent(target);
        while let Some(node) = cursor {
            path.push(node);
            cursor = tree.parent(node);
        }
        path
    };

    let capture = path.iter().rev().map(|&node| (node, true));
    let bubble = path.iter().map(|&node| (node, false));
    let mut invoked = 0;
    for (node, capturing) in capture.chain(bubble) {
        let selected: Vec<(ListenerId, Listener, bool)> = {
            let tree = dom.borrow();
            let Some(el) = tree.element(node) else {
                continue;
            };
            el.listeners
                .iter()
                .filter(|l| l.event == event && l.options.capture == capturing)
                .map(|l| (l.id, l.callback.clone(), l.options.once))
                .collect()
        };
        for (id, callback, once) in selected {
            if once {
                dom.borrow_mut().remove_listener(node, id);
            }
            callback(&Event {
                name: event.to_string(),
                target,
                current_target: node,
            });
            invoked += 1;
        }
    }
    invoked
}
