//! What can be interpolated into a template, and how it renders.

use crate::component::ComponentTag;
use crate::dom::{DomTree, Event, Listener, ListenerOptions, NodeId};
use crate::error::ExitError;
use crate::scope::Scope;
use futures::future::{FutureExt, LocalBoxFuture, Shared};
use std::fmt;
use std::future::Future;
use std::rc::Rc;
use weft_signals::{Adopt, ObservableCell, ObservableList, SubscriberId, Value};

/// A rendered template: the run of sibling nodes between two anchor
/// comments.
///
/// The anchors never move relative to the content, so the run can be
/// collected again after inner slots have patched it. While not inserted
/// anywhere the nodes live in the view's own fragment, which makes a view
/// re-insertable. Clones share one scope; once a slot drops the last clone
/// the view is released and its nodes freed.
#[derive(Clone)]
pub struct View {
    fragment: NodeId,
    start: NodeId,
    end: NodeId,
    scope: Rc<Scope>,
}

impl View {
    pub(crate) fn new(fragment: NodeId, start: NodeId, end: NodeId, scope: Rc<Scope>) -> Self {
        Self {
            fragment,
            start,
            end,
            scope,
        }
    }

    pub(crate) fn scope(&self) -> &Scope {
        &self.scope
    }

    /// No other clone of this view exists.
    pub(crate) fn is_last(&self) -> bool {
        Rc::strong_count(&self.scope) == 1
    }

    pub fn fragment(&self) -> NodeId {
        self.fragment
    }

    /// Every node of the view in order, anchors included.
    pub fn nodes(&self, dom: &DomTree) -> Vec<NodeId> {
        let mut nodes = vec![self.start];
        let mut cursor = self.start;
        while cursor != self.end {
            match dom.next_sibling(cursor) {
                Some(next) => {
                    nodes.push(next);
                    cursor = next;
                }
                None => break,
            }
        }
        nodes
    }

    /// The view's nodes without its anchors.
    pub fn content(&self, dom: &DomTree) -> Vec<NodeId> {
        let mut nodes = self.nodes(dom);
        nodes.retain(|&node| node != self.start && node != self.end);
        nodes
    }
}

impl PartialEq for View {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.scope, &other.scope)
    }
}

impl Eq for View {}

impl fmt::Debug for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("View")
            .field("fragment", &self.fragment)
            .field("start", &self.start)
            .field("end", &self.end)
            .finish()
    }
}

impl Adopt for View {}

/// Content of a slot.
#[derive(Debug, Clone, PartialEq)]
pub enum Content {
    Empty,
    Text(String),
    View(View),
}

/// Values a cell or list can hold when bound into a template.
pub trait Bindable: Clone + PartialEq + 'static {
    fn to_content(&self) -> Content;

    fn to_value(&self) -> Value;

    /// Converts a value read back from the DOM (two-way bindings).
    fn from_value(_value: &Value) -> Option<Self> {
        None
    }
}

impl Bindable for Value {
    fn to_content(&self) -> Content {
        match self {
            Value::Null => Content::Empty,
            other => Content::Text(other.to_string()),
        }
    }

    fn to_value(&self) -> Value {
        self.clone()
    }

    fn from_value(value: &Value) -> Option<Self> {
        Some(value.clone())
    }
}

impl Bindable for String {
    fn to_content(&self) -> Content {
        Content::Text(self.clone())
    }

    fn to_value(&self) -> Value {
        Value::Text(self.clone())
    }

    fn from_value(value: &Value) -> Option<Self> {
        Some(value.to_string())
    }
}

impl Bindable for &'static str {
    fn to_content(&self) -> Content {
        Content::Text(self.to_string())
    }

    fn to_value(&self) -> Value {
        Value::Text(self.to_string())
    }
}

impl Bindable for bool {
    fn to_content(&self) -> Content {
        Content::Text(self.to_string())
    }

    fn to_value(&self) -> Value {
        Value::Bool(*self)
    }

    fn from_value(value: &Value) -> Option<Self> {
        value.as_bool()
    }
}

impl Bindable for f64 {
    fn to_content(&self) -> Content {
        Content::Text(Value::Number(*self).to_string())
    }

    fn to_value(&self) -> Value {
        Value::Number(*self)
    }

    fn from_value(value: &Value) -> Option<Self> {
        value.as_f64()
    }
}

macro_rules! bindable_integer {
    ($($ty:ty),*) => {
        $(impl Bindable for $ty {
            fn to_content(&self) -> Content {
                Content::Text(self.to_string())
            }

            fn to_value(&self) -> Value {
                Value::Number(*self as f64)
            }

            /// Only whole numbers within the type's range convert.
            fn from_value(value: &Value) -> Option<Self> {
                let n = value.as_f64()?;
                let fits = n.fract() == 0.0
                    && n >= <$ty>::MIN as f64
                    && n < <$ty>::MAX as f64 + 1.0;
                fits.then(|| n as $ty)
            }
        })*
    };
}

bindable_integer!(i32, i64, u32, u64, usize, isize);

impl Bindable for View {
    fn to_content(&self) -> Content {
        Content::View(self.clone())
    }

    fn to_value(&self) -> Value {
        Value::Null
    }
}

impl<T: Bindable> Bindable for Option<T> {
    fn to_content(&self) -> Content {
        self.as_ref().map_or(Content::Empty, T::to_content)
    }

    fn to_value(&self) -> Value {
        self.as_ref().map_or(Value::Null, T::to_value)
    }

    fn from_value(value: &Value) -> Option<Self> {
        if value.is_null() {
            Some(None)
        } else {
            T::from_value(value).map(Some)
        }
    }
}

/// A cell seen through its rendering interface.
pub trait DynCell {
    fn content(&self) -> Content;

    fn value(&self) -> Value;

    /// Calls `f` with the new content after every change.
    fn on_content(&self, f: Rc<dyn Fn(Content)>) -> SubscriberId;

    /// Calls `f` with the new value after every change.
    fn on_value(&self, f: Rc<dyn Fn(Value)>) -> SubscriberId;

    fn unobserve(&self, id: SubscriberId) -> bool;

    /// Writes a value read back from the DOM, skipping `excluded`. Returns
    /// `false` if the value does not convert to the cell's type.
    fn assign(&self, value: &Value, excluded: &[SubscriberId]) -> bool;
}

impl<T: Bindable> DynCell for ObservableCell<T> {
    fn content(&self) -> Content {
        self.with(T::to_content)
    }

    fn value(&self) -> Value {
        self.with(T::to_value)
    }

    fn on_content(&self, f: Rc<dyn Fn(Content)>) -> SubscriberId {
        self.subscribe(move |value: &T| f(value.to_content()))
    }

    fn on_value(&self, f: Rc<dyn Fn(Value)>) -> SubscriberId {
        self.subscribe(move |value: &T| f(value.to_value()))
    }

    fn unobserve(&self, id: SubscriberId) -> bool {
        self.unbind(id)
    }

    fn assign(&self, value: &Value, excluded: &[SubscriberId]) -> bool {
        match T::from_value(value) {
            Some(value) => {
                self.set_excluding(value, excluded);
                true
            }
            None => false,
        }
    }
}

pub type ListObserver = Rc<dyn Fn(usize, usize, Vec<Content>)>;

/// A list seen through its rendering interface.
pub trait DynList {
    fn contents(&self) -> Vec<Content>;

    /// `f(start, delete_count, inserted)` after every edit.
    fn observe(&self, f: ListObserver) -> SubscriberId;

    fn unobserve(&self, id: SubscriberId) -> bool;
}

impl<T: Adopt + Bindable> DynList for ObservableList<T> {
    fn contents(&self) -> Vec<Content> {
        self.with(|items| items.iter().map(T::to_content).collect())
    }

    fn observe(&self, f: ListObserver) -> SubscriberId {
        self.subscribe(move |edit| {
            let inserted = edit.inserted.iter().map(T::to_content).collect();
            f(edit.start, edit.delete_count, inserted)
        })
    }

    fn unobserve(&self, id: SubscriberId) -> bool {
        self.unsubscribe(id)
    }
}

/// Handle filled with the element carrying `weft:ref` once rendering
/// completes.
#[derive(Debug, Clone, Default)]
pub struct NodeRef(ObservableCell<Option<NodeId>>);

impl NodeRef {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<NodeId> {
        self.0.get()
    }

    pub fn cell(&self) -> &ObservableCell<Option<NodeId>> {
        &self.0
    }

    pub(crate) fn resolve(&self, node: NodeId) {
        self.0.set(Some(node));
    }
}

pub type ExitFuture = LocalBoxFuture<'static, Result<(), ExitError>>;

/// Called when a node is about to leave the DOM. A returned future delays
/// the detach until it settles.
pub type ExitFn = Rc<dyn Fn(NodeId) -> Option<ExitFuture>>;

pub type PendingTag = Shared<LocalBoxFuture<'static, ComponentTag>>;

/// One interpolated template value.
#[derive(Clone)]
pub enum Interp {
    Static(Value),
    Cell(Rc<dyn DynCell>),
    List(Rc<dyn DynList>),
    View(View),
    Handler(Listener, ListenerOptions),
    Created(Rc<dyn Fn(NodeId)>),
    Exit(ExitFn),
    Ref(NodeRef),
    Component(ComponentTag),
    Pending(PendingTag),
}

impl Interp {
    pub fn kind(&self) -> &'static str {
        match self {
            Interp::Static(_) => "a plain value",
            Interp::Cell(_) => "a cell",
            Interp::List(_) => "a list",
            Interp::View(_) => "a view",
            Interp::Handler(..) => "an event handler",
            Interp::Created(_) => "a created callback",
            Interp::Exit(_) => "an exit callback",
            Interp::Ref(_) => "a node ref",
            Interp::Component(_) => "a component",
            Interp::Pending(_) => "a pending component",
        }
    }
}

/// An event listener interpolation for `on:` attributes.
pub fn handler(f: impl Fn(&Event) + 'static) -> Interp {
    Interp::Handler(Rc::new(f), ListenerOptions::default())
}

pub fn handler_with(options: ListenerOptions, f: impl Fn(&Event) + 'static) -> Interp {
    Interp::Handler(Rc::new(f), options)
}

/// For `weft:created`: runs with the element after the render completes.
pub fn on_created(f: impl Fn(NodeId) + 'static) -> Interp {
    Interp::Created(Rc::new(f))
}

/// For `weft:exit`.
pub fn on_exit(f: impl Fn(NodeId) -> Option<ExitFuture> + 'static) -> Interp {
    Interp::Exit(Rc::new(f))
}

/// A component chosen later. A loading placeholder stands in until the
/// future resolves.
pub fn pending(tag: impl Future<Output = ComponentTag> + 'static) -> Interp {
    Interp::Pending(tag.boxed_local().shared())
}

impl From<Value> for Interp {
    fn from(value: Value) -> Self {
        Interp::Static(value)
    }
}

impl From<&Value> for Interp {
    fn from(value: &Value) -> Self {
        Interp::Static(value.clone())
    }
}

macro_rules! interp_static {
    ($($ty:ty),*) => {
        $(impl From<$ty> for Interp {
            fn from(value: $ty) -> Self {
                Interp::Static(Value::from(value))
            }
        })*
    };
}

interp_static!(bool, f64, i32, i64, usize, String, &str);

impl From<&String> for Interp {
    fn from(value: &String) -> Self {
        Interp::Static(Value::Text(value.clone()))
    }
}

impl<T: Bindable> From<ObservableCell<T>> for Interp {
    fn from(cell: ObservableCell<T>) -> Self {
        Interp::Cell(Rc::new(cell))
    }
}

impl<T: Bindable> From<&ObservableCell<T>> for Interp {
    fn from(cell: &ObservableCell<T>) -> Self {
        Interp::Cell(Rc::new(cell.clone()))
    }
}

impl<T: Adopt + Bindable> From<ObservableList<T>> for Interp {
    fn from(list: ObservableList<T>) -> Self {
        Interp::List(Rc::new(list))
    }
}

impl<T: Adopt + Bindable> From<&ObservableList<T>> for Interp {
    fn from(list: &ObservableList<T>) -> Self {
        Interp::List(Rc::new(list.clone()))
    }
}

impl From<View> for Interp {
    fn from(view: View) -> Self {
        Interp::View(view)
    }
}

impl From<NodeRef> for Interp {
    fn from(node_ref: NodeRef) -> Self {
        Interp::Ref(node_ref)
    }
}

impl From<&NodeRef> for Interp {
    fn from(node_ref: &NodeRef) -> Self {
        Interp::Ref(node_ref.clone())
    }
}

impl From<ComponentTag> for Interp {
    fn from(tag: ComponentTag) -> Self {
        Interp::Component(tag)
    }
}

impl From<&ComponentTag> for Interp {
    fn from(tag: &ComponentTag) -> Self {
        Interp::Component(tag.clone())
    }
}
