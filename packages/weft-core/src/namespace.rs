//! Routing of `prefix:name` attributes to handlers.
//!
//! Every attribute site of a template (an attribute with an interpolated
//! value, or any prefixed attribute) goes through a [`NamespaceTable`]. The
//! part before the first `:` picks the handler. Unprefixed attributes and
//! unknown prefixes are treated as plain attributes under their full name.

use crate::content::{DynCell, Interp};
use crate::dom::{Dom, Event, ListenerOptions, NodeId};
use crate::error::TemplateError;
use crate::renderer::Renderer;
use crate::scope::Scope;
use rustc_hash::FxHashMap;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use weft_signals::Value;

type Finalizer = Box<dyn FnOnce()>;

/// Where a handler is binding.
pub struct BindContext<'a> {
    pub renderer: &'a Renderer,
    pub element: NodeId,
    /// Attribute name without the prefix.
    pub name: &'a str,
    scope: &'a Scope,
    finalizers: &'a RefCell<Vec<Finalizer>>,
}

impl<'a> BindContext<'a> {
    pub(crate) fn new(
        renderer: &'a Renderer,
        element: NodeId,
        name: &'a str,
        scope: &'a Scope,
        finalizers: &'a RefCell<Vec<Finalizer>>,
    ) -> Self {
        Self {
            renderer,
            element,
            name,
            scope,
            finalizers,
        }
    }

    /// Runs `f` once the whole template has been hooked up.
    pub fn after_render(&self, f: impl FnOnce() + 'static) {
        self.finalizers.borrow_mut().push(Box::new(f));
    }

    /// Runs `f` when the rendered view is released. Unbind subscriptions
    /// made by the handler here.
    pub fn on_teardown(&self, f: impl FnOnce() + 'static) {
        self.scope.on_teardown(f);
    }

    pub fn dom(&self) -> &Dom {
        self.renderer.dom()
    }

    fn invalid(&self, value: &Interp) -> TemplateError {
        TemplateError::InvalidBinding {
            name: self.name.to_string(),
            found: value.kind(),
        }
    }
}

pub type NamespaceHandler = Rc<dyn Fn(&BindContext<'_>, Interp) -> Result<(), TemplateError>>;

#[derive(Clone)]
pub struct NamespaceTable {
    handlers: FxHashMap<String, NamespaceHandler>,
}

impl fmt::Debug for NamespaceTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut prefixes: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        prefixes.sort_unstable();
        f.debug_struct("NamespaceTable")
            .field("prefixes", &prefixes)
            .finish()
    }
}

impl Default for NamespaceTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl NamespaceTable {
    /// A table with no handlers. Everything binds as a plain attribute.
    pub fn empty() -> Self {
        Self {
            handlers: FxHashMap::default(),
        }
    }

    /// `attr:`, `prop:`, `call:`, `on:` and `weft:`.
    pub fn builtin() -> Self {
        let mut table = Self::empty();
        table.register("", bind_attribute);
        table.register("attr", bind_attribute);
        table.register("prop", bind_property);
        table.register("call", bind_call);
        table.register("on", bind_listener);
        table.register("weft", bind_control);
        table
    }

    /// Installs `handler` for `prefix`, replacing any previous one.
    pub fn register(
        &mut self,
        prefix: &str,
        handler: impl Fn(&BindContext<'_>, Interp) -> Result<(), TemplateError> + 'static,
    ) {
        self.handlers.insert(prefix.to_string(), Rc::new(handler));
    }

    pub fn unregister(&mut self, prefix: &str) -> bool {
        self.handlers.remove(prefix).is_some()
    }

    pub fn get(&self, prefix: &str) -> Option<NamespaceHandler> {
        self.handlers.get(prefix).cloned()
    }

    pub fn contains(&self, prefix: &str) -> bool {
        self.handlers.contains_key(prefix)
    }

    pub(crate) fn dispatch(
        &self,
        renderer: &Renderer,
        element: NodeId,
        qualified: &str,
        value: Interp,
        scope: &Scope,
        finalizers: &RefCell<Vec<Finalizer>>,
    ) -> Result<(), TemplateError> {
        let routed = qualified
            .split_once(':')
            .filter(|(prefix, _)| !prefix.is_empty())
            .and_then(|(prefix, name)| self.get(prefix).map(|handler| (handler, name)));
        let (handler, name) = match routed {
            Some(found) => found,
            None => match self.get("") {
                Some(handler) => (handler, qualified),
                None => (Rc::new(bind_attribute) as NamespaceHandler, qualified),
            },
        };
        let ctx = BindContext::new(renderer, element, name, scope, finalizers);
        handler(&ctx, value)
    }
}

fn set_attribute(dom: &Dom, element: NodeId, name: &str, value: &Value) {
    let mut tree = dom.borrow_mut();
    match value {
        Value::Null | Value::Bool(false) => tree.remove_attribute(element, name),
        Value::Bool(true) => tree.set_attribute(element, name, ""),
        other => tree.set_attribute(element, name, &other.to_string()),
    }
}

/// Applies the current value of `cell` with `apply`, then again after every
/// change until the view is released.
fn follow(
    ctx: &BindContext<'_>,
    cell: &Rc<dyn DynCell>,
    apply: impl Fn(&Dom, NodeId, &str, &Value) + 'static,
) -> weft_signals::SubscriberId {
    apply(ctx.dom(), ctx.element, ctx.name, &cell.value());
    let dom = Rc::downgrade(ctx.dom());
    let element = ctx.element;
    let name = ctx.name.to_string();
    let id = cell.on_value(Rc::new(move |value: Value| {
        if let Some(dom) = dom.upgrade() {
            apply(&dom, element, &name, &value);
        }
    }));
    let source = cell.clone();
    ctx.on_teardown(move || {
        source.unobserve(id);
    });
    id
}

fn bind_attribute(ctx: &BindContext<'_>, value: Interp) -> Result<(), TemplateError> {
    match value {
        Interp::Static(value) => {
            set_attribute(ctx.dom(), ctx.element, ctx.name, &value);
            Ok(())
        }
        Interp::Cell(cell) => {
            follow(ctx, &cell, set_attribute);
            Ok(())
        }
        other => Err(ctx.invalid(&other)),
    }
}

/// Properties that flow back into their cell, and the event that signals it.
const TWO_WAY: &[(&str, &str)] = &[
    ("value", "input"),
    ("checked", "change"),
    ("selectedIndex", "change"),
    ("valueAsNumber", "input"),
];

fn set_property(dom: &Dom, element: NodeId, name: &str, value: &Value) {
    dom.borrow_mut().set_property(element, name, value.clone());
}

fn bind_property(ctx: &BindContext<'_>, value: Interp) -> Result<(), TemplateError> {
    let cell = match value {
        Interp::Static(value) => {
            set_property(ctx.dom(), ctx.element, ctx.name, &value);
            return Ok(());
        }
        Interp::Cell(cell) => cell,
        other => return Err(ctx.invalid(&other)),
    };

    let own = follow(ctx, &cell, set_property);
    let Some(&(property, event)) = TWO_WAY
        .iter()
        .find(|(property, _)| property.eq_ignore_ascii_case(ctx.name))
    else {
        return Ok(());
    };

    let dom = Rc::downgrade(ctx.dom());
    let element = ctx.element;
    let name = ctx.name.to_string();
    let listener = Rc::new(move |_: &Event| {
        let Some(dom) = dom.upgrade() else {
            return;
        };
        let current = dom.borrow().property(element, &name);
        let Some(current) = current else {
            return;
        };
        if !cell.assign(&current, &[own]) {
            tracing::warn!(property, %current, "property value does not fit its cell");
        }
    });
    ctx.dom()
        .borrow_mut()
        .add_listener(element, event, listener, ListenerOptions::default());
    Ok(())
}

fn call_method(dom: &Dom, element: NodeId, name: &str, value: &Value) {
    let args = match value {
        Value::List(list) => list.to_vec(),
        other => vec![other.clone()],
    };
    dom.borrow_mut().call_method(element, name, args);
}

fn bind_call(ctx: &BindContext<'_>, value: Interp) -> Result<(), TemplateError> {
    match value {
        Interp::Static(value) => {
            call_method(ctx.dom(), ctx.element, ctx.name, &value);
            Ok(())
        }
        Interp::Cell(cell) => {
            follow(ctx, &cell, call_method);
            Ok(())
        }
        other => Err(ctx.invalid(&other)),
    }
}

fn bind_listener(ctx: &BindContext<'_>, value: Interp) -> Result<(), TemplateError> {
    match value {
        Interp::Handler(listener, options) => {
            ctx.dom()
                .borrow_mut()
                .add_listener(ctx.element, ctx.name, listener, options);
            Ok(())
        }
        other => Err(ctx.invalid(&other)),
    }
}

fn bind_control(ctx: &BindContext<'_>, value: Interp) -> Result<(), TemplateError> {
    let element = ctx.element;
    match (ctx.name, value) {
        ("created", Interp::Created(callback)) => {
            ctx.after_render(move || callback(element));
            Ok(())
        }
        ("exit", Interp::Exit(exit)) => {
            ctx.renderer.register_exit(element, exit);
            Ok(())
        }
        ("ref", Interp::Ref(node_ref)) => {
            ctx.after_render(move || node_ref.resolve(element));
            Ok(())
        }
        ("ref", _) => Err(TemplateError::InvalidRef),
        ("created" | "exit", other) => Err(ctx.invalid(&other)),
        (key, _) => Err(TemplateError::UnknownControl(key.to_string())),
    }
}
