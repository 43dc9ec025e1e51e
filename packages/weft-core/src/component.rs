//! Custom elements backed by Rust types.
//!
//! A component type is registered once per renderer under a kebab-case
//! element name derived from its type name. Every element with that tag is
//! upgraded after it is rendered: a fresh instance renders into the element's
//! shadow root.

use crate::content::View;
use crate::dom::NodeId;
use crate::error::TemplateError;
use crate::namespace::NamespaceTable;
use crate::renderer::{Renderer, WeakRenderer};
use crate::template::Template;
use rustc_hash::FxHashMap;
use std::any::{TypeId, type_name};
use std::fmt;
use std::rc::Rc;
use weft_signals::Value;

pub trait Component: 'static {
    fn render(&self, host: &Host) -> Result<View, TemplateError>;

    /// Adjusts the namespace table used for this component's templates.
    fn namespaces(&self, _table: &mut NamespaceTable) {}
}

/// The element name a component type was registered under. Interpolate it
/// in tag position: `xml!("<{}></{}>", tag, tag)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ComponentTag {
    name: Rc<str>,
    type_id: TypeId,
}

impl ComponentTag {
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for ComponentTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

pub(crate) type Factory = Rc<dyn Fn() -> Rc<dyn Component>>;

#[derive(Default)]
pub(crate) struct Registry {
    tags: FxHashMap<TypeId, ComponentTag>,
    factories: FxHashMap<Rc<str>, Factory>,
}

impl Registry {
    /// Registers `C` and returns its tag. Registering the same type again
    /// keeps the first factory.
    pub(crate) fn define<C: Component>(&mut self, factory: Factory) -> ComponentTag {
        let type_id = TypeId::of::<C>();
        if let Some(tag) = self.tags.get(&type_id) {
            return tag.clone();
        }
        let base = element_name::<C>();
        let mut name = base.clone();
        let mut suffix = 2;
        while self.factories.contains_key(name.as_str()) {
            name = format!("{base}-{suffix}");
            suffix += 1;
        }
        let tag = ComponentTag {
            name: Rc::from(name),
            type_id,
        };
        tracing::debug!(component = type_name::<C>(), tag = %tag, "component defined");
        self.factories.insert(tag.name.clone(), factory);
        self.tags.insert(type_id, tag.clone());
        tag
    }

    pub(crate) fn contains(&self, tag: &ComponentTag) -> bool {
        self.tags.get(&tag.type_id) == Some(tag)
    }

    pub(crate) fn tag_of(&self, type_id: TypeId) -> Option<ComponentTag> {
        self.tags.get(&type_id).cloned()
    }

    pub(crate) fn factory(&self, name: &str) -> Option<Factory> {
        self.factories.get(name).cloned()
    }
}

/// `TimesheetReminder` becomes `timesheet-reminder`. A single-word name is
/// prefixed, since element names need a hyphen: `Clock` becomes
/// `weft-clock`.
pub fn element_name<C: ?Sized>() -> String {
    let full = type_name::<C>();
    let path = full.split('<').next().unwrap_or(full);
    let short = path.rsplit("::").next().unwrap_or(path);

    let chars: Vec<char> = short.chars().collect();
    let mut name = String::with_capacity(short.len() + 4);
    for (index, &ch) in chars.iter().enumerate() {
        if ch == '_' {
            name.push('-');
            continue;
        }
        if ch.is_uppercase() && index > 0 {
            let prev = chars[index - 1];
            let next_lower = chars.get(index + 1).is_some_and(|c| c.is_lowercase());
            if prev.is_lowercase() || prev.is_ascii_digit() || (prev.is_uppercase() && next_lower)
            {
                name.push('-');
            }
        }
        name.extend(ch.to_lowercase());
    }
    if name.contains('-') {
        name
    } else {
        format!("weft-{name}")
    }
}

/// What a component instance sees of its element.
#[derive(Clone)]
pub struct Host {
    renderer: WeakRenderer,
    element: NodeId,
    namespaces: NamespaceTable,
}

impl Host {
    pub(crate) fn new(renderer: &Renderer, element: NodeId, namespaces: NamespaceTable) -> Self {
        Self {
            renderer: renderer.downgrade(),
            element,
            namespaces,
        }
    }

    pub fn element(&self) -> NodeId {
        self.element
    }

    pub fn renderer(&self) -> Option<Renderer> {
        self.renderer.upgrade()
    }

    pub fn namespaces(&self) -> &NamespaceTable {
        &self.namespaces
    }

    /// Renders with this component's namespace table.
    pub fn render(&self, template: Template) -> Result<View, TemplateError> {
        let renderer = self.renderer.upgrade().ok_or(TemplateError::RendererGone)?;
        renderer.render_with(template, &self.namespaces)
    }

    pub fn attribute(&self, name: &str) -> Option<String> {
        let renderer = self.renderer.upgrade()?;
        let tree = renderer.dom().borrow();
        tree.attribute(self.element, name).map(str::to_string)
    }

    pub fn property(&self, name: &str) -> Option<Value> {
        let renderer = self.renderer.upgrade()?;
        let tree = renderer.dom().borrow();
        tree.property(self.element, name)
    }
}
