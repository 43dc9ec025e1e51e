//! Entry point: owns the tree, the template cache and the component
//! registry.

use crate::component::{Component, ComponentTag, Factory, Host, Registry};
use crate::content::{Content, ExitFn, Interp, View};
use crate::dom::{Dom, DomTree, NodeId};
use crate::error::TemplateError;
use crate::namespace::NamespaceTable;
use crate::slot::{Slot, SlotInner};
use crate::template::compile::{self, CompiledTemplate, PENDING_ATTR, TagValue};
use crate::template::{Mode, Template, hookup};
use rustc_hash::FxHashMap;
use std::any::TypeId;
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

/// Compiled templates are keyed by the identity of their `'static` source.
type CacheKey = (usize, usize, Mode);

/// Counters for tests and diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Profiling {
    pub renders: u64,
    pub compiles: u64,
    pub cache_hits: u64,
    pub upgrades: u64,
}

struct RendererInner {
    dom: Dom,
    namespaces: NamespaceTable,
    cache: RefCell<FxHashMap<CacheKey, Rc<CompiledTemplate>>>,
    registry: RefCell<Registry>,
    exits: RefCell<FxHashMap<NodeId, ExitFn>>,
    owners: RefCell<FxHashMap<NodeId, Weak<SlotInner>>>,
    instances: RefCell<FxHashMap<NodeId, Instance>>,
    profiling: Cell<Profiling>,
}

struct Instance {
    component: Rc<dyn Component>,
    // What the component rendered into its shadow root.
    view: Option<View>,
}

#[derive(Clone)]
pub struct Renderer {
    inner: Rc<RendererInner>,
}

#[derive(Clone)]
pub struct WeakRenderer {
    inner: Weak<RendererInner>,
}

impl WeakRenderer {
    pub fn upgrade(&self) -> Option<Renderer> {
        self.inner.upgrade().map(|inner| Renderer { inner })
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer {
    pub fn new() -> Self {
        Self::with_dom(DomTree::shared())
    }

    pub fn with_dom(dom: Dom) -> Self {
        Self::with_namespaces(dom, NamespaceTable::builtin())
    }

    pub fn with_namespaces(dom: Dom, namespaces: NamespaceTable) -> Self {
        Self {
            inner: Rc::new(RendererInner {
                dom,
                namespaces,
                cache: RefCell::new(FxHashMap::default()),
                registry: RefCell::new(Registry::default()),
                exits: RefCell::new(FxHashMap::default()),
                owners: RefCell::new(FxHashMap::default()),
                instances: RefCell::new(FxHashMap::default()),
                profiling: Cell::new(Profiling::default()),
            }),
        }
    }

    pub fn dom(&self) -> &Dom {
        &self.inner.dom
    }

    pub fn namespaces(&self) -> &NamespaceTable {
        &self.inner.namespaces
    }

    pub fn downgrade(&self) -> WeakRenderer {
        WeakRenderer {
            inner: Rc::downgrade(&self.inner),
        }
    }

    pub fn profiling(&self) -> Profiling {
        self.inner.profiling.get()
    }

    fn count(&self, bump: impl FnOnce(&mut Profiling)) {
        let mut profiling = self.inner.profiling.get();
        bump(&mut profiling);
        self.inner.profiling.set(profiling);
    }

    /// Renders `template` into a detached view with the default namespaces.
    pub fn render(&self, template: Template) -> Result<View, TemplateError> {
        self.render_with(template, &self.inner.namespaces)
    }

    pub fn render_with(
        &self,
        template: Template,
        namespaces: &NamespaceTable,
    ) -> Result<View, TemplateError> {
        let Template {
            source,
            values,
            mode,
        } = template;
        let compiled = self.compiled(source, mode, &values)?;
        {
            let registry = self.inner.registry.borrow();
            let unregistered = compiled.tag_values.values().find_map(|tag| match tag {
                TagValue::Component(tag) if !registry.contains(tag) => Some(tag),
                _ => None,
            });
            if let Some(tag) = unregistered {
                return Err(TemplateError::UnregisteredComponent(tag.name().to_string()));
            }
        }
        self.count(|p| p.renders += 1);
        hookup::instantiate(self, &compiled, values, namespaces)
    }

    fn compiled(
        &self,
        source: &'static str,
        mode: Mode,
        values: &[Interp],
    ) -> Result<Rc<CompiledTemplate>, TemplateError> {
        let key = (source.as_ptr() as usize, source.len(), mode);
        let cached = self.inner.cache.borrow().get(&key).cloned();
        if let Some(compiled) = cached {
            if compiled.matches(values) {
                self.count(|p| p.cache_hits += 1);
                return Ok(compiled);
            }
            tracing::debug!("tag-position values changed, recompiling");
        }

        let segments = compile::split_source(source);
        let expected = segments.len() - 1;
        if values.len() != expected {
            return Err(TemplateError::ArityMismatch {
                expected,
                found: values.len(),
            });
        }
        let positions = compile::tag_positions(&segments);
        let tags = compile::tag_values(&positions, values)?;
        let compiled = Rc::new(compile::compile(&segments, tags, mode)?);
        self.count(|p| p.compiles += 1);
        self.inner.cache.borrow_mut().insert(key, compiled.clone());
        Ok(compiled)
    }

    /// Appends the view's nodes to `parent`.
    pub fn mount(&self, parent: NodeId, view: &View) {
        let mut tree = self.inner.dom.borrow_mut();
        for node in view.nodes(&tree) {
            tree.append_child(parent, node);
        }
    }

    /// Moves the view's nodes back into its own fragment.
    pub fn unmount(&self, view: &View) {
        let mut tree = self.inner.dom.borrow_mut();
        for node in view.nodes(&tree) {
            tree.append_child(view.fragment(), node);
        }
    }

    pub fn define<C: Component + Default>(&self) -> ComponentTag {
        self.define_with(C::default)
    }

    pub fn define_with<C: Component>(&self, factory: impl Fn() -> C + 'static) -> ComponentTag {
        let factory: Factory = Rc::new(move || Rc::new(factory()) as Rc<dyn Component>);
        self.inner.registry.borrow_mut().define::<C>(factory)
    }

    pub fn tag_of<C: Component>(&self) -> Option<ComponentTag> {
        self.inner.registry.borrow().tag_of(TypeId::of::<C>())
    }

    pub(crate) fn is_component(&self, name: &str) -> bool {
        self.inner.registry.borrow().factory(name).is_some()
    }

    /// The component instance upgraded onto `element`, if any.
    pub fn instance(&self, element: NodeId) -> Option<Rc<dyn Component>> {
        self.inner
            .instances
            .borrow()
            .get(&element)
            .map(|instance| instance.component.clone())
    }

    /// Creates the component instance for `element` and renders it into the
    /// element's shadow root. Elements that are not components, or already
    /// upgraded, are left alone.
    pub(crate) fn upgrade(&self, element: NodeId) -> Result<(), TemplateError> {
        if self.inner.instances.borrow().contains_key(&element) {
            return Ok(());
        }
        let Some(name) = self.inner.dom.borrow().tag(element).map(str::to_string) else {
            return Ok(());
        };
        let Some(factory) = self.inner.registry.borrow().factory(&name) else {
            return Ok(());
        };
        let component = factory();
        self.inner.instances.borrow_mut().insert(
            element,
            Instance {
                component: component.clone(),
                view: None,
            },
        );

        let mut namespaces = self.inner.namespaces.clone();
        component.namespaces(&mut namespaces);
        let host = Host::new(self, element, namespaces);
        let view = component.render(&host)?;
        let root = self.inner.dom.borrow_mut().attach_shadow(element);
        if let Some(root) = root {
            self.mount(root, &view);
        }
        if let Some(instance) = self.inner.instances.borrow_mut().get_mut(&element) {
            instance.view = Some(view);
        }
        self.count(|p| p.upgrades += 1);
        tracing::debug!(component = %name, ?element, "component upgraded");
        Ok(())
    }

    /// Replaces a loading placeholder with the resolved component element.
    /// Attributes and children carry over.
    pub(crate) fn swap_pending(
        &self,
        loading: NodeId,
        tag: &ComponentTag,
    ) -> Result<(), TemplateError> {
        if !self.inner.registry.borrow().contains(tag) {
            return Err(TemplateError::UnregisteredComponent(tag.name().to_string()));
        }
        let element = {
            let mut tree = self.inner.dom.borrow_mut();
            let Some(parent) = tree.parent(loading) else {
                tracing::debug!(?loading, "loading element left the tree before resolving");
                return Ok(());
            };
            let namespace = tree
                .element(loading)
                .and_then(|el| el.namespace.clone());
            let element = tree.create_element(tag.name(), namespace.as_deref());
            for (name, value) in tree.attributes(loading) {
                if name != PENDING_ATTR {
                    tree.set_attribute(element, &name, &value);
                }
            }
            for child in tree.children(loading) {
                tree.append_child(element, child);
            }
            tree.insert_before(parent, element, Some(loading));
            element
        };
        if let Some(slot) = self.owner_of(loading) {
            self.unbrand(loading);
            self.brand(element, slot.weak());
        }
        let exit = self.inner.exits.borrow_mut().remove(&loading);
        if let Some(exit) = exit {
            self.register_exit(element, exit);
        }
        self.destroy(loading);
        self.upgrade(element)
    }

    pub(crate) fn register_exit(&self, element: NodeId, exit: ExitFn) {
        self.inner.exits.borrow_mut().insert(element, exit);
    }

    pub(crate) fn exit_for(&self, node: NodeId) -> Option<ExitFn> {
        self.inner.exits.borrow().get(&node).cloned()
    }

    pub(crate) fn brand(&self, node: NodeId, slot: Weak<SlotInner>) {
        self.inner.owners.borrow_mut().insert(node, slot);
    }

    pub(crate) fn unbrand(&self, node: NodeId) {
        self.inner.owners.borrow_mut().remove(&node);
    }

    /// The slot that inserted `node`, if it still holds it.
    pub fn owner_of(&self, node: NodeId) -> Option<Slot> {
        let owner = self.inner.owners.borrow().get(&node)?.upgrade()?;
        Some(Slot::from_inner(owner))
    }

    /// Lets a node swap itself for new content through its owning slot.
    pub fn replace_node(&self, node: NodeId, content: Content) -> Result<(), TemplateError> {
        let slot = self.owner_of(node).ok_or(TemplateError::NotTracked)?;
        slot.replace_item(node, content)
    }

    /// Frees `node` and its subtree, forgetting every exit, brand and
    /// component instance attached to the freed nodes.
    pub(crate) fn destroy(&self, node: NodeId) {
        let freed = self.inner.dom.borrow_mut().destroy(node);
        if freed.is_empty() {
            return;
        }
        let mut released = Vec::new();
        {
            let mut exits = self.inner.exits.borrow_mut();
            let mut owners = self.inner.owners.borrow_mut();
            let mut instances = self.inner.instances.borrow_mut();
            for id in &freed {
                exits.remove(id);
                owners.remove(id);
                if let Some(instance) = instances.remove(id) {
                    released.extend(instance.view);
                }
            }
        }
        for view in released {
            self.release_view(view);
        }
    }

    /// Tears down a view that no one else holds: its subscriptions are
    /// unbound and its nodes freed. Views still held elsewhere are kept so
    /// they can be inserted again.
    pub(crate) fn release_view(&self, view: View) {
        if !view.is_last() {
            return;
        }
        view.scope().teardown(self);
        let nodes = view.nodes(&self.inner.dom.borrow());
        for node in nodes {
            self.destroy(node);
        }
        self.destroy(view.fragment());
        tracing::trace!(fragment = ?view.fragment(), "view released");
    }

    /// Number of exit callbacks and component instances still registered.
    pub fn registered(&self) -> (usize, usize) {
        (
            self.inner.exits.borrow().len(),
            self.inner.instances.borrow().len(),
        )
    }
}
