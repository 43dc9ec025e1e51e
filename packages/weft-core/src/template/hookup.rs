//! Instantiates a compiled template and binds its values.

use super::compile::{AttrPart, AttrSite, CompiledTemplate, LOADING_TAG, PENDING_ATTR, TemplateNode};
use crate::content::{Content, DynCell, DynList, Interp, View};
use crate::dom::{DomTree, NodeId};
use crate::error::TemplateError;
use crate::namespace::NamespaceTable;
use crate::renderer::Renderer;
use crate::scope::Scope;
use crate::slot::{Slot, SlotList};
use std::cell::RefCell;
use std::rc::Rc;
use weft_signals::{ObservableCell, Value};

#[derive(Default)]
struct Sites {
    content: Vec<(usize, NodeId)>,
    attributes: Vec<(NodeId, Vec<AttrSite>)>,
    pending: Vec<(usize, NodeId)>,
    components: Vec<NodeId>,
}

pub(crate) fn instantiate(
    renderer: &Renderer,
    compiled: &CompiledTemplate,
    values: Vec<Interp>,
    namespaces: &NamespaceTable,
) -> Result<View, TemplateError> {
    let mut values: Vec<Option<Interp>> = values.into_iter().map(Some).collect();
    let mut sites = Sites::default();
    let (fragment, start, end) = {
        let mut tree = renderer.dom().borrow_mut();
        let fragment = tree.create_fragment();
        let start = tree.create_comment("");
        tree.append_child(fragment, start);
        for node in &compiled.nodes {
            build(renderer, &mut tree, fragment, node, &mut sites);
        }
        let end = tree.create_comment("");
        tree.append_child(fragment, end);
        (fragment, start, end)
    };

    let scope = Rc::new(Scope::default());
    let finalizers = RefCell::new(Vec::new());
    for (element, attribute_sites) in sites.attributes {
        for site in attribute_sites {
            let value = attribute_value(&site, &mut values, &scope)?;
            namespaces.dispatch(renderer, element, &site.name, value, &scope, &finalizers)?;
        }
    }
    for (index, placeholder) in sites.content {
        bind_content(renderer, placeholder, take(&mut values, index), &scope)?;
    }
    for (index, loading) in sites.pending {
        if let Interp::Pending(tag) = take(&mut values, index) {
            let renderer = renderer.downgrade();
            weft_scheduler::spawn_local(async move {
                let tag = tag.await;
                let Some(renderer) = renderer.upgrade() else {
                    return;
                };
                if let Err(err) = renderer.swap_pending(loading, &tag) {
                    tracing::warn!(%err, %tag, "pending component not swapped in");
                }
            });
        }
    }
    for element in sites.components {
        renderer.upgrade(element)?;
    }
    for finalize in finalizers.into_inner() {
        finalize();
    }
    Ok(View::new(fragment, start, end, scope))
}

fn build(
    renderer: &Renderer,
    tree: &mut DomTree,
    parent: NodeId,
    node: &TemplateNode,
    sites: &mut Sites,
) {
    match node {
        TemplateNode::Text(text) => {
            let id = tree.create_text(text);
            tree.append_child(parent, id);
        }
        TemplateNode::Comment(text) => {
            let id = tree.create_comment(text);
            tree.append_child(parent, id);
        }
        TemplateNode::Hole(index) => {
            let id = tree.create_comment("");
            tree.append_child(parent, id);
            sites.content.push((*index, id));
        }
        TemplateNode::Element {
            tag,
            namespace,
            attributes,
            sites: attribute_sites,
            children,
        } => {
            let id = tree.create_element(tag, namespace.as_deref());
            for (name, value) in attributes {
                tree.set_attribute(id, name, value);
            }
            tree.append_child(parent, id);
            if !attribute_sites.is_empty() {
                sites.attributes.push((id, attribute_sites.clone()));
            }
            if tag == LOADING_TAG {
                let index = attributes
                    .iter()
                    .find(|(name, _)| name == PENDING_ATTR)
                    .and_then(|(_, value)| value.parse().ok());
                if let Some(index) = index {
                    sites.pending.push((index, id));
                }
            } else if renderer.is_component(tag) {
                sites.components.push(id);
            }
            for child in children {
                build(renderer, tree, id, child, sites);
            }
        }
    }
}

fn take(values: &mut [Option<Interp>], index: usize) -> Interp {
    values
        .get_mut(index)
        .and_then(Option::take)
        .unwrap_or(Interp::Static(Value::Null))
}

/// A lone hole passes its value through untouched. Anything mixed with
/// literal text becomes a string, live if any part is a cell.
fn attribute_value(
    site: &AttrSite,
    values: &mut [Option<Interp>],
    scope: &Scope,
) -> Result<Interp, TemplateError> {
    if let [AttrPart::Marker(index)] = site.parts.as_slice() {
        return Ok(take(values, *index));
    }
    let mut texts = Vec::with_capacity(site.parts.len());
    let mut cells = Vec::new();
    for part in &site.parts {
        match part {
            AttrPart::Literal(text) => texts.push(text.clone()),
            AttrPart::Marker(index) => match take(values, *index) {
                Interp::Static(value) => texts.push(value.to_string()),
                Interp::Cell(cell) => {
                    cells.push((texts.len(), cell.clone()));
                    texts.push(cell.value().to_string());
                }
                other => {
                    return Err(TemplateError::InvalidBinding {
                        name: site.name.clone(),
                        found: other.kind(),
                    });
                }
            },
        }
    }
    if cells.is_empty() {
        return Ok(Interp::Static(Value::Text(texts.concat())));
    }
    Ok(Interp::from(joined(texts, cells, scope)))
}

/// A string cell following the concatenation of `texts`, where the
/// positions in `cells` track those cells. Recomputed one turn after a
/// change.
fn joined(
    texts: Vec<String>,
    cells: Vec<(usize, Rc<dyn DynCell>)>,
    scope: &Scope,
) -> ObservableCell<String> {
    let output = ObservableCell::new(texts.concat());
    let texts = Rc::new(RefCell::new(texts));
    for (position, cell) in cells {
        let texts = texts.clone();
        let target = output.clone();
        let id = cell.on_value(Rc::new(move |value: Value| {
            texts.borrow_mut()[position] = value.to_string();
            let texts = texts.clone();
            let target = target.clone();
            weft_scheduler::defer(move || target.set(texts.borrow().concat()));
        }));
        scope.on_teardown(move || {
            cell.unobserve(id);
        });
    }
    output
}

fn bind_content(
    renderer: &Renderer,
    placeholder: NodeId,
    value: Interp,
    scope: &Scope,
) -> Result<(), TemplateError> {
    let Some(parent) = renderer.dom().borrow().parent(placeholder) else {
        return Ok(());
    };
    match value {
        Interp::Static(Value::List(list)) => {
            let slots = SlotList::before(renderer, parent, Some(placeholder), &list);
            let id = slots.follow(&list);
            scope.on_teardown(move || {
                list.unobserve(id);
            });
            scope.adopt_list(slots);
        }
        Interp::Static(Value::Null) => {}
        Interp::Static(value) => {
            let mut tree = renderer.dom().borrow_mut();
            let text = tree.create_text(&value.to_string());
            tree.insert_before(parent, text, Some(placeholder));
        }
        Interp::View(view) => {
            {
                let mut tree = renderer.dom().borrow_mut();
                for node in view.nodes(&tree) {
                    tree.insert_before(parent, node, Some(placeholder));
                }
            }
            scope.adopt_view(view);
        }
        Interp::Cell(cell) => {
            let slot = Slot::before(renderer, parent, Some(placeholder));
            slot.update(cell.content());
            let target = slot.clone();
            let id = cell.on_content(Rc::new(move |content: Content| target.update(content)));
            scope.on_teardown(move || {
                cell.unobserve(id);
            });
            scope.adopt_slot(slot);
        }
        Interp::List(list) => {
            let slots = SlotList::before(renderer, parent, Some(placeholder), list.as_ref());
            let id = slots.follow(list.as_ref());
            scope.on_teardown(move || {
                list.unobserve(id);
            });
            scope.adopt_list(slots);
        }
        other => {
            return Err(TemplateError::InvalidBinding {
                name: "content".to_string(),
                found: other.kind(),
            });
        }
    }
    renderer.destroy(placeholder);
    Ok(())
}
