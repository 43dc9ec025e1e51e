use futures::channel::oneshot;
use futures::future::FutureExt;
use std::cell::Cell;
use std::rc::Rc;
use weft_core::{
    Component, ComponentTag, Host, NamespaceTable, NodeId, Renderer, TemplateError, View,
    pending, xml,
};
use weft_signals::ObservableCell;

fn drain() {
    while weft_scheduler::tick() {}
}

fn markup(renderer: &Renderer, view: &View) -> String {
    renderer.dom().borrow().to_markup(view.fragment())
}

fn element(renderer: &Renderer, view: &View) -> NodeId {
    let tree = renderer.dom().borrow();
    view.content(&tree)
        .into_iter()
        .find(|&node| tree.tag(node).is_some())
        .expect("an element")
}

#[derive(Default)]
struct Greeting;

impl Component for Greeting {
    fn render(&self, host: &Host) -> Result<View, TemplateError> {
        let name = host.attribute("name").unwrap_or_else(|| "nobody".to_string());
        host.render(xml!("<p>hello {}</p>", name))
    }
}

#[derive(Default)]
struct StatusBadge {
    label: ObservableCell<String>,
}

impl Component for StatusBadge {
    fn render(&self, host: &Host) -> Result<View, TemplateError> {
        host.render(xml!("<span shout:text=\"{}\">{}</span>", "on", &self.label))
    }

    fn namespaces(&self, table: &mut NamespaceTable) {
        table.register("shout", |ctx, _value| {
            ctx.dom()
                .borrow_mut()
                .set_attribute(ctx.element, "data-shout", &ctx.name.to_uppercase());
            Ok(())
        });
    }
}

#[test]
fn test_define_names_and_repeats() {
    let renderer = Renderer::new();
    let greeting = renderer.define::<Greeting>();
    let badge = renderer.define::<StatusBadge>();
    assert_eq!(greeting.name(), "weft-greeting");
    assert_eq!(badge.name(), "status-badge");
    assert_eq!(renderer.define::<Greeting>(), greeting);
    assert_eq!(renderer.tag_of::<Greeting>(), Some(greeting));
}

#[test]
fn test_component_renders_into_shadow_root() {
    let renderer = Renderer::new();
    let tag = renderer.define::<Greeting>();
    let view = renderer
        .render(xml!("<{} name=\"ada\"></{}>", &tag, &tag))
        .expect("renders");
    let host = element(&renderer, &view);

    assert!(renderer.instance(host).is_some());
    assert_eq!(renderer.profiling().upgrades, 1);
    assert_eq!(
        markup(&renderer, &view),
        "<weft-greeting name=\"ada\"><template shadowrootmode=\"open\"><p>hello ada</p></template></weft-greeting>"
    );
}

#[test]
fn test_component_namespaces_are_scoped() {
    let renderer = Renderer::new();
    let tag = renderer.define::<StatusBadge>();
    let view = renderer
        .render(xml!("<{}></{}>", &tag, &tag))
        .expect("renders");
    assert!(markup(&renderer, &view).contains("<span data-shout=\"TEXT\">"));

    // Outside the component the prefix is unknown and binds as an attribute.
    let plain = renderer
        .render(xml!("<i shout:text=\"{}\"/>", "on"))
        .expect("renders");
    assert_eq!(markup(&renderer, &plain), "<i shout:text=\"on\"></i>");
}

#[test]
fn test_unregistered_and_non_component_tags() {
    let renderer = Renderer::new();
    let other = Renderer::new();
    let foreign = other.define::<Greeting>();

    let err = renderer
        .render(xml!("<{}></{}>", &foreign, &foreign))
        .unwrap_err();
    assert!(matches!(err, TemplateError::UnregisteredComponent(name) if name == "weft-greeting"));

    let err = renderer.render(xml!("<{}/>", "div")).unwrap_err();
    assert!(matches!(err, TemplateError::NotAComponent(0)));
}

#[test]
fn test_changed_tag_values_recompile() {
    let renderer = Renderer::new();
    let greeting = renderer.define::<Greeting>();
    let badge = renderer.define::<StatusBadge>();

    let render = |tag: &ComponentTag| {
        renderer
            .render(xml!("<div><{}/></div>", tag))
            .expect("renders")
    };
    let before = renderer.profiling();
    render(&greeting);
    render(&greeting);
    render(&badge);
    let after = renderer.profiling();
    // Each outer render also renders the component's own template.
    assert_eq!(after.renders - before.renders, 6);
    assert_eq!(after.compiles - before.compiles, 4);
    assert_eq!(after.cache_hits - before.cache_hits, 2);
    assert!(markup(&renderer, &render(&badge)).contains("<status-badge>"));
}

#[test]
fn test_pending_component_swaps_in() {
    let renderer = Renderer::new();
    let tag = renderer.define::<Greeting>();
    let (tx, rx) = oneshot::channel::<ComponentTag>();
    let fallback = tag.clone();
    let lazy = pending(rx.map(move |result| result.unwrap_or(fallback)));

    let view = renderer
        .render(xml!(
            "<{} name=\"grace\"><b>child</b></{}>",
            lazy.clone(),
            lazy
        ))
        .expect("renders");
    let loading = element(&renderer, &view);
    assert_eq!(
        markup(&renderer, &view),
        "<weft-loading data-weft-pending=\"0\" name=\"grace\"><b>child</b></weft-loading>"
    );

    tx.send(tag).expect("receiver alive");
    drain();

    let swapped = element(&renderer, &view);
    assert_ne!(swapped, loading);
    assert!(renderer.instance(swapped).is_some());
    assert_eq!(
        markup(&renderer, &view),
        "<weft-greeting name=\"grace\"><template shadowrootmode=\"open\"><p>hello grace</p></template><b>child</b></weft-greeting>"
    );
}

#[test]
fn test_component_instances_are_fresh_per_element() {
    let created = Rc::new(Cell::new(0));
    let counter = created.clone();
    let renderer = Renderer::new();
    let tag = renderer.define_with(move || {
        counter.set(counter.get() + 1);
        Greeting
    });
    renderer
        .render(xml!("<div><{}/><{}/></div>", &tag, &tag))
        .expect("renders");
    assert_eq!(created.get(), 2);
}

#[test]
fn test_removed_components_drop_their_instances() {
    let renderer = Renderer::new();
    let tag = renderer.define::<StatusBadge>();
    let shown = ObservableCell::new(renderer.render(xml!("<{}/>", &tag)).ok());
    let page = renderer
        .render(xml!("<div>{}</div>", &shown))
        .expect("renders");
    assert_eq!(renderer.registered(), (0, 1));
    let live = renderer.dom().borrow().len();

    shown.set(renderer.render(xml!("<{}/>", &tag)).ok());
    drain();
    assert_eq!(renderer.registered(), (0, 1));
    assert_eq!(renderer.dom().borrow().len(), live);

    shown.set(None);
    drain();
    assert_eq!(renderer.registered(), (0, 0));
    assert!(!markup(&renderer, &page).contains("status-badge"));
}
