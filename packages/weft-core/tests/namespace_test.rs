use std::cell::{Cell, RefCell};
use std::rc::Rc;
use weft_core::{
    Interp, ListenerOptions, NamespaceTable, NodeId, NodeRef, Renderer, TemplateError, View,
    dispatch, handler, handler_with, on_created, xml,
};
use weft_signals::{ObservableCell, Value, deep};

fn drain() {
    while weft_scheduler::tick() {}
}

fn first_element(renderer: &Renderer, view: &View) -> NodeId {
    let tree = renderer.dom().borrow();
    view.content(&tree)
        .into_iter()
        .find(|&node| tree.tag(node).is_some())
        .expect("an element")
}

#[test]
fn test_prop_binding_is_two_way() {
    let renderer = Renderer::new();
    let text = ObservableCell::new("start".to_string());
    let writes = Rc::new(Cell::new(0));
    let counted = writes.clone();
    text.subscribe(move |_| counted.set(counted.get() + 1));

    let view = renderer
        .render(xml!("<input prop:value=\"{}\"/>", &text))
        .expect("renders");
    let input = first_element(&renderer, &view);
    assert_eq!(
        renderer.dom().borrow().property(input, "value"),
        Some(Value::from("start"))
    );

    // The user types: the element's property changes, then `input` fires.
    renderer
        .dom()
        .borrow_mut()
        .set_property(input, "value", Value::from("typed"));
    dispatch(renderer.dom(), input, "input");
    assert_eq!(text.get(), "typed");
    assert_eq!(writes.get(), 1);

    text.set("from code".to_string());
    drain();
    assert_eq!(
        renderer.dom().borrow().property(input, "value"),
        Some(Value::from("from code"))
    );
}

#[test]
fn test_checked_flows_back_as_bool() {
    let renderer = Renderer::new();
    let checked = ObservableCell::new(false);
    let view = renderer
        .render(xml!("<input prop:checked=\"{}\"/>", &checked))
        .expect("renders");
    let input = first_element(&renderer, &view);

    renderer
        .dom()
        .borrow_mut()
        .set_property(input, "checked", Value::Bool(true));
    dispatch(renderer.dom(), input, "change");
    assert!(checked.get());
}

#[test]
fn test_call_spreads_list_arguments() {
    let renderer = Renderer::new();
    let args = deep(&serde_json::json!([0, 4]));
    let selection = ObservableCell::new(1.0);
    let view = renderer
        .render(xml!(
            "<input call:setSelectionRange=\"{}\" call:focus=\"{}\" call:scroll=\"{}\"/>",
            args,
            Value::List(weft_signals::ObservableList::new(Vec::new())),
            &selection
        ))
        .expect("renders");
    let input = first_element(&renderer, &view);

    selection.set(2.0);
    drain();

    let calls = renderer.dom().borrow().calls(input);
    assert_eq!(
        calls,
        vec![
            (
                "setSelectionRange".to_string(),
                vec![Value::Number(0.0), Value::Number(4.0)]
            ),
            ("focus".to_string(), Vec::new()),
            ("scroll".to_string(), vec![Value::Number(1.0)]),
            ("scroll".to_string(), vec![Value::Number(2.0)]),
        ]
    );
}

#[test]
fn test_on_attaches_listeners() {
    let renderer = Renderer::new();
    let clicks = Rc::new(Cell::new(0));
    let counter = clicks.clone();
    let once = Rc::new(Cell::new(0));
    let once_counter = once.clone();
    let view = renderer
        .render(xml!(
            "<button on:click=\"{}\" on:focus=\"{}\">go</button>",
            handler(move |_| counter.set(counter.get() + 1)),
            handler_with(
                ListenerOptions {
                    once: true,
                    ..ListenerOptions::default()
                },
                move |_| once_counter.set(once_counter.get() + 1)
            )
        ))
        .expect("renders");
    let button = first_element(&renderer, &view);

    dispatch(renderer.dom(), button, "click");
    dispatch(renderer.dom(), button, "click");
    dispatch(renderer.dom(), button, "focus");
    dispatch(renderer.dom(), button, "focus");
    assert_eq!(clicks.get(), 2);
    assert_eq!(once.get(), 1);
}

#[test]
fn test_on_rejects_non_handlers() {
    let renderer = Renderer::new();
    let err = renderer
        .render(xml!("<button on:click=\"{}\"/>", "nope"))
        .unwrap_err();
    assert!(matches!(
        err,
        TemplateError::InvalidBinding { name, .. } if name == "click"
    ));
}

#[test]
fn test_created_and_ref_run_after_render() {
    let renderer = Renderer::new();
    let node_ref = NodeRef::new();
    let seen = Rc::new(RefCell::new(None));
    let sink = seen.clone();
    let reader = renderer.clone();
    let view = renderer
        .render(xml!(
            "<section weft:ref=\"{}\"><h1 weft:created=\"{}\">{}</h1></section>",
            &node_ref,
            on_created(move |node| {
                // The whole template is hooked up by now.
                *sink.borrow_mut() = Some(reader.dom().borrow().text_content(node));
            }),
            "title"
        ))
        .expect("renders");

    let section = first_element(&renderer, &view);
    assert_eq!(node_ref.get(), Some(section));
    assert_eq!(seen.borrow().as_deref(), Some("title"));
}

#[test]
fn test_unknown_control_key_fails() {
    let renderer = Renderer::new();
    let err = renderer
        .render(xml!("<p weft:bogus=\"{}\"/>", 1))
        .unwrap_err();
    assert!(matches!(err, TemplateError::UnknownControl(key) if key == "bogus"));
}

#[test]
fn test_ref_requires_a_node_ref() {
    let renderer = Renderer::new();
    let err = renderer
        .render(xml!("<p weft:ref=\"{}\"/>", "not a ref"))
        .unwrap_err();
    assert!(matches!(err, TemplateError::InvalidRef));
}

#[test]
fn test_custom_namespace_and_fallback() {
    let mut table = NamespaceTable::builtin();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    table.register("data", move |ctx, value| {
        if let Interp::Static(value) = value {
            sink.borrow_mut().push((ctx.name.to_string(), value.to_string()));
        }
        Ok(())
    });
    let renderer = Renderer::new();
    let view = renderer
        .render_with(
            xml!("<p data:id=\"{}\" aria:label=\"{}\"/>", 7, "hi"),
            &table,
        )
        .expect("renders");
    let p = first_element(&renderer, &view);

    assert_eq!(*seen.borrow(), vec![("id".to_string(), "7".to_string())]);
    // No `aria` handler: the full name is used as a plain attribute.
    assert_eq!(renderer.dom().borrow().attribute(p, "aria:label"), Some("hi"));
}

#[test]
fn test_integer_prop_ignores_values_it_cannot_hold() {
    let renderer = Renderer::new();
    let quantity = ObservableCell::new(1u32);
    let view = renderer
        .render(xml!("<input prop:value=\"{}\"/>", &quantity))
        .expect("renders");
    let input = first_element(&renderer, &view);

    let type_in = |typed: Value| {
        renderer.dom().borrow_mut().set_property(input, "value", typed);
        dispatch(renderer.dom(), input, "input");
    };
    type_in(Value::Number(-3.0));
    assert_eq!(quantity.get(), 1);
    type_in(Value::Number(2.7));
    assert_eq!(quantity.get(), 1);
    type_in(Value::from("1e12"));
    assert_eq!(quantity.get(), 1);

    type_in(Value::from("5"));
    assert_eq!(quantity.get(), 5);
}
