//! End-to-end behavior of the property, binding and readiness pipelines

use std::cell::RefCell;
use std::rc::Rc;

use tessel_core::{NodeId, PropertyDescriptor, Value, ValueType};
use tessel_element::{ComponentId, ComponentType, Runtime};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Routes runtime traces to the test output; `RUST_LOG=tessel_element=trace`
/// shows the write pipeline step by step
fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init();
}

fn mount(rt: &mut Runtime, tag: &str) -> (NodeId, ComponentId) {
    init_tracing();
    let node = rt.create_element(tag);
    let root = rt.host().root();
    rt.append_child(root, node);
    let id = rt.component(node).expect("registered tag");
    (node, id)
}

#[test]
fn test_number_reflects_both_ways() {
    let mut rt = Runtime::headless();
    rt.register(
        ComponentType::builder("x-counter")
            .property(PropertyDescriptor::new("count", ValueType::Number).default(0))
            .build(),
    );
    let (node, id) = mount(&mut rt, "x-counter");

    rt.set_property(id, "count", 5).unwrap();
    assert_eq!(rt.host().attribute(node, "count").as_deref(), Some("5"));

    rt.set_attribute(node, "count", "12").unwrap();
    assert_eq!(rt.get_property(id, "count"), Value::Number(12.0));
    assert_eq!(rt.host().attribute(node, "count").as_deref(), Some("12"));

    rt.set_attribute(node, "count", "5").unwrap();
    assert_eq!(rt.get_property(id, "count"), Value::Number(5.0));
}

#[test]
fn test_text_binding_is_sticky_on_undefined() {
    let mut rt = Runtime::headless();
    rt.register(
        ComponentType::builder("x-hello")
            .property(PropertyDescriptor::new("name", ValueType::Any).default(""))
            .template("<p>Hello {{name}}</p>")
            .build(),
    );
    let (node, id) = mount(&mut rt, "x-hello");
    assert_eq!(rt.host().text(node), "Hello ");

    rt.set_property(id, "name", "World").unwrap();
    assert_eq!(rt.host().text(node), "Hello World");

    rt.set_property(id, "name", Value::Undefined).unwrap();
    assert!(rt.get_property(id, "name").is_undefined());
    assert_eq!(rt.host().text(node), "Hello World");
}

#[test]
fn test_boolean_attribute_presence() {
    let mut rt = Runtime::headless();
    rt.register(
        ComponentType::builder("x-button")
            .property(PropertyDescriptor::new("disabled", ValueType::Boolean).default(false))
            .build(),
    );
    let (node, id) = mount(&mut rt, "x-button");
    assert!(!rt.host().has_attribute(node, "disabled"));

    rt.set_property(id, "disabled", true).unwrap();
    assert_eq!(rt.host().attribute(node, "disabled").as_deref(), Some(""));

    rt.set_property(id, "disabled", false).unwrap();
    assert_eq!(rt.host().attribute(node, "disabled"), None);
}

#[test]
fn test_parent_ready_waits_for_slow_child() {
    let order = Rc::new(RefCell::new(Vec::new()));
    let mut rt = Runtime::headless();

    let log = order.clone();
    rt.register(
        ComponentType::builder("x-slow")
            .on_created(|rt, id| {
                rt.hold_ready(id);
                Ok(())
            })
            .on_ready(move |_, _| {
                log.borrow_mut().push("slow");
                Ok(())
            })
            .build(),
    );
    let log = order.clone();
    rt.register(
        ComponentType::builder("x-fast")
            .on_ready(move |_, _| {
                log.borrow_mut().push("fast");
                Ok(())
            })
            .build(),
    );
    let log = order.clone();
    rt.register(
        ComponentType::builder("x-panel")
            .template(r#"<div><x-slow id="slow"></x-slow><x-fast id="fast"></x-fast></div>"#)
            .on_ready(move |_, _| {
                log.borrow_mut().push("panel");
                Ok(())
            })
            .build(),
    );

    let (_, panel) = mount(&mut rt, "x-panel");
    assert_eq!(*order.borrow(), vec!["fast"]);
    assert!(!rt.instance(panel).unwrap().is_ready());

    let slow_node = rt.instance(panel).unwrap().node_ref("slow").unwrap();
    let slow = rt.component(slow_node).unwrap();
    rt.release_ready(slow);

    assert_eq!(*order.borrow(), vec!["fast", "slow", "panel"]);
    assert!(rt.instance(panel).unwrap().is_completed());
}
