//! Lifecycle ordering, guards and listener wiring

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tessel_core::{NodeId, PropertyDescriptor, Value, ValueType};
use tessel_element::{ComponentId, ComponentType, Event, LifecycleState, Runtime};

fn mount(rt: &mut Runtime, tag: &str) -> (NodeId, ComponentId) {
    let node = rt.create_element(tag);
    let root = rt.host().root();
    rt.append_child(root, node);
    let id = rt.component(node).expect("registered tag");
    (node, id)
}

fn counter() -> (Rc<Cell<usize>>, Rc<Cell<usize>>) {
    let count = Rc::new(Cell::new(0));
    (count.clone(), count)
}

#[test]
fn test_parent_ready_after_all_children_in_any_order() {
    let order = Rc::new(RefCell::new(Vec::new()));
    let mut rt = Runtime::headless();

    let log = order.clone();
    rt.register(
        ComponentType::builder("x-item")
            .property(PropertyDescriptor::new("name", ValueType::String).default(""))
            .on_created(|rt, id| {
                rt.hold_ready(id);
                Ok(())
            })
            .on_ready(move |rt, id| {
                log.borrow_mut().push(rt.get_property(id, "name").to_display_string());
                Ok(())
            })
            .build(),
    );
    let log = order.clone();
    rt.register(
        ComponentType::builder("x-list")
            .template(
                r#"<ul>
                    <x-item id="a" name="a"></x-item>
                    <x-item id="b" name="b"></x-item>
                    <x-item id="c" name="c"></x-item>
                </ul>"#,
            )
            .on_ready(move |_, _| {
                log.borrow_mut().push("list".to_string());
                Ok(())
            })
            .build(),
    );

    let (_, list) = mount(&mut rt, "x-list");
    let item = |rt: &Runtime, name: &str| {
        let node = rt.instance(list).unwrap().node_ref(name).unwrap();
        rt.component(node).unwrap()
    };
    let (a, b, c) = (item(&rt, "a"), item(&rt, "b"), item(&rt, "c"));

    rt.release_ready(b);
    rt.release_ready(c);
    assert_eq!(rt.instance(list).unwrap().state(), LifecycleState::TemplateApplied);
    rt.release_ready(a);

    assert_eq!(*order.borrow(), vec!["b", "c", "a", "list"]);
    assert_eq!(rt.instance(list).unwrap().state(), LifecycleState::Attached);
}

#[test]
fn test_nested_write_from_observer_is_discarded() {
    let (calls, seen) = counter();
    let mut rt = Runtime::headless();
    rt.register(
        ComponentType::builder("x-clamp")
            .property(
                PropertyDescriptor::new("level", ValueType::Number)
                    .default(0)
                    .observer("onLevel"),
            )
            .method("onLevel", move |rt, id, args| {
                calls.set(calls.get() + 1);
                let next = args[1].as_f64().unwrap_or_default() + 1.0;
                let changed = rt.set_property(id, "level", next)?;
                Ok(Value::Bool(changed))
            })
            .build(),
    );
    let (node, id) = mount(&mut rt, "x-clamp");

    assert!(rt.set_property(id, "level", 3).unwrap());
    assert_eq!(seen.get(), 1);
    assert_eq!(rt.get_property(id, "level"), Value::Number(3.0));
    assert_eq!(rt.host().attribute(node, "level").as_deref(), Some("3"));
}

#[test]
fn test_reattach_does_not_duplicate_listeners() {
    let (calls, seen) = counter();
    let mut rt = Runtime::headless();
    rt.register(
        ComponentType::builder("x-ping")
            .property(PropertyDescriptor::new("label", ValueType::String).default("p"))
            .template("<span>[[label]]</span>")
            .listen("ping", "onPing")
            .method("onPing", move |_, _, _| {
                calls.set(calls.get() + 1);
                Ok(Value::Undefined)
            })
            .build(),
    );
    let (node, id) = mount(&mut rt, "x-ping");
    let bindings_before = rt.instance(id).unwrap().bindings().unwrap().descriptor_count();

    let root = rt.host().root();
    let other = rt.create_element("div");
    rt.append_child(root, other);
    rt.append_child(other, node);
    rt.append_child(root, node);

    assert_eq!(rt.host().listeners(node, "ping").len(), 1);
    rt.dispatch_event(node, Event::new("ping", node));
    assert_eq!(seen.get(), 1);
    assert_eq!(
        rt.instance(id).unwrap().bindings().unwrap().descriptor_count(),
        bindings_before
    );
    assert_eq!(rt.instance(id).unwrap().state(), LifecycleState::Attached);
}

#[test]
fn test_detach_and_reattach_hooks() {
    let events = Rc::new(RefCell::new(Vec::new()));
    let mut rt = Runtime::headless();
    let (on_attached, on_detached) = (events.clone(), events.clone());
    rt.register(
        ComponentType::builder("x-panel")
            .on_attached(move |_, _| {
                on_attached.borrow_mut().push("attached");
                Ok(())
            })
            .on_detached(move |_, _| {
                on_detached.borrow_mut().push("detached");
                Ok(())
            })
            .build(),
    );
    let (node, id) = mount(&mut rt, "x-panel");
    let root = rt.host().root();

    assert!(rt.remove_child(root, node));
    assert_eq!(rt.instance(id).unwrap().state(), LifecycleState::Detached);
    rt.append_child(root, node);

    assert_eq!(*events.borrow(), vec!["attached", "detached", "attached"]);
}

#[test]
fn test_template_event_calls_host_method() {
    let (calls, seen) = counter();
    let mut rt = Runtime::headless();
    rt.register(
        ComponentType::builder("x-dialog")
            .template(r#"<button id="ok" (click)="onOk(event)">OK</button>"#)
            .method("onOk", move |_, _, args| {
                assert_eq!(args, &[Value::from("detail")]);
                calls.set(calls.get() + 1);
                Ok(Value::Undefined)
            })
            .build(),
    );
    let (_, id) = mount(&mut rt, "x-dialog");
    let button = rt.instance(id).unwrap().node_ref("ok").unwrap();

    rt.dispatch_event(button, Event::new("click", button).with_detail("detail"));
    assert_eq!(seen.get(), 1);
}

#[test]
fn test_loading_gate_connects_after_load() {
    let mut rt = Runtime::headless();
    rt.register(
        ComponentType::builder("x-leaf")
            .property(PropertyDescriptor::new("size", ValueType::Number).default(1))
            .build(),
    );

    rt.begin_loading();
    let outer = rt.create_element("x-leaf");
    let inner = rt.create_element("x-leaf");
    rt.host_mut().set_attribute(inner, "size", "4");
    let root = rt.host().root();
    rt.append_child(root, outer);
    rt.append_child(outer, inner);

    let (outer, inner) = (rt.component(outer).unwrap(), rt.component(inner).unwrap());
    assert_eq!(rt.instance(inner).unwrap().state(), LifecycleState::Created);

    rt.finish_loading();
    assert!(!rt.is_loading());
    assert!(rt.instance(outer).unwrap().is_completed());
    assert!(rt.instance(inner).unwrap().is_completed());
    assert_eq!(rt.get_property(inner, "size"), Value::Number(4.0));
}

#[test]
fn test_when_ready_runs_after_completion() {
    let (calls, seen) = counter();
    let mut rt = Runtime::headless();
    rt.register(
        ComponentType::builder("x-late")
            .on_created(|rt, id| {
                rt.hold_ready(id);
                Ok(())
            })
            .build(),
    );
    let (_, id) = mount(&mut rt, "x-late");

    let queued = calls.clone();
    rt.when_ready(id, move |_, _| {
        queued.set(queued.get() + 1);
        Ok(())
    });
    assert_eq!(seen.get(), 0);

    rt.release_ready(id);
    assert_eq!(seen.get(), 1);

    rt.when_ready(id, move |_, _| {
        calls.set(calls.get() + 1);
        Ok(())
    });
    assert_eq!(seen.get(), 2);
}

#[test]
fn test_registration_upgrades_existing_nodes() {
    let mut rt = Runtime::headless();
    let node = rt.create_element("x-future");
    rt.host_mut().set_attribute(node, "count", "3");
    let root = rt.host().root();
    rt.append_child(root, node);
    assert!(rt.component(node).is_none());

    let (calls, seen) = counter();
    rt.when_registered("x-future", move |_| calls.set(calls.get() + 1));
    rt.register(
        ComponentType::builder("x-future")
            .property(PropertyDescriptor::new("count", ValueType::Number).default(0))
            .build(),
    );

    assert_eq!(seen.get(), 1);
    let id = rt.component(node).unwrap();
    assert!(rt.instance(id).unwrap().is_ready());
    assert_eq!(rt.get_property(id, "count"), Value::Number(3.0));
}
