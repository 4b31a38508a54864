//! External data contexts feeding component properties

use std::cell::RefCell;
use std::rc::Rc;

use tessel_core::{FunctionRef, NodeId, Object, PropertyDescriptor, Value, ValueType};
use tessel_element::{ComponentId, ComponentType, Event, Runtime};

fn profile_type() -> ComponentType {
    ComponentType::builder("x-profile")
        .property(PropertyDescriptor::new("name", ValueType::String).default(""))
        .property(PropertyDescriptor::new("city", ValueType::String).default(""))
        .property(PropertyDescriptor::new("away", ValueType::Boolean).default(false))
        .build()
}

fn user() -> Object {
    let mut address = Object::new();
    address.insert("city".into(), Value::from("Oslo"));
    let mut user = Object::new();
    user.insert("name".into(), Value::from("Ada"));
    user.insert("address".into(), Value::Object(address));
    user.insert("online".into(), Value::Bool(true));
    user
}

fn mount_profile(rt: &mut Runtime, context: &str) -> (NodeId, ComponentId) {
    let node = rt.create_element("x-profile");
    rt.set_attribute(node, "name", "{{name}}").unwrap();
    rt.set_attribute(node, "city", "[[address.city]]").unwrap();
    rt.set_attribute(node, "away", "[[!online]]").unwrap();
    rt.set_attribute(node, "data-context", context).unwrap();
    let root = rt.host().root();
    rt.append_child(root, node);
    (node, rt.component(node).unwrap())
}

#[test]
fn test_initial_push_and_routing() {
    let mut rt = Runtime::headless();
    rt.register(profile_type());
    let ctx = rt.create_data_context(user());
    rt.register_data_context("user", ctx);

    let (_, id) = mount_profile(&mut rt, "user");
    assert_eq!(rt.bound_data_context(id), Some(ctx));
    assert_eq!(rt.get_property(id, "name"), Value::from("Ada"));
    assert_eq!(rt.get_property(id, "city"), Value::from("Oslo"));
    assert_eq!(rt.get_property(id, "away"), Value::Bool(false));

    assert!(rt.set_context_field(ctx, "address.city", Value::from("Bergen")));
    assert_eq!(rt.get_property(id, "city"), Value::from("Bergen"));

    assert!(rt.set_context_field(ctx, "online", Value::Bool(false)));
    assert_eq!(rt.get_property(id, "away"), Value::Bool(true));
}

#[test]
fn test_two_way_fields_write_back() {
    let mut rt = Runtime::headless();
    rt.register(profile_type());
    let ctx = rt.create_data_context(user());
    rt.register_data_context("user", ctx);
    let (_, id) = mount_profile(&mut rt, "user");

    rt.set_property(id, "name", "Grace").unwrap();
    assert_eq!(rt.context_field(ctx, "name"), Value::from("Grace"));

    rt.set_property(id, "city", "Paris").unwrap();
    assert_eq!(rt.context_field(ctx, "address.city"), Value::from("Oslo"));
}

#[test]
fn test_late_registered_context() {
    let mut rt = Runtime::headless();
    rt.register(profile_type());
    let (_, id) = mount_profile(&mut rt, "later");
    assert_eq!(rt.bound_data_context(id), None);
    assert_eq!(rt.get_property(id, "name"), Value::from(""));

    let ctx = rt.create_data_context(user());
    rt.register_data_context("later", ctx);
    assert_eq!(rt.bound_data_context(id), Some(ctx));
    assert_eq!(rt.get_property(id, "name"), Value::from("Ada"));
}

#[test]
fn test_context_resolved_when_loading_finishes() {
    let mut rt = Runtime::headless();
    rt.register(profile_type());
    rt.begin_loading();
    let (_, id) = mount_profile(&mut rt, "session");

    assert_eq!(rt.bound_data_context(id), None);

    let ctx = rt.create_data_context(user());
    rt.register_data_context("session", ctx);
    rt.finish_loading();

    assert!(rt.instance(id).unwrap().is_completed());
    assert_eq!(rt.bound_data_context(id), Some(ctx));
    assert_eq!(rt.get_property(id, "city"), Value::from("Oslo"));
}

#[test]
fn test_event_attribute_calls_context_function() {
    let received = Rc::new(RefCell::new(Vec::new()));
    let sink = received.clone();

    let mut fields = user();
    fields.insert(
        "onSave".into(),
        Value::Function(FunctionRef::new("onSave", move |args| {
            sink.borrow_mut().extend(args.iter().cloned());
            Value::Undefined
        })),
    );

    let mut rt = Runtime::headless();
    rt.register(profile_type());
    let ctx = rt.create_data_context(fields);
    rt.register_data_context("user", ctx);

    let node = rt.create_element("x-profile");
    rt.set_attribute(node, "(save)", "onSave").unwrap();
    let id = rt.component(node).unwrap();
    let root = rt.host().root();
    rt.append_child(root, node);
    assert!(rt.bind_data_context(id, ctx));

    rt.dispatch_event(node, Event::new("save", node).with_detail(7));
    assert_eq!(*received.borrow(), vec![Value::from(7)]);

    rt.unbind_data_context(id);
    rt.dispatch_event(node, Event::new("save", node).with_detail(8));
    assert_eq!(received.borrow().len(), 1);
    assert!(rt.data_context(ctx).unwrap().subscribers().is_empty());
}
