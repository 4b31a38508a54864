//! Validation steps of the property write pipeline

use std::rc::Rc;

use tessel_core::{LogLevel, MemoryLogger, NodeId, PropertyDescriptor, Value, ValueType};
use tessel_element::{ComponentId, ComponentType, Runtime};

fn mount(rt: &mut Runtime, tag: &str) -> (NodeId, ComponentId) {
    let node = rt.create_element(tag);
    let root = rt.host().root();
    rt.append_child(root, node);
    let id = rt.component(node).expect("registered tag");
    (node, id)
}

fn logged(ty: ComponentType) -> (Runtime, MemoryLogger) {
    let mut rt = Runtime::headless();
    let logger = MemoryLogger::new();
    rt.set_logger(Rc::new(logger.clone()));
    rt.register(ty);
    (rt, logger)
}

#[test]
fn test_allowed_values_reject_and_keep_previous() {
    let (mut rt, logger) = logged(
        ComponentType::builder("x-switch")
            .property(
                PropertyDescriptor::new("mode", ValueType::String)
                    .default("a")
                    .allowed_values(["a", "b"]),
            )
            .build(),
    );
    let (node, id) = mount(&mut rt, "x-switch");

    assert!(rt.set_property(id, "mode", "b").unwrap());
    assert_eq!(rt.host().attribute(node, "mode").as_deref(), Some("b"));

    assert!(!rt.set_property(id, "mode", "zzz").unwrap());
    assert_eq!(rt.get_property(id, "mode"), Value::from("b"));
    assert_eq!(rt.host().attribute(node, "mode").as_deref(), Some("b"));
    assert_eq!(
        logger.messages(LogLevel::Log),
        vec!["Invalid 'mode' property value! Actual value: 'zzz', Expected value: 'a, b'!".to_string()]
    );
    assert!(logger.messages(LogLevel::Error).is_empty());
}

#[test]
fn test_validator_transforms_before_commit() {
    let (mut rt, logger) = logged(
        ComponentType::builder("x-meter")
            .property(
                PropertyDescriptor::new("level", ValueType::Number)
                    .default(0)
                    .validator("clampLevel"),
            )
            .method("clampLevel", |_, _, args| {
                let next = args[1].as_f64().unwrap_or_default();
                Ok(Value::Number(next.min(10.0)))
            })
            .build(),
    );
    let (node, id) = mount(&mut rt, "x-meter");

    assert!(rt.set_property(id, "level", 42).unwrap());
    assert_eq!(rt.get_property(id, "level"), Value::Number(10.0));
    assert_eq!(rt.host().attribute(node, "level").as_deref(), Some("10"));

    assert!(!rt.set_property(id, "level", 99).unwrap());
    assert_eq!(rt.get_property(id, "level"), Value::Number(10.0));
    assert!(logger.is_empty());
}

#[test]
fn test_validator_output_is_type_checked() {
    let (mut rt, logger) = logged(
        ComponentType::builder("x-gauge")
            .property(
                PropertyDescriptor::new("level", ValueType::Number)
                    .default(1)
                    .validator("describeLevel"),
            )
            .method("describeLevel", |_, _, args| {
                Ok(Value::String(format!("level {}", args[1].to_display_string())))
            })
            .build(),
    );
    let (node, id) = mount(&mut rt, "x-gauge");

    assert!(!rt.set_property(id, "level", 5).unwrap());
    assert_eq!(rt.get_property(id, "level"), Value::Number(1.0));
    assert!(!rt.host().has_attribute(node, "level"));
    assert_eq!(
        logger.messages(LogLevel::Error),
        vec![
            "Invalid 'level' property value type! Actual type: 'string', Expected type: 'number'!"
                .to_string()
        ]
    );
}

#[test]
fn test_reflect_default_writes_attribute_on_configure() {
    let mut rt = Runtime::headless();
    rt.register(
        ComponentType::builder("x-tile")
            .property(
                PropertyDescriptor::new("size", ValueType::Number)
                    .default(3)
                    .reflect_default(true),
            )
            .property(PropertyDescriptor::new("label", ValueType::String).default("tile"))
            .build(),
    );

    let (node, id) = mount(&mut rt, "x-tile");
    assert_eq!(rt.host().attribute(node, "size").as_deref(), Some("3"));
    assert!(!rt.host().has_attribute(node, "label"));

    let preset = rt.create_element("x-tile");
    rt.host_mut().set_attribute(preset, "size", "7");
    let root = rt.host().root();
    rt.append_child(root, preset);
    let preset_id = rt.component(preset).unwrap();
    assert_eq!(rt.host().attribute(preset, "size").as_deref(), Some("7"));
    assert_eq!(rt.get_property(preset_id, "size"), Value::Number(7.0));
    assert_eq!(rt.get_property(id, "size"), Value::Number(3.0));
}
