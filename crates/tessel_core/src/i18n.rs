//! Localization collaborator
//!
//! Runtime messages are looked up by key and rendered with `{{name}}`
//! placeholders replaced by named arguments.
//!
//! # Failure modes
//!
//! | Situation | Result |
//! |-----------|--------|
//! | key missing in the active locale | falls back to the fallback locale |
//! | key missing everywhere | `None`; callers use the English `Display` text |
//! | placeholder without an argument | left in place verbatim |

use indexmap::IndexMap;
use rustc_hash::FxHashMap;

use crate::value::Value;

pub trait Localizer {
    /// Renders `key` with `args` in the current locale
    fn localize(&self, key: &str, args: &[(&str, String)]) -> Option<String>;
}

/// Replaces every `{{name}}` in `template` with the matching argument
pub fn interpolate(template: &str, args: &[(&str, String)]) -> String {
    let mut out = template.to_string();
    for (name, value) in args {
        out = out.replace(&format!("{{{{{name}}}}}"), value);
    }
    out
}

/// Locale → (key → template) message table
#[derive(Clone, Debug)]
pub struct MessageCatalog {
    locale: String,
    fallback: String,
    messages: FxHashMap<String, IndexMap<String, String>>,
}

impl MessageCatalog {
    pub fn new(locale: impl Into<String>) -> Self {
        let locale = locale.into();
        Self {
            fallback: locale.clone(),
            locale,
            messages: FxHashMap::default(),
        }
    }

    /// Catalog with the built-in English runtime messages
    pub fn english() -> Self {
        let mut catalog = Self::new("en");
        catalog.add_messages(
            "en",
            DEFAULT_MESSAGES
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string())),
        );
        catalog
    }

    pub fn locale(&self) -> &str {
        &self.locale
    }

    pub fn set_locale(&mut self, locale: impl Into<String>) {
        self.locale = locale.into();
    }

    /// Merges messages into `locale`, overriding existing keys
    pub fn add_messages(
        &mut self,
        locale: &str,
        messages: impl IntoIterator<Item = (String, String)>,
    ) {
        self.messages
            .entry(locale.to_string())
            .or_default()
            .extend(messages);
    }

    pub fn lookup(&self, locale: &str, key: &str) -> Option<&str> {
        self.messages
            .get(locale)
            .and_then(|table| table.get(key))
            .map(String::as_str)
    }

    /// Converts to the `{ locale: { key: message } }` object shape used by
    /// the `messages` property of localizable components
    pub fn to_value(&self) -> Value {
        let mut locales = crate::value::Object::new();
        let mut names: Vec<_> = self.messages.keys().collect();
        names.sort();
        for name in names {
            let table = &self.messages[name];
            locales.insert(
                name.clone(),
                Value::Object(
                    table
                        .iter()
                        .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                        .collect(),
                ),
            );
        }
        Value::Object(locales)
    }
}

impl Default for MessageCatalog {
    fn default() -> Self {
        Self::english()
    }
}

impl Localizer for MessageCatalog {
    fn localize(&self, key: &str, args: &[(&str, String)]) -> Option<String> {
        let template = self
            .lookup(&self.locale, key)
            .or_else(|| self.lookup(&self.fallback, key))?;
        Some(interpolate(template, args))
    }
}

const DEFAULT_MESSAGES: &[(&str, &str)] = &[
    (
        "propertyUnknownType",
        "'{{name}}' property is with undefined 'type' member!",
    ),
    (
        "propertyInvalidValue",
        "Invalid '{{name}}' property value! Actual value: '{{actualValue}}', Expected value: '{{value}}'!",
    ),
    (
        "propertyInvalidValueType",
        "Invalid '{{name}}' property value type! Actual type: '{{actualType}}', Expected type: '{{type}}'!",
    ),
    (
        "methodInvalidValueType",
        "Invalid '{{name}}' method argument value type! Actual type: '{{actualType}}', Expected type: '{{type}}' for argument with index: '{{argumentIndex}}'!",
    ),
    (
        "methodInvalidArgumentsCount",
        "Invalid '{{name}}' method arguments count! Actual arguments count: '{{actualArgumentsCount}}', Expected at least: '{{argumentsCount}}' argument(s)!",
    ),
    (
        "methodInvalidReturnType",
        "Invalid '{{name}}' method return type! Actual type: '{{actualType}}', Expected type: '{{type}}'!",
    ),
    (
        "elementNotInDOM",
        "Element does not exist in DOM! Please, add the element to the DOM, before invoking a method.",
    ),
    ("moduleUndefined", "Module is undefined."),
    (
        "missingReference",
        "{{elementType}}: Missing reference to '{{files}}'.",
    ),
    (
        "invalidTemplate",
        "{{elementType}}: '{{property}}' property accepts a string that must be valid template markup.",
    ),
    ("methodUnknown", "{{elementType}}: unknown method '{{name}}'."),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interpolate() {
        let out = interpolate(
            "Hello {{name}}, {{name}}! {{missing}}",
            &[("name", "Ada".to_string())],
        );
        assert_eq!(out, "Hello Ada, Ada! {{missing}}");
    }

    #[test]
    fn test_english_catalog() {
        let catalog = MessageCatalog::english();
        let msg = catalog
            .localize("propertyUnknownType", &[("name", "count".to_string())])
            .unwrap();
        assert_eq!(msg, "'count' property is with undefined 'type' member!");
        assert!(catalog.localize("nope", &[]).is_none());
    }

    #[test]
    fn test_locale_fallback() {
        let mut catalog = MessageCatalog::english();
        catalog.add_messages(
            "de",
            [("moduleUndefined".to_string(), "Modul fehlt.".to_string())],
        );
        catalog.set_locale("de");

        assert_eq!(
            catalog.localize("moduleUndefined", &[]).as_deref(),
            Some("Modul fehlt.")
        );
        assert!(catalog
            .localize("elementNotInDOM", &[])
            .unwrap()
            .starts_with("Element does not exist"));
    }

    #[test]
    fn test_to_value_shape() {
        let value = MessageCatalog::english().to_value();
        assert!(value.get_path("en.moduleUndefined").is_some());
    }
}
