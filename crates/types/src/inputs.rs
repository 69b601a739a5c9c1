//! Workflow input bindings before and after localization.
//!
//! Inputs arrive as an untyped JSON object. Nothing in the request says which
//! values are files, so each value is classified by inspection:
//!
//! - a JSON string beginning with [`FETCH_SCHEME_PREFIX`] is a [`InputValue::Reference`]
//! - every other value is a [`InputValue::Literal`], including numbers, booleans,
//!   arrays and objects, which are never searched for nested references
//!
//! Maps keep insertion order so localization walks inputs in the order the
//! caller wrote them.

use indexmap::IndexMap;
use serde_json::Value;

/// Only externally addressable data behind this scheme is localized.
pub const FETCH_SCHEME_PREFIX: &str = "https://";

/// Prefix the workflow compiler expects in front of a platform file id.
pub const STORAGE_REFERENCE_PREFIX: &str = "dx://";

/// A single classified input value.
#[derive(Debug, Clone, PartialEq)]
pub enum InputValue {
    /// Remote data that must be copied into platform storage. Holds the URL as written.
    Reference(String),
    /// Any other value, passed to the compiler untouched.
    Literal(Value),
}

/// Classified inputs keyed by input name.
pub type InputBindingMap = IndexMap<String, InputValue>;

/// Inputs after localization: references replaced by storage identifiers.
pub type LocalizedInputMap = IndexMap<String, Value>;

impl InputValue {
    /// Classify a raw JSON value.
    pub fn classify(value: Value) -> Self {
        match value {
            Value::String(text) if is_fetchable_reference(&text) => InputValue::Reference(text),
            other => InputValue::Literal(other),
        }
    }

    pub fn is_reference(&self) -> bool {
        matches!(self, InputValue::Reference(_))
    }
}

/// Returns true when `value` should be fetched and uploaded rather than passed through.
///
/// Strings using any other scheme (`http://`, `s3://`, `gs://`, ...) are treated as literals.
pub fn is_fetchable_reference(value: &str) -> bool {
    value.starts_with(FETCH_SCHEME_PREFIX)
}

/// Classify every value of a raw input object, preserving key order.
pub fn classify_inputs(raw: IndexMap<String, Value>) -> InputBindingMap {
    raw.into_iter()
        .map(|(name, value)| (name, InputValue::classify(value)))
        .collect()
}

/// Wrap a platform file id in the compiler's storage reference form.
pub fn storage_reference(file_id: &str) -> String {
    format!("{STORAGE_REFERENCE_PREFIX}{file_id}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn https_strings_are_references() {
        assert_eq!(
            InputValue::classify(json!("https://host/file.txt")),
            InputValue::Reference("https://host/file.txt".into())
        );
    }

    #[test]
    fn other_schemes_and_plain_strings_are_literals() {
        for raw in ["http://host/file.txt", "s3://bucket/key", "42", "", "HTTPS://HOST/x", " https://host/x"] {
            assert_eq!(InputValue::classify(json!(raw)), InputValue::Literal(json!(raw)), "{raw}");
        }
    }

    #[test]
    fn non_string_values_are_never_inspected() {
        let nested = json!({"file": "https://host/inner.txt", "list": ["https://host/a"]});
        assert_eq!(InputValue::classify(nested.clone()), InputValue::Literal(nested));
        assert_eq!(InputValue::classify(json!(7)), InputValue::Literal(json!(7)));
        assert_eq!(InputValue::classify(json!(true)), InputValue::Literal(json!(true)));
        assert_eq!(InputValue::classify(Value::Null), InputValue::Literal(Value::Null));
    }

    #[test]
    fn classify_inputs_keeps_keys_and_order() {
        let raw: IndexMap<String, Value> = serde_json::from_str(r#"{"z": "https://h/z", "a": 1, "m": "text"}"#).unwrap();
        let classified = classify_inputs(raw);
        let keys: Vec<&str> = classified.keys().map(String::as_str).collect();
        assert_eq!(keys, ["z", "a", "m"]);
        assert!(classified["z"].is_reference());
        assert!(!classified["a"].is_reference());
    }

    #[test]
    fn storage_reference_uses_compiler_prefix() {
        assert_eq!(storage_reference("file-abc"), "dx://file-abc");
    }
}
