//! Shape classification for raw JSON payloads.
//!
//! The service returns opaque JSON. A value is *collection data* when it
//! carries `items`, `offset` and `limit`; any object with an `href` is a
//! resource, and an object whose only key is `href` is a reference stub.

use serde_json::{Map, Value};

/// Whether `value` is a collection page (`items`, `offset` and `limit` all present).
pub fn is_collection_data(value: &Value) -> bool {
    match value.as_object() {
        Some(obj) => {
            obj.contains_key("items") && obj.contains_key("offset") && obj.contains_key("limit")
        }
        None => false,
    }
}

/// The `href` of a resource object, if it has a string one.
pub fn href_of(value: &Value) -> Option<&str> {
    value.get("href").and_then(Value::as_str)
}

/// Whether `value` is a nested resource carrying more than its `href`.
pub fn is_expanded_reference(value: &Value) -> bool {
    match value.as_object() {
        Some(obj) => obj.len() > 1 && obj.get("href").is_some_and(Value::is_string),
        None => false,
    }
}

/// A `{href}` reference stub.
pub fn reference_stub(href: &str) -> Value {
    let mut stub = Map::with_capacity(1);
    stub.insert("href".to_string(), Value::String(href.to_string()));
    Value::Object(stub)
}
