//! Shape-tolerant access into source documents

use serde_json::{Map, Value};
use std::sync::OnceLock;

fn empty_object() -> &'static Value {
    static EMPTY: OnceLock<Value> = OnceLock::new();
    EMPTY.get_or_init(|| Value::Object(Map::new()))
}

/// Walk `path` through nested objects starting at `root`.
///
/// A missing key, a `null`, or any non-object value met before the last
/// key is a miss, not an error.
pub fn lookup<'a>(root: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter()
        .try_fold(root, |node, key| node.as_object()?.get(*key))
}

/// Top-level section of a document, or an empty object when the section
/// is absent or not an object.
pub fn section<'a>(root: &'a Value, name: &str) -> &'a Value {
    match root.get(name) {
        Some(value @ Value::Object(_)) => value,
        _ => empty_object(),
    }
}

/// Render a leaf as label text.
///
/// `null` is absence. Strings are taken as-is, numbers and booleans use
/// their JSON text. Containers are rejected with a short description of
/// what was found.
pub fn scalar_text(value: &Value) -> Result<Option<String>, &'static str> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s.clone())),
        Value::Number(n) => Ok(Some(n.to_string())),
        Value::Bool(b) => Ok(Some(b.to_string())),
        Value::Array(_) => Err("an array"),
        Value::Object(_) => Err("an object"),
    }
}
