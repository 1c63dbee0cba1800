//! Path lookup and deep merge over JSON trees.

use serde_json::{Map, Value};
use std::fmt;

/// A location inside a nested JSON tree.
///
/// Built either from a dotted string (`"bool.must"`) or from explicit
/// segments (`["bool", "must"]`). Numeric segments index into arrays.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ClausePath {
    segments: Vec<String>,
}

impl ClausePath {
    /// Parse a dotted path. Empty segments are skipped.
    pub fn parse(path: &str) -> Self {
        Self {
            segments: path
                .split('.')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }

    /// The path segments.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Whether the path addresses the root.
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }
}

impl fmt::Display for ClausePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("."))
    }
}

impl From<&str> for ClausePath {
    fn from(path: &str) -> Self {
        Self::parse(path)
    }
}

impl From<String> for ClausePath {
    fn from(path: String) -> Self {
        Self::parse(&path)
    }
}

impl From<Vec<String>> for ClausePath {
    fn from(segments: Vec<String>) -> Self {
        Self { segments }
    }
}

impl<const N: usize> From<[&str; N]> for ClausePath {
    fn from(segments: [&str; N]) -> Self {
        Self {
            segments: segments.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl From<&[&str]> for ClausePath {
    fn from(segments: &[&str]) -> Self {
        Self {
            segments: segments.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Look up the value at `path`.
pub fn get_path<'a>(value: &'a Value, path: &ClausePath) -> Option<&'a Value> {
    path.segments()
        .iter()
        .try_fold(value, |node, segment| step(node, segment))
}

fn step<'a>(node: &'a Value, segment: &str) -> Option<&'a Value> {
    match node {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    }
}

/// Write `new` at `path`, creating intermediate objects as needed.
///
/// A scalar standing where a container is required is replaced by an empty
/// object. Array segments must be in bounds or equal to the length (append).
pub fn set_path(value: &mut Value, path: &ClausePath, new: Value) {
    let mut node = value;
    for segment in path.segments() {
        node = child_mut(node, segment);
    }
    *node = new;
}

fn child_mut<'a>(node: &'a mut Value, segment: &str) -> &'a mut Value {
    let index = match &*node {
        Value::Array(items) => segment
            .parse::<usize>()
            .ok()
            .filter(|i| *i <= items.len()),
        _ => None,
    };

    match (node, index) {
        (Value::Array(items), Some(index)) => {
            if index == items.len() {
                items.push(Value::Null);
            }
            &mut items[index]
        }
        (node, _) => {
            if !node.is_object() {
                *node = Value::Object(Map::new());
            }
            &mut node[segment]
        }
    }
}

/// Deep-merge `fragment` into `tree`, returning the merged tree.
///
/// Objects merge key by key, arrays under the same key are concatenated, and
/// any other conflict is resolved in favor of `fragment`.
pub fn merge(tree: Value, fragment: Value) -> Value {
    match (tree, fragment) {
        (Value::Object(mut base), Value::Object(incoming)) => {
            for (key, value) in incoming {
                let merged = match base.remove(&key) {
                    Some(existing) => merge(existing, value),
                    None => value,
                };
                base.insert(key, merged);
            }
            Value::Object(base)
        }
        (Value::Array(mut base), Value::Array(incoming)) => {
            base.extend(incoming);
            Value::Array(base)
        }
        (_, incoming) => incoming,
    }
}

/// Whether a value counts as "not set": null, `false`, zero, `""`, `"0"`, or
/// an empty array/object.
pub fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty() || s == "0",
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
    }
}
