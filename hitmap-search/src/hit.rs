//! Canonical hit representation.
//!
//! Backends return hits either wrapped (`{"_id": .., "_source": {..},
//! "fields": {..}}`) or flat (a plain field map, e.g. after a projection
//! pass). [`RawHit::from_value`] resolves the shape once on ingestion.

use crate::path::{self, ClausePath};
use serde_json::{Map, Value};

/// One matched document.
#[derive(Debug, Clone, PartialEq)]
pub struct RawHit {
    /// Backend identity (`_id`), when the hit carries one.
    pub identity: Option<Value>,
    /// Field data: the non-empty `_source` of a wrapped hit, otherwise the
    /// hit itself.
    pub body: Value,
    /// The `fields` section of a wrapped hit.
    pub stored_fields: Map<String, Value>,
    envelope: Option<Map<String, Value>>,
}

impl RawHit {
    /// Normalize a hit of either shape.
    pub fn from_value(value: Value) -> Self {
        let mut map = match value {
            Value::Object(map) => map,
            scalar => {
                return Self {
                    identity: None,
                    body: scalar,
                    stored_fields: Map::new(),
                    envelope: None,
                };
            }
        };

        let identity = map.get("_id").filter(|id| !path::is_blank(id)).cloned();

        // `fields` is only backend metadata on hits that carry other metadata.
        let has_metadata = ["_id", "_index", "_source"]
            .iter()
            .any(|key| map.contains_key(*key));
        let stored_fields = match map.get("fields") {
            Some(Value::Object(fields)) if has_metadata => fields.clone(),
            _ => Map::new(),
        };

        let wrapped = map
            .get("_source")
            .is_some_and(|source| !path::is_blank(source));

        if wrapped {
            if let Some(source) = map.remove("_source") {
                return Self {
                    identity,
                    body: source,
                    stored_fields,
                    envelope: Some(map),
                };
            }
        }

        // An empty source is not unwrapped; the hit is all the data there is.
        Self {
            identity,
            body: Value::Object(map),
            stored_fields,
            envelope: None,
        }
    }

    /// Whether the hit arrived with a non-empty `_source`.
    pub fn is_source_wrapped(&self) -> bool {
        self.envelope.is_some()
    }

    /// Whether the field data is a bare scalar rather than a map.
    pub fn is_scalar(&self) -> bool {
        !matches!(self.body, Value::Object(_) | Value::Array(_))
    }

    /// The field data as a map, if it is one.
    pub fn fields(&self) -> Option<&Map<String, Value>> {
        self.body.as_object()
    }

    /// Resolve a keying field: the first element of `fields[name]`, then the
    /// source, then the top level of the hit.
    pub fn lookup(&self, name: &str) -> Option<&Value> {
        if let Some(stored) = self.stored_fields.get(name) {
            let first = match stored {
                Value::Array(items) => items.first(),
                other => Some(other),
            };
            if first.is_some() {
                return first;
            }
        }

        if let Some(value) = self.body.get(name) {
            return Some(value);
        }

        self.envelope.as_ref().and_then(|envelope| envelope.get(name))
    }

    /// Value at `path` on the hit as the backend sent it, falling back to
    /// the source of a wrapped hit.
    pub fn select(&self, path: &ClausePath) -> Option<Value> {
        match &self.envelope {
            Some(envelope) => {
                let mut segments = path.segments().iter();
                let head = segments.next()?;
                let rest = ClausePath::from(segments.cloned().collect::<Vec<_>>());
                if head == "_source" {
                    return path::get_path(&self.body, &rest).cloned();
                }
                envelope
                    .get(head)
                    .and_then(|value| path::get_path(value, &rest))
                    .or_else(|| path::get_path(&self.body, path))
                    .cloned()
            }
            None => path::get_path(&self.body, path).cloned(),
        }
    }

    /// Consume into the field data.
    pub fn into_body(self) -> Value {
        self.body
    }
}

/// The `hits.hits` array of a response, or an empty list when absent.
pub fn hits_of(response: &Value) -> Vec<Value> {
    response
        .get("hits")
        .and_then(|hits| hits.get("hits"))
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}
