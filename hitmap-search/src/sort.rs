//! Sort clause construction.

use serde_json::{json, Value};

/// Sort order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// Ascending.
    #[default]
    Asc,
    /// Descending.
    Desc,
}

impl SortOrder {
    /// Wire name of the order.
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

/// Ordered list of sort entries.
///
/// Each entry is either a `field → direction` pair or a raw clause passed
/// through untouched (script sorts, geo distance, ...).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SortSpec {
    entries: Vec<Value>,
}

impl SortSpec {
    /// Create an empty sort.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sort by the backend identity field, ascending.
    ///
    /// Installed when the caller never sets a sort so that pages over the
    /// same filter are stable.
    pub fn identity(identity_field: &str) -> Self {
        Self::new().by(identity_field, SortOrder::Asc)
    }

    /// Append a field sort.
    pub fn by(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.entries.push(json!({
            field.into(): { "order": order.as_str() }
        }));
        self
    }

    /// Append an ascending field sort.
    pub fn asc(self, field: impl Into<String>) -> Self {
        self.by(field, SortOrder::Asc)
    }

    /// Append a descending field sort.
    pub fn desc(self, field: impl Into<String>) -> Self {
        self.by(field, SortOrder::Desc)
    }

    /// Append a raw sort entry.
    pub fn raw(mut self, entry: Value) -> Self {
        self.entries.push(entry);
        self
    }

    /// Whether no entries were added.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// The `sort` clause value.
    pub fn to_json(&self) -> Value {
        Value::Array(self.entries.clone())
    }
}

impl From<Vec<Value>> for SortSpec {
    fn from(entries: Vec<Value>) -> Self {
        Self { entries }
    }
}

/// `[("price", Desc), ("_score", Desc)]` style input.
impl<S: Into<String>> From<Vec<(S, SortOrder)>> for SortSpec {
    fn from(fields: Vec<(S, SortOrder)>) -> Self {
        fields
            .into_iter()
            .fold(Self::new(), |spec, (field, order)| spec.by(field, order))
    }
}

/// Accepts a sort array, or a `{field: direction}` object whose entries are
/// split into one sort entry each, in object order.
impl From<Value> for SortSpec {
    fn from(value: Value) -> Self {
        match value {
            Value::Array(entries) => Self { entries },
            Value::Object(map) => Self {
                entries: map
                    .into_iter()
                    .map(|(field, direction)| json!({ field: direction }))
                    .collect(),
            },
            Value::Null => Self::new(),
            other => Self {
                entries: vec![other],
            },
        }
    }
}
