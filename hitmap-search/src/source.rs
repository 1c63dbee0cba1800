//! `_source` projection modes.

use serde_json::{json, Value};

/// What the backend should return of each hit's `_source`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SourceProjection {
    /// `false`: return no source at all.
    #[default]
    Disabled,
    /// `"*"`: return the full source.
    All,
    /// Return only the listed fields.
    Fields(Vec<String>),
    /// Explicit include/exclude patterns.
    Filter {
        /// Patterns to include.
        includes: Vec<String>,
        /// Patterns to exclude.
        excludes: Vec<String>,
    },
}

impl SourceProjection {
    /// Shorthand for [`SourceProjection::Fields`].
    pub fn fields<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        SourceProjection::Fields(fields.into_iter().map(Into::into).collect())
    }

    /// The `_source` clause value.
    pub fn to_json(&self) -> Value {
        match self {
            SourceProjection::Disabled => Value::Bool(false),
            SourceProjection::All => json!("*"),
            SourceProjection::Fields(fields) => json!(fields),
            SourceProjection::Filter { includes, excludes } => {
                let mut filter = serde_json::Map::new();
                if !includes.is_empty() {
                    filter.insert("includes".to_string(), json!(includes));
                }
                if !excludes.is_empty() {
                    filter.insert("excludes".to_string(), json!(excludes));
                }
                Value::Object(filter)
            }
        }
    }
}

impl From<bool> for SourceProjection {
    fn from(enabled: bool) -> Self {
        if enabled {
            SourceProjection::All
        } else {
            SourceProjection::Disabled
        }
    }
}

impl From<&str> for SourceProjection {
    fn from(pattern: &str) -> Self {
        match pattern {
            "*" => SourceProjection::All,
            "" => SourceProjection::Disabled,
            field => SourceProjection::Fields(vec![field.to_string()]),
        }
    }
}

impl From<Vec<String>> for SourceProjection {
    fn from(fields: Vec<String>) -> Self {
        SourceProjection::Fields(fields)
    }
}
