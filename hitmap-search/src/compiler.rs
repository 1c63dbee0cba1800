//! Search request compilation.
//!
//! [`QueryCompiler`] collects independent request axes (query, filter,
//! pagination, sort, aggregations, highlight and source projection) and
//! turns them into one [`RequestDocument`]. Axes that were never set are left
//! out of the document, except for two defaults: `_source` falls back to the
//! [`SourceProjection`] set with [`QueryCompiler::with_source`], and `sort`
//! falls back to the identity field in ascending order.

use crate::{
    config::SearchConfig,
    error::{Result, SearchError},
    path::{self, ClausePath},
    sort::SortSpec,
    source::SourceProjection,
};
use hitmap_log::debug;
use serde::Serialize;
use serde_json::{json, Map, Value};

/// A compiled search request body.
///
/// Clauses appear in a fixed order: `query`, `filter`, `from`, `size`, `aggs`,
/// `highlight`, `sort`, `_source`, then any [`ReservedClause`]s.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(transparent)]
pub struct RequestDocument {
    clauses: Map<String, Value>,
}

impl RequestDocument {
    /// Look up a top-level clause.
    pub fn get(&self, clause: &str) -> Option<&Value> {
        self.clauses.get(clause)
    }

    /// Whether a clause is present.
    pub fn contains(&self, clause: &str) -> bool {
        self.clauses.contains_key(clause)
    }

    /// Clause names in emission order.
    pub fn clause_names(&self) -> Vec<&str> {
        self.clauses.keys().map(String::as_str).collect()
    }

    /// Number of clauses.
    pub fn len(&self) -> usize {
        self.clauses.len()
    }

    /// Whether the document has no clauses.
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// The body as JSON.
    pub fn to_json(&self) -> Value {
        Value::Object(self.clauses.clone())
    }

    /// Consume into JSON.
    pub fn into_json(self) -> Value {
        Value::Object(self.clauses)
    }

    fn insert(&mut self, clause: &str, value: Value) {
        self.clauses.insert(clause.to_string(), value);
    }
}

/// Request clauses the compiler forwards verbatim but never synthesizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ReservedClause {
    /// `stored_fields`
    StoredFields,
    /// `script_fields`
    ScriptFields,
    /// `docvalue_fields`
    DocvalueFields,
    /// `rescore`
    Rescore,
    /// `explain`
    Explain,
    /// `min_score`
    MinScore,
    /// `collapse`
    Collapse,
}

impl ReservedClause {
    /// All reserved clauses in emission order.
    pub const ALL: [ReservedClause; 7] = [
        ReservedClause::StoredFields,
        ReservedClause::ScriptFields,
        ReservedClause::DocvalueFields,
        ReservedClause::Rescore,
        ReservedClause::Explain,
        ReservedClause::MinScore,
        ReservedClause::Collapse,
    ];

    /// Clause name on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservedClause::StoredFields => "stored_fields",
            ReservedClause::ScriptFields => "script_fields",
            ReservedClause::DocvalueFields => "docvalue_fields",
            ReservedClause::Rescore => "rescore",
            ReservedClause::Explain => "explain",
            ReservedClause::MinScore => "min_score",
            ReservedClause::Collapse => "collapse",
        }
    }
}

/// Input accepted by [`QueryCompiler::query`].
#[derive(Debug, Clone, PartialEq)]
pub enum QueryPayload {
    /// A query clause used as-is.
    Structured(Value),
    /// Free text searched across all fields.
    Text(String),
}

impl QueryPayload {
    /// Resolve to the `query` clause value.
    ///
    /// Blank text resolves to `match_all`.
    pub fn normalize(self) -> Value {
        match self {
            QueryPayload::Structured(value) => value,
            QueryPayload::Text(text) if text.trim().is_empty() => json!({ "match_all": {} }),
            QueryPayload::Text(text) => json!({ "query_string": { "query": text } }),
        }
    }
}

impl From<Value> for QueryPayload {
    fn from(value: Value) -> Self {
        match value {
            Value::String(text) => QueryPayload::Text(text),
            other => QueryPayload::Structured(other),
        }
    }
}

impl From<&str> for QueryPayload {
    fn from(text: &str) -> Self {
        QueryPayload::Text(text.to_string())
    }
}

impl From<String> for QueryPayload {
    fn from(text: String) -> Self {
        QueryPayload::Text(text)
    }
}

/// Builder for search request documents.
///
/// # Example
///
/// ```rust
/// use hitmap_search::{QueryCompiler, SortSpec};
/// use serde_json::json;
///
/// # fn main() -> hitmap_search::Result<()> {
/// let request = QueryCompiler::new()
///     .query("rust")
///     .limit(20, 40)?
///     .sort(SortSpec::new().desc("published_at"))
///     .compile();
///
/// assert_eq!(request.get("size"), Some(&json!(20)));
/// assert_eq!(request.get("_source"), Some(&json!(false)));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct QueryCompiler {
    identity_field: String,
    query: Value,
    filter: Value,
    from: u64,
    size: u64,
    aggs: Value,
    highlight: Value,
    sort: SortSpec,
    source: Vec<String>,
    with_source: SourceProjection,
    reserved: Vec<(ReservedClause, Value)>,
}

impl Default for QueryCompiler {
    fn default() -> Self {
        Self::with_config(&SearchConfig::default())
    }
}

impl QueryCompiler {
    /// Create a compiler using the default identity field.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a compiler whose default sort runs on `config.identity_field`.
    pub fn with_config(config: &SearchConfig) -> Self {
        Self {
            identity_field: config.identity_field.clone(),
            query: Value::Null,
            filter: Value::Null,
            from: 0,
            size: 0,
            aggs: Value::Null,
            highlight: Value::Null,
            sort: SortSpec::new(),
            source: Vec::new(),
            with_source: SourceProjection::Disabled,
            reserved: Vec::new(),
        }
    }

    /// Write `value` at `path` inside the pending query clause.
    pub fn set_clause(mut self, path: impl Into<ClausePath>, value: Value) -> Self {
        path::set_path(&mut self.query, &path.into(), value);
        self
    }

    /// Read the value at `path` inside the pending query clause.
    pub fn get_clause(&self, path: impl Into<ClausePath>) -> Option<&Value> {
        path::get_path(&self.query, &path.into())
    }

    /// Deep-merge a fragment into the pending query clause.
    ///
    /// Arrays under the same key are concatenated; other conflicts take the
    /// fragment's value.
    pub fn merge_clause(mut self, fragment: Value) -> Self {
        let current = std::mem::take(&mut self.query);
        self.query = path::merge(current, fragment);
        self
    }

    /// Replace the query clause.
    pub fn query(mut self, payload: impl Into<QueryPayload>) -> Self {
        self.query = payload.into().normalize();
        self
    }

    /// Set the filter clause.
    pub fn filter(mut self, filter: Value) -> Self {
        self.filter = filter;
        self
    }

    /// Set the pagination window.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Config`] when either value is negative.
    pub fn limit(mut self, size: i64, from: i64) -> Result<Self> {
        self.size = u64::try_from(size)
            .map_err(|_| SearchError::config(format!("size must be non-negative, got {}", size)))?;
        self.from = u64::try_from(from)
            .map_err(|_| SearchError::config(format!("from must be non-negative, got {}", from)))?;
        Ok(self)
    }

    /// Set the sort. An empty sort leaves the current one in place.
    pub fn sort(mut self, sort: impl Into<SortSpec>) -> Self {
        let sort = sort.into();
        if !sort.is_empty() {
            self.sort = sort;
        }
        self
    }

    /// Replace the aggregations clause. An empty object clears it.
    pub fn aggregations(mut self, aggs: Value) -> Self {
        self.aggs = aggs;
        self
    }

    /// Replace the highlight clause. An empty object clears it.
    pub fn highlight(mut self, highlight: Value) -> Self {
        self.highlight = highlight;
        self
    }

    /// Set an explicit `_source` field list.
    ///
    /// A non-empty list takes precedence over [`QueryCompiler::with_source`].
    pub fn source<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.source = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Set the `_source` projection used when no field list is set.
    pub fn with_source(mut self, projection: impl Into<SourceProjection>) -> Self {
        self.with_source = projection.into();
        self
    }

    /// Forward a reserved clause verbatim. Setting it again replaces it.
    pub fn pass_through(mut self, clause: ReservedClause, value: Value) -> Self {
        self.reserved.retain(|(existing, _)| *existing != clause);
        self.reserved.push((clause, value));
        self
    }

    /// The pending query clause.
    pub fn query_clause(&self) -> &Value {
        &self.query
    }

    /// Produce the request document.
    ///
    /// Calling this repeatedly without changes yields equal documents.
    pub fn compile(&self) -> RequestDocument {
        let mut body = RequestDocument::default();

        let axes = [
            ("query", self.query.clone()),
            ("filter", self.filter.clone()),
            ("from", json!(self.from)),
            ("size", json!(self.size)),
            ("aggs", self.aggs.clone()),
            ("highlight", self.highlight.clone()),
        ];
        for (clause, value) in axes {
            if !path::is_blank(&value) {
                body.insert(clause, value);
            }
        }

        let sort = if self.sort.is_empty() {
            SortSpec::identity(&self.identity_field)
        } else {
            self.sort.clone()
        };
        body.insert("sort", sort.to_json());

        let source = if self.source.is_empty() {
            self.with_source.to_json()
        } else {
            json!(self.source)
        };
        body.insert("_source", source);

        for clause in ReservedClause::ALL {
            if let Some((_, value)) = self.reserved.iter().find(|(c, _)| *c == clause) {
                body.insert(clause.as_str(), value.clone());
            }
        }

        debug!("Compiled search request: {:?}", body.clause_names());
        body
    }
}
