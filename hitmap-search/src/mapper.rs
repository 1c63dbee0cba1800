//! Mapping raw hits into keyed results.
//!
//! [`ResultMapper`] takes a response document (or a bare hit list) and
//! produces either plain field maps ("rows") or hydrated records, keyed by
//! a [`KeyPolicy`]. Hits that cannot be turned into a complete record are
//! dropped rather than reported.

use crate::{
    config::SearchConfig,
    error::{Result, SearchError},
    hit::{hits_of, RawHit},
    key::{Collection, HitKey, KeyPolicy, KeyedResults},
    path::{self, ClausePath},
    record::{Record, RecordStore},
    relation::{populate_relations, RelationSpec},
};
use hitmap_log::{debug, trace, warn};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

/// Projection applied to each hit before keying.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectPath {
    /// `path.*`: every element of the sequence at `path` becomes a hit.
    Flatten(ClausePath),
    /// `path`: the hit is replaced by the value at `path`; hits without one
    /// are dropped.
    Value(ClausePath),
}

impl SelectPath {
    /// Parse `"tags.*"` into [`SelectPath::Flatten`], anything else into
    /// [`SelectPath::Value`].
    pub fn parse(path: &str) -> Self {
        match path.strip_suffix(".*") {
            Some(prefix) => SelectPath::Flatten(ClausePath::parse(prefix)),
            None => SelectPath::Value(ClausePath::parse(path)),
        }
    }

    /// Project a hit sequence.
    pub fn apply(&self, hits: Vec<RawHit>) -> Vec<RawHit> {
        let mut selected = Vec::new();
        for hit in &hits {
            match self {
                SelectPath::Flatten(at) => match hit.select(at) {
                    Some(Value::Array(items)) => selected.extend(items),
                    Some(Value::Object(map)) => selected.extend(map.into_iter().map(|(_, v)| v)),
                    Some(value) if !path::is_blank(&value) => selected.push(value),
                    _ => {}
                },
                SelectPath::Value(at) => {
                    if let Some(value) = hit.select(at).filter(|v| !path::is_blank(v)) {
                        selected.push(value);
                    }
                }
            }
        }
        selected.into_iter().map(RawHit::from_value).collect()
    }
}

impl From<&str> for SelectPath {
    fn from(path: &str) -> Self {
        Self::parse(path)
    }
}

/// Output of a [`ResultMapper`].
#[derive(Debug, Clone, PartialEq)]
pub enum MappedResults<R> {
    /// Field maps (array mode).
    Rows(Collection<Value>),
    /// Hydrated records.
    Records(Collection<R>),
}

impl<R: Record> MappedResults<R> {
    /// Number of results.
    pub fn len(&self) -> usize {
        match self {
            MappedResults::Rows(rows) => rows.len(),
            MappedResults::Records(records) => records.len(),
        }
    }

    /// Whether there are no results.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The rows, in array mode.
    pub fn rows(&self) -> Option<&Collection<Value>> {
        match self {
            MappedResults::Rows(rows) => Some(rows),
            MappedResults::Records(_) => None,
        }
    }

    /// The records, in hydrating mode.
    pub fn records(&self) -> Option<&Collection<R>> {
        match self {
            MappedResults::Records(records) => Some(records),
            MappedResults::Rows(_) => None,
        }
    }

    /// Consume into rows.
    pub fn into_rows(self) -> Option<Collection<Value>> {
        match self {
            MappedResults::Rows(rows) => Some(rows),
            MappedResults::Records(_) => None,
        }
    }

    /// Consume into records.
    pub fn into_records(self) -> Option<Collection<R>> {
        match self {
            MappedResults::Records(records) => Some(records),
            MappedResults::Rows(_) => None,
        }
    }

    /// The last result, or `None` when empty.
    pub fn into_last(self) -> Option<Mapped<R>> {
        match self {
            MappedResults::Rows(rows) => rows.into_values().pop().map(Mapped::Row),
            MappedResults::Records(records) => records.into_values().pop().map(Mapped::Record),
        }
    }

    /// Attribute `name` of every result, in order.
    pub fn attributes(&self, name: &str) -> Vec<Option<Value>> {
        match self {
            MappedResults::Rows(rows) => rows.values().map(|row| row.attribute(name)).collect(),
            MappedResults::Records(records) => {
                records.values().map(|record| record.attribute(name)).collect()
            }
        }
    }

    /// Attach relation data to every result, computed from its `link`
    /// attribute.
    pub fn attach<F>(&mut self, relation: &str, link: &str, related: F)
    where
        F: FnMut(Option<&Value>) -> Value,
    {
        match self {
            MappedResults::Rows(rows) => attach_each(rows, relation, link, related),
            MappedResults::Records(records) => attach_each(records, relation, link, related),
        }
    }
}

/// A single mapped result.
#[derive(Debug, Clone, PartialEq)]
pub enum Mapped<R> {
    /// A field map.
    Row(Value),
    /// A hydrated record.
    Record(R),
}

fn attach_each<T, F>(results: &mut Collection<T>, relation: &str, link: &str, mut related: F)
where
    T: Record,
    F: FnMut(Option<&Value>) -> Value,
{
    for item in results.values_mut() {
        let value = item.attribute(link);
        let data = related(value.as_ref());
        item.populate_relation(relation, data);
    }
}

fn empty_collection<T, R>(key: &KeyPolicy<R>) -> Collection<T> {
    if key.is_disabled() {
        Collection::List(Vec::new())
    } else {
        Collection::Keyed(KeyedResults::new())
    }
}

/// Issues zero-based fallback keys for hits missing their key field.
#[derive(Default)]
struct FallbackKeys(i64);

impl FallbackKeys {
    fn next(&mut self) -> HitKey {
        let key = HitKey::Int(self.0);
        self.0 += 1;
        key
    }
}

/// Turns raw hits into keyed rows or records.
///
/// # Example
///
/// ```rust
/// use hitmap_search::{HitKey, ResultMapper};
/// use serde_json::json;
///
/// # #[tokio::main]
/// # async fn main() -> hitmap_search::Result<()> {
/// let response = json!({
///     "hits": { "hits": [{ "_id": "1", "_source": { "id": 1, "title": "x" } }] }
/// });
///
/// let rows = ResultMapper::rows()
///     .map(&response)
///     .await?
///     .into_rows()
///     .unwrap_or_default();
///
/// assert_eq!(rows.get(&HitKey::Int(1)), Some(&json!({ "id": 1, "title": "x" })));
/// # Ok(())
/// # }
/// ```
pub struct ResultMapper<R: Record> {
    key: KeyPolicy<R>,
    as_array: bool,
    select: Option<SelectPath>,
    relations: Vec<RelationSpec<R>>,
    identity_field: String,
    store: Option<Arc<dyn RecordStore<R>>>,
}

impl ResultMapper<Value> {
    /// A mapper in array mode that needs no record store.
    pub fn rows() -> Self {
        Self::rows_with_config(&SearchConfig::default())
    }

    /// [`ResultMapper::rows`] with the key field taken from `config`.
    pub fn rows_with_config(config: &SearchConfig) -> Self {
        Self {
            as_array: true,
            ..Self::unbound(config)
        }
    }
}

impl<R: Record + 'static> ResultMapper<R> {
    /// A hydrating mapper backed by `store`.
    pub fn new(store: Arc<dyn RecordStore<R>>) -> Self {
        Self::with_config(store, &SearchConfig::default())
    }

    /// A hydrating mapper using `config` for the key and identity fields.
    pub fn with_config(store: Arc<dyn RecordStore<R>>, config: &SearchConfig) -> Self {
        Self {
            store: Some(store),
            ..Self::unbound(config)
        }
    }

    fn unbound(config: &SearchConfig) -> Self {
        Self {
            key: KeyPolicy::field(config.key_field.clone()),
            as_array: false,
            select: None,
            relations: Vec::new(),
            identity_field: config.identity_field.clone(),
            store: None,
        }
    }

    /// Set the key policy.
    pub fn key_by(mut self, policy: impl Into<KeyPolicy<R>>) -> Self {
        self.key = policy.into();
        self
    }

    /// Return field maps instead of records.
    pub fn as_array(mut self, as_array: bool) -> Self {
        self.as_array = as_array;
        self
    }

    /// Project each hit before keying.
    pub fn select_path(mut self, path: impl Into<SelectPath>) -> Self {
        self.select = Some(path.into());
        self
    }

    /// Load these relations after mapping.
    pub fn with_relations(mut self, relations: Vec<RelationSpec<R>>) -> Self {
        self.relations = relations;
        self
    }

    /// Add one relation.
    pub fn with_relation(mut self, relation: RelationSpec<R>) -> Self {
        self.relations.push(relation);
        self
    }

    /// Whether the mapper returns field maps.
    pub fn is_array(&self) -> bool {
        self.as_array
    }

    /// Map the `hits.hits` of a response document.
    ///
    /// A response without hits maps to an empty result.
    pub async fn map(&self, response: &Value) -> Result<MappedResults<R>> {
        self.map_hits(hits_of(response)).await
    }

    /// Map a bare hit list.
    ///
    /// # Errors
    ///
    /// [`SearchError::Config`] for contradictory settings, and
    /// [`SearchError::Hydration`] when the record store cannot build a record.
    pub async fn map_hits(&self, hits: Vec<Value>) -> Result<MappedResults<R>> {
        if hits.is_empty() {
            return Ok(self.empty());
        }

        self.validate()?;

        debug!(
            "Mapping {} hits ({})",
            hits.len(),
            if self.as_array { "rows" } else { "records" }
        );

        let mut hits: Vec<RawHit> = hits.into_iter().map(RawHit::from_value).collect();
        if let Some(select) = &self.select {
            if !hits.is_empty() {
                hits = select.apply(hits);
            }
        }

        let mut results = if self.as_array {
            MappedResults::Rows(self.key_rows(hits))
        } else {
            MappedResults::Records(self.hydrate(hits).await?)
        };

        if results.is_empty() {
            return Ok(results);
        }

        if !self.relations.is_empty() {
            populate_relations(&self.relations, &mut results, self.as_array).await?;
        }

        if let MappedResults::Records(records) = &mut results {
            for record in records.values_mut() {
                record.after_find();
            }
        }

        Ok(results)
    }

    fn empty(&self) -> MappedResults<R> {
        if self.as_array {
            MappedResults::Rows(empty_collection(&self.key))
        } else {
            MappedResults::Records(empty_collection(&self.key))
        }
    }

    fn validate(&self) -> Result<()> {
        if self.as_array {
            if let KeyPolicy::Record(_) = self.key {
                return Err(SearchError::config(
                    "a record key function cannot key rows; use a hit key function",
                ));
            }
            return Ok(());
        }

        if self.select.is_some() {
            return Err(SearchError::config(
                "select_path projections cannot be hydrated into records; enable as_array",
            ));
        }
        if let KeyPolicy::Hit(_) = self.key {
            return Err(SearchError::config(
                "a hit key function cannot key records; use a record key function",
            ));
        }
        if self.store.is_none() {
            return Err(SearchError::config("hydrating requires a record store"));
        }
        Ok(())
    }

    fn key_rows(&self, hits: Vec<RawHit>) -> Collection<Value> {
        let mut fallback = FallbackKeys::default();
        let mut keyed = KeyedResults::new();

        if self.key.is_disabled() {
            return Collection::List(hits.into_iter().map(RawHit::into_body).collect());
        }

        for hit in hits {
            let key = match &self.key {
                KeyPolicy::Field(name) => hit
                    .lookup(name)
                    .filter(|v| !v.is_null())
                    .map(HitKey::from_value)
                    .unwrap_or_else(|| fallback.next()),
                KeyPolicy::Hit(f) => f(&hit),
                KeyPolicy::Record(_) | KeyPolicy::Disabled => fallback.next(),
            };
            keyed.insert(key, hit.into_body());
        }

        Collection::Keyed(keyed)
    }

    async fn hydrate(&self, hits: Vec<RawHit>) -> Result<Collection<R>> {
        let Some(store) = &self.store else {
            return Err(SearchError::config("hydrating requires a record store"));
        };

        let mut fallback = FallbackKeys::default();
        let mut keyed = KeyedResults::new();
        let mut list = Vec::new();

        for hit in hits {
            let Some(record) = self.hydrate_one(store.as_ref(), hit).await? else {
                continue;
            };

            match &self.key {
                KeyPolicy::Disabled => list.push(record),
                KeyPolicy::Field(name) => {
                    let key = record
                        .attribute(name)
                        .filter(|v| !v.is_null())
                        .map(|v| HitKey::from_value(&v))
                        .unwrap_or_else(|| fallback.next());
                    keyed.insert(key, record);
                }
                KeyPolicy::Record(f) => {
                    keyed.insert(f(&record), record);
                }
                KeyPolicy::Hit(_) => {
                    keyed.insert(fallback.next(), record);
                }
            }
        }

        Ok(if self.key.is_disabled() {
            Collection::List(list)
        } else {
            Collection::Keyed(keyed)
        })
    }

    /// Build one record, falling back to an identity lookup when the hit
    /// only covered part of the schema. `None` means the hit is dropped.
    async fn hydrate_one(&self, store: &dyn RecordStore<R>, hit: RawHit) -> Result<Option<R>> {
        let fields = match &hit.body {
            Value::Object(fields) => fields.clone(),
            Value::Array(_) => {
                debug!("Dropping hit: a sequence is not a record");
                return Ok(None);
            }
            scalar => {
                let mut fields = Map::new();
                fields.insert(self.identity_field.clone(), scalar.clone());
                fields
            }
        };

        let hydrated = store.hydrate(&fields)?;
        if !hydrated.coverage.is_partial() {
            return Ok(Some(hydrated.record));
        }

        let Some(identity) = self.identity_of(&hit, &fields) else {
            debug!(
                "Dropping partial hit without identity ({} of {} attributes)",
                hydrated.coverage.supplied, hydrated.coverage.attributes
            );
            return Ok(None);
        };

        trace!("Partial hit, looking up identity {}", identity);
        match store.find_by_identity(&identity).await {
            Ok(Some(record)) => Ok(Some(record)),
            Ok(None) => {
                debug!("Dropping partial hit: identity {} not found", identity);
                Ok(None)
            }
            Err(e) => {
                warn!("Dropping partial hit: lookup of {} failed: {}", identity, e);
                Ok(None)
            }
        }
    }

    fn identity_of(&self, hit: &RawHit, fields: &Map<String, Value>) -> Option<Value> {
        let key_field = self.key.field_name().and_then(|name| fields.get(name));
        [hit.identity.as_ref(), fields.get(&self.identity_field), key_field]
            .into_iter()
            .flatten()
            .find(|id| !path::is_blank(id))
            .cloned()
    }
}

impl<R: Record> fmt::Debug for ResultMapper<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultMapper")
            .field("key", &self.key)
            .field("as_array", &self.as_array)
            .field("select", &self.select)
            .field("relations", &self.relations)
            .field("identity_field", &self.identity_field)
            .field("has_store", &self.store.is_some())
            .finish()
    }
}
