//! Typed records and the record-construction capability.

use crate::error::{Result, SearchError};
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};

/// A typed record hits can be hydrated into.
///
/// Everything has a serde-based default, so most types only need the
/// derives:
///
/// ```rust
/// use hitmap_search::Record;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, Default, Serialize, Deserialize)]
/// #[serde(default)]
/// struct Article {
///     id: u64,
///     title: String,
/// }
///
/// impl Record for Article {}
/// ```
pub trait Record: Serialize + DeserializeOwned + Send + Sync {
    /// Value of an attribute, if the record has it.
    fn attribute(&self, name: &str) -> Option<Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(mut map)) => map.remove(name),
            _ => None,
        }
    }

    /// Number of attributes in the record's full schema.
    fn attribute_count(&self) -> usize {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map.len(),
            _ => 0,
        }
    }

    /// Attach related data loaded by a relation. Ignored by default.
    fn populate_relation(&mut self, _name: &str, _related: Value) {}

    /// Called once per record after mapping and relation loading.
    fn after_find(&mut self) {}
}

impl Record for Value {
    fn attribute(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }

    fn attribute_count(&self) -> usize {
        self.as_object().map_or(0, Map::len)
    }

    fn populate_relation(&mut self, name: &str, related: Value) {
        if let Value::Object(map) = self {
            map.insert(name.to_string(), related);
        }
    }
}

/// How many of a record's attributes a hit supplied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldCoverage {
    /// Attributes in the record schema.
    pub attributes: usize,
    /// Fields the hit carried.
    pub supplied: usize,
}

impl FieldCoverage {
    /// Create a coverage report.
    pub fn new(attributes: usize, supplied: usize) -> Self {
        Self {
            attributes,
            supplied,
        }
    }

    /// Whether the counts differ, meaning the record was built from a
    /// partial (or foreign) field set.
    pub fn is_partial(&self) -> bool {
        self.attributes != self.supplied
    }
}

/// A freshly built record with its coverage.
#[derive(Debug, Clone)]
pub struct Hydrated<R> {
    /// The record.
    pub record: R,
    /// Attribute coverage of the source fields.
    pub coverage: FieldCoverage,
}

/// Builds records from hit fields and fetches full records by identity.
#[async_trait]
pub trait RecordStore<R: Record>: Send + Sync {
    /// Construct a record from a raw field map.
    ///
    /// # Errors
    ///
    /// [`SearchError::Hydration`] when the fields do not fit the record.
    fn instantiate(&self, fields: &Map<String, Value>) -> Result<R> {
        serde_json::from_value(Value::Object(fields.clone()))
            .map_err(|e| SearchError::hydration(e.to_string()))
    }

    /// Finish populating `record` from `fields` and report coverage.
    ///
    /// The default assumes [`RecordStore::instantiate`] already copied every
    /// field and only compares counts.
    fn populate(&self, record: &mut R, fields: &Map<String, Value>) -> Result<FieldCoverage> {
        Ok(FieldCoverage::new(record.attribute_count(), fields.len()))
    }

    /// Instantiate and populate in one step.
    fn hydrate(&self, fields: &Map<String, Value>) -> Result<Hydrated<R>> {
        let mut record = self.instantiate(fields)?;
        let coverage = self.populate(&mut record, fields)?;
        Ok(Hydrated { record, coverage })
    }

    /// Fetch the complete record addressed by `identity`.
    async fn find_by_identity(&self, identity: &Value) -> Result<Option<R>>;
}
