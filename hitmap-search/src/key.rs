//! Result keys and keyed collections.

use crate::hit::RawHit;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Key of one mapped result.
///
/// Integral numbers, and strings spelling a canonical integer, become
/// [`HitKey::Int`], so `_id: "5"` and `id: 5` address the same entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HitKey {
    /// Integer key.
    Int(i64),
    /// Any other key.
    Text(String),
}

impl HitKey {
    /// Derive a key from a JSON value.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Number(n) => match n.as_i64() {
                Some(i) => HitKey::Int(i),
                None => HitKey::Text(n.to_string()),
            },
            Value::String(s) => Self::from(s.as_str()),
            Value::Bool(b) => HitKey::Int(i64::from(*b)),
            Value::Null => HitKey::Text(String::new()),
            other => HitKey::Text(other.to_string()),
        }
    }

    /// The key as JSON.
    pub fn to_json(&self) -> Value {
        match self {
            HitKey::Int(i) => Value::from(*i),
            HitKey::Text(s) => Value::from(s.as_str()),
        }
    }
}

impl fmt::Display for HitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HitKey::Int(i) => write!(f, "{}", i),
            HitKey::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for HitKey {
    fn from(i: i64) -> Self {
        HitKey::Int(i)
    }
}

impl From<usize> for HitKey {
    fn from(i: usize) -> Self {
        i64::try_from(i)
            .map(HitKey::Int)
            .unwrap_or_else(|_| HitKey::Text(i.to_string()))
    }
}

impl From<&str> for HitKey {
    fn from(s: &str) -> Self {
        match s.parse::<i64>() {
            Ok(i) if i.to_string() == s => HitKey::Int(i),
            _ => HitKey::Text(s.to_string()),
        }
    }
}

impl From<String> for HitKey {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

/// Key derivation function over raw hits.
pub type HitKeyFn = Arc<dyn Fn(&RawHit) -> HitKey + Send + Sync>;

/// Key derivation function over hydrated records.
pub type RecordKeyFn<R> = Arc<dyn Fn(&R) -> HitKey + Send + Sync>;

/// How mapped results are keyed.
pub enum KeyPolicy<R> {
    /// Look the key up by field name.
    Field(String),
    /// Compute the key from the raw hit (row mode).
    Hit(HitKeyFn),
    /// Compute the key from the hydrated record (record mode).
    Record(RecordKeyFn<R>),
    /// No keys: results stay a list in arrival order.
    Disabled,
}

impl<R> KeyPolicy<R> {
    /// Key by a named field.
    pub fn field(name: impl Into<String>) -> Self {
        KeyPolicy::Field(name.into())
    }

    /// Key rows with a function of the raw hit.
    pub fn by_hit<F>(f: F) -> Self
    where
        F: Fn(&RawHit) -> HitKey + Send + Sync + 'static,
    {
        KeyPolicy::Hit(Arc::new(f))
    }

    /// Key records with a function of the record.
    pub fn by_record<F>(f: F) -> Self
    where
        F: Fn(&R) -> HitKey + Send + Sync + 'static,
    {
        KeyPolicy::Record(Arc::new(f))
    }

    /// Whether keying is turned off.
    pub fn is_disabled(&self) -> bool {
        matches!(self, KeyPolicy::Disabled)
    }

    /// The key field, for field policies.
    pub fn field_name(&self) -> Option<&str> {
        match self {
            KeyPolicy::Field(name) => Some(name),
            _ => None,
        }
    }
}

impl<R> Default for KeyPolicy<R> {
    fn default() -> Self {
        KeyPolicy::Field(crate::config::DEFAULT_KEY_FIELD.to_string())
    }
}

impl<R> Clone for KeyPolicy<R> {
    fn clone(&self) -> Self {
        match self {
            KeyPolicy::Field(name) => KeyPolicy::Field(name.clone()),
            KeyPolicy::Hit(f) => KeyPolicy::Hit(Arc::clone(f)),
            KeyPolicy::Record(f) => KeyPolicy::Record(Arc::clone(f)),
            KeyPolicy::Disabled => KeyPolicy::Disabled,
        }
    }
}

impl<R> fmt::Debug for KeyPolicy<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyPolicy::Field(name) => f.debug_tuple("Field").field(name).finish(),
            KeyPolicy::Hit(_) => f.write_str("Hit(<fn>)"),
            KeyPolicy::Record(_) => f.write_str("Record(<fn>)"),
            KeyPolicy::Disabled => f.write_str("Disabled"),
        }
    }
}

impl<R> From<&str> for KeyPolicy<R> {
    fn from(name: &str) -> Self {
        KeyPolicy::field(name)
    }
}

impl<R> From<Option<&str>> for KeyPolicy<R> {
    fn from(name: Option<&str>) -> Self {
        name.map_or(KeyPolicy::Disabled, KeyPolicy::field)
    }
}

/// Insertion-ordered map from [`HitKey`] to results.
///
/// Inserting an existing key replaces the value in place, so the entry keeps
/// the position of its first insertion.
#[derive(Debug, Clone)]
pub struct KeyedResults<T> {
    entries: Vec<(HitKey, T)>,
    positions: HashMap<HitKey, usize>,
}

impl<T> Default for KeyedResults<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            positions: HashMap::new(),
        }
    }
}

impl<T: PartialEq> PartialEq for KeyedResults<T> {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl<T> KeyedResults<T> {
    /// Create an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a result, returning the value it replaced.
    pub fn insert(&mut self, key: HitKey, value: T) -> Option<T> {
        match self.positions.get(&key) {
            Some(&pos) => Some(std::mem::replace(&mut self.entries[pos].1, value)),
            None => {
                self.positions.insert(key.clone(), self.entries.len());
                self.entries.push((key, value));
                None
            }
        }
    }

    /// Look up a result.
    pub fn get(&self, key: &HitKey) -> Option<&T> {
        self.positions.get(key).map(|&pos| &self.entries[pos].1)
    }

    /// Look up a result mutably.
    pub fn get_mut(&mut self, key: &HitKey) -> Option<&mut T> {
        self.positions
            .get(key)
            .copied()
            .map(move |pos| &mut self.entries[pos].1)
    }

    /// Whether a key is present.
    pub fn contains_key(&self, key: &HitKey) -> bool {
        self.positions.contains_key(key)
    }

    /// Number of results.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no results.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keys in order.
    pub fn keys(&self) -> impl Iterator<Item = &HitKey> {
        self.entries.iter().map(|(k, _)| k)
    }

    /// Values in order.
    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.entries.iter().map(|(_, v)| v)
    }

    /// Mutable values in order.
    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.entries.iter_mut().map(|(_, v)| v)
    }

    /// Entries in order.
    pub fn iter(&self) -> impl Iterator<Item = (&HitKey, &T)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    /// The last entry.
    pub fn last(&self) -> Option<(&HitKey, &T)> {
        self.entries.last().map(|(k, v)| (k, v))
    }
}

impl<T> IntoIterator for KeyedResults<T> {
    type Item = (HitKey, T);
    type IntoIter = std::vec::IntoIter<(HitKey, T)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<T> FromIterator<(HitKey, T)> for KeyedResults<T> {
    fn from_iter<I: IntoIterator<Item = (HitKey, T)>>(iter: I) -> Self {
        let mut results = Self::new();
        for (key, value) in iter {
            results.insert(key, value);
        }
        results
    }
}

/// Mapped results: keyed, or a plain list when keying is disabled.
#[derive(Debug, Clone, PartialEq)]
pub enum Collection<T> {
    /// Results addressed by key.
    Keyed(KeyedResults<T>),
    /// Results in arrival order.
    List(Vec<T>),
}

impl<T> Default for Collection<T> {
    fn default() -> Self {
        Collection::Keyed(KeyedResults::new())
    }
}

impl<T> Collection<T> {
    /// Number of results.
    pub fn len(&self) -> usize {
        match self {
            Collection::Keyed(keyed) => keyed.len(),
            Collection::List(list) => list.len(),
        }
    }

    /// Whether there are no results.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Look up a keyed result. Always `None` for lists.
    pub fn get(&self, key: &HitKey) -> Option<&T> {
        match self {
            Collection::Keyed(keyed) => keyed.get(key),
            Collection::List(_) => None,
        }
    }

    /// Results in order.
    pub fn values(&self) -> Box<dyn Iterator<Item = &T> + '_> {
        match self {
            Collection::Keyed(keyed) => Box::new(keyed.values()),
            Collection::List(list) => Box::new(list.iter()),
        }
    }

    /// Mutable results in order.
    pub fn values_mut(&mut self) -> Box<dyn Iterator<Item = &mut T> + '_> {
        match self {
            Collection::Keyed(keyed) => Box::new(keyed.values_mut()),
            Collection::List(list) => Box::new(list.iter_mut()),
        }
    }

    /// The last result.
    pub fn last(&self) -> Option<&T> {
        match self {
            Collection::Keyed(keyed) => keyed.last().map(|(_, v)| v),
            Collection::List(list) => list.last(),
        }
    }

    /// Consume into the results, dropping keys.
    pub fn into_values(self) -> Vec<T> {
        match self {
            Collection::Keyed(keyed) => keyed.into_iter().map(|(_, v)| v).collect(),
            Collection::List(list) => list,
        }
    }
}

impl Collection<Value> {
    /// Render as JSON: an object for keyed results, an array for lists.
    pub fn to_json(&self) -> Value {
        match self {
            Collection::Keyed(keyed) => Value::Object(
                keyed
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.clone()))
                    .collect::<Map<String, Value>>(),
            ),
            Collection::List(list) => Value::Array(list.clone()),
        }
    }
}
