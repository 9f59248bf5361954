//! Hierarchical key/value data containers.
//!
//! A [`Dataset`] maps string keys to [`Value`]s and is the unit of context a
//! template is rendered against. A [`DatasetCollection`] is an ordered
//! sequence of datasets; besides carrying loop data it doubles as the
//! renderer's scope stack through its last-to-first priority scan.
//!
//! Both containers are cheap shared handles (`Arc` + `RwLock`): cloning a
//! handle aliases the same storage. This is deliberate — the renderer writes
//! the `.counter` key onto the caller's own loop elements, and that mutation
//! must be observable. Use `deep_clone` for an isolated copy.

mod collection;

pub use collection::DatasetCollection;

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::value::Value;

/// Key path delimiter: `a>b>c` descends nested containers.
pub const PATH_DELIMITER: char = '>';

/// A mapping from string keys to dynamically-typed values.
///
/// Lookups never create keys. Key iteration order is irrelevant to lookup
/// semantics; formatted output always sorts keys so dumps are deterministic.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    entries: Arc<RwLock<FxHashMap<String, Value>>>,
}

impl Dataset {
    /// Create an empty dataset.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a dataset from a JSON object.
    ///
    /// Objects become nested datasets, arrays holding objects become
    /// collections (non-object elements are skipped), homogeneous scalar
    /// arrays become primitive lists, and mixed scalar arrays fall back to a
    /// string list. A non-object root yields an empty dataset.
    pub fn from_json(json: &serde_json::Value) -> Self {
        let ds = Dataset::new();
        if let serde_json::Value::Object(map) = json {
            for (key, value) in map {
                ds.set(key.clone(), json_to_value(value));
            }
        }
        ds
    }

    /// Set `key` to `value`, replacing any previous entry.
    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.entries.write().insert(key.into(), value.into());
    }

    /// Remove `key` if present.
    pub fn del(&self, key: &str) {
        self.entries.write().remove(key);
    }

    /// Look up `key`, which may be a `>`-delimited path descending through
    /// nested datasets by key and through collections by integer index.
    ///
    /// Any missing segment or kind mismatch is `None`, never an error.
    pub fn get(&self, key: &str) -> Option<Value> {
        if let Some((head, rest)) = key.split_once(PATH_DELIMITER) {
            let nested = self.entries.read().get(head).cloned()?;
            return match nested {
                Value::Dataset(ds) => ds.get(rest),
                Value::Collection(col) => {
                    let (index, tail) = match rest.split_once(PATH_DELIMITER) {
                        Some((index, tail)) => (index, Some(tail)),
                        None => (rest, None),
                    };
                    let entry = col.get(index.parse().ok()?)?;
                    match tail {
                        Some(tail) => entry.get(tail),
                        None => Some(Value::Dataset(entry)),
                    }
                }
                _ => None,
            };
        }
        self.entries.read().get(key).cloned()
    }

    /// Look up `key` and format the value. Every present value formats to
    /// some string; `Null` formats to "".
    pub fn get_string(&self, key: &str) -> Option<String> {
        self.get(key).map(|v| v.format())
    }

    /// Look up `key` as a boolean (see [`Value::as_bool`] for coercions).
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).map(|v| v.as_bool())
    }

    /// Look up `key` as an integer; non-numeric kinds report not found.
    pub fn get_int(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(|v| v.as_int())
    }

    /// Look up `key` as a float; non-numeric kinds report not found.
    pub fn get_float(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(|v| v.as_float())
    }

    /// Look up `key` as a timestamp. Exact kind match.
    pub fn get_time(&self, key: &str) -> Option<DateTime<Utc>> {
        match self.get(key) {
            Some(Value::Time(t)) => Some(t),
            _ => None,
        }
    }

    /// Look up `key` as a nested dataset handle. Exact kind match.
    pub fn get_dataset(&self, key: &str) -> Option<Dataset> {
        self.get(key).and_then(|v| v.as_dataset())
    }

    /// Look up `key` as a collection handle. Exact kind match.
    pub fn get_collection(&self, key: &str) -> Option<DatasetCollection> {
        self.get(key).and_then(|v| v.as_collection())
    }

    /// Look up `key` as a list of strings. Exact kind match.
    pub fn get_string_list(&self, key: &str) -> Option<Vec<String>> {
        match self.get(key) {
            Some(Value::StrList(l)) => Some(l),
            _ => None,
        }
    }

    /// Look up `key` as a list of booleans. Exact kind match.
    pub fn get_bool_list(&self, key: &str) -> Option<Vec<bool>> {
        match self.get(key) {
            Some(Value::BoolList(l)) => Some(l),
            _ => None,
        }
    }

    /// Look up `key` as a list of integers. Exact kind match.
    pub fn get_int_list(&self, key: &str) -> Option<Vec<i64>> {
        match self.get(key) {
            Some(Value::IntList(l)) => Some(l),
            _ => None,
        }
    }

    /// Look up `key` as a list of floats. Exact kind match.
    pub fn get_float_list(&self, key: &str) -> Option<Vec<f64>> {
        match self.get(key) {
            Some(Value::FloatList(l)) => Some(l),
            _ => None,
        }
    }

    /// Look up `key` as a list of timestamps. Exact kind match.
    pub fn get_time_list(&self, key: &str) -> Option<Vec<DateTime<Utc>>> {
        match self.get(key) {
            Some(Value::TimeList(l)) => Some(l),
            _ => None,
        }
    }

    /// Number of top-level keys.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Top-level keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Recursively copy this dataset and every nested container. Scalars
    /// copy by value; opaque values stay shared. Mutations through the copy
    /// are never observable through the original, and vice versa.
    pub fn deep_clone(&self) -> Dataset {
        let cloned = Dataset::new();
        {
            let source = self.entries.read();
            let mut target = cloned.entries.write();
            for (key, value) in source.iter() {
                target.insert(key.clone(), value.deep_clone());
            }
        }
        cloned
    }

    /// Whether `other` aliases the same underlying storage.
    pub fn same_handle(&self, other: &Dataset) -> bool {
        Arc::ptr_eq(&self.entries, &other.entries)
    }
}

impl fmt::Display for Dataset {
    /// Deterministic dump: `Dataset{key:value key2:value2}`, keys sorted.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = self.entries.read();
        let mut parts: Vec<String> = entries
            .iter()
            .map(|(key, value)| format!("{key}:{value}"))
            .collect();
        parts.sort();
        write!(f, "Dataset{{{}}}", parts.join(" "))
    }
}

impl FromIterator<(String, Value)> for Dataset {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        let ds = Dataset::new();
        for (key, value) in iter {
            ds.set(key, value);
        }
        ds
    }
}

fn json_to_value(json: &serde_json::Value) -> Value {
    use serde_json::Value as Json;
    match json {
        Json::Null => Value::Null,
        Json::Bool(b) => Value::Bool(*b),
        Json::Number(n) => n
            .as_i64()
            .map(Value::Int)
            .or_else(|| n.as_f64().map(Value::Float))
            .unwrap_or(Value::Null),
        Json::String(s) => Value::Str(s.clone()),
        Json::Object(_) => Value::Dataset(Dataset::from_json(json)),
        Json::Array(items) => json_array_to_value(items),
    }
}

fn json_array_to_value(items: &[serde_json::Value]) -> Value {
    use serde_json::Value as Json;

    if items.iter().any(Json::is_object) {
        let col = DatasetCollection::new();
        for item in items.iter().filter(|i| i.is_object()) {
            col.push(Dataset::from_json(item));
        }
        return Value::Collection(col);
    }
    if items.iter().all(Json::is_boolean) {
        return Value::BoolList(items.iter().filter_map(Json::as_bool).collect());
    }
    if items.iter().all(Json::is_i64) {
        return Value::IntList(items.iter().filter_map(Json::as_i64).collect());
    }
    if items.iter().all(Json::is_number) {
        return Value::FloatList(items.iter().filter_map(Json::as_f64).collect());
    }
    if items.iter().all(Json::is_string) {
        return Value::StrList(
            items
                .iter()
                .filter_map(|i| i.as_str().map(str::to_owned))
                .collect(),
        );
    }
    // mixed scalars: keep them, as text
    Value::StrList(
        items
            .iter()
            .map(|i| match i {
                Json::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect(),
    )
}
