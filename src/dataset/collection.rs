//! Ordered collections of datasets.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::dataset::Dataset;
use crate::value::Value;

/// An ordered, 0-indexed sequence of [`Dataset`] handles.
///
/// Besides holding loop data, a collection is the renderer's scope stack:
/// [`DatasetCollection::get_data`] scans entries from the last index down to
/// 0, so the most recently pushed entry shadows the ones below it.
///
/// Like [`Dataset`], this is a cheap shared handle; `clone` aliases, and
/// `deep_clone` copies.
#[derive(Debug, Clone, Default)]
pub struct DatasetCollection {
    entries: Arc<RwLock<Vec<Dataset>>>,
}

impl DatasetCollection {
    /// Create an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `data` at the end.
    pub fn push(&self, data: Dataset) {
        self.entries.write().push(data);
    }

    /// Remove and return the last entry.
    pub fn pop(&self) -> Option<Dataset> {
        self.entries.write().pop()
    }

    /// Insert `data` at the front.
    pub fn unshift(&self, data: Dataset) {
        self.entries.write().insert(0, data);
    }

    /// Remove and return the first entry.
    pub fn shift(&self) -> Option<Dataset> {
        let mut entries = self.entries.write();
        if entries.is_empty() {
            return None;
        }
        Some(entries.remove(0))
    }

    /// Number of entries.
    pub fn count(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Entry at `index`, if in range.
    pub fn get(&self, index: usize) -> Option<Dataset> {
        self.entries.read().get(index).cloned()
    }

    /// Priority scan: search entries from the last index down to 0 and
    /// return the value of the first entry that has `key`. Recency wins.
    pub fn get_data(&self, key: &str) -> Option<Value> {
        let entries = self.entries.read();
        for entry in entries.iter().rev() {
            if let Some(value) = entry.get(key) {
                return Some(value);
            }
        }
        None
    }

    /// Priority scan, formatted. Present values always format to something.
    pub fn get_data_string(&self, key: &str) -> Option<String> {
        self.get_data(key).map(|v| v.format())
    }

    /// Priority scan as a boolean. Exact kind match.
    pub fn get_data_bool(&self, key: &str) -> Option<bool> {
        match self.get_data(key) {
            Some(Value::Bool(b)) => Some(b),
            _ => None,
        }
    }

    /// Priority scan as an integer. Exact kind match.
    pub fn get_data_int(&self, key: &str) -> Option<i64> {
        match self.get_data(key) {
            Some(Value::Int(i)) => Some(i),
            _ => None,
        }
    }

    /// Priority scan as a float. Exact kind match.
    pub fn get_data_float(&self, key: &str) -> Option<f64> {
        match self.get_data(key) {
            Some(Value::Float(f)) => Some(f),
            _ => None,
        }
    }

    /// Priority scan as a timestamp. Exact kind match.
    pub fn get_data_time(&self, key: &str) -> Option<DateTime<Utc>> {
        match self.get_data(key) {
            Some(Value::Time(t)) => Some(t),
            _ => None,
        }
    }

    /// Priority scan as a nested collection. Exact kind match.
    pub fn get_collection(&self, key: &str) -> Option<DatasetCollection> {
        self.get_data(key).and_then(|v| v.as_collection())
    }

    /// Recursively copy every entry. See [`Dataset::deep_clone`].
    pub fn deep_clone(&self) -> DatasetCollection {
        let cloned = DatasetCollection::new();
        {
            let source = self.entries.read();
            let mut target = cloned.entries.write();
            for entry in source.iter() {
                target.push(entry.deep_clone());
            }
        }
        cloned
    }
}

impl fmt::Display for DatasetCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = self.entries.read();
        let parts: Vec<String> = entries
            .iter()
            .enumerate()
            .map(|(index, entry)| format!("{index}:{entry}"))
            .collect();
        write!(f, "DatasetCollection[{}]", parts.join(" "))
    }
}

impl FromIterator<Dataset> for DatasetCollection {
    fn from_iter<I: IntoIterator<Item = Dataset>>(iter: I) -> Self {
        let col = DatasetCollection::new();
        for entry in iter {
            col.push(entry);
        }
        col
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(key: &str, value: &str) -> Dataset {
        let ds = Dataset::new();
        ds.set(key, value);
        ds
    }

    #[test]
    fn test_push_pop_shift_unshift() {
        let col = DatasetCollection::new();
        col.push(entry("n", "a"));
        col.push(entry("n", "b"));
        col.unshift(entry("n", "front"));

        assert_eq!(col.count(), 3);
        assert_eq!(col.get(0).unwrap().get_string("n").as_deref(), Some("front"));

        let last = col.pop().unwrap();
        assert_eq!(last.get_string("n").as_deref(), Some("b"));
        let first = col.shift().unwrap();
        assert_eq!(first.get_string("n").as_deref(), Some("front"));
        assert_eq!(col.count(), 1);
    }

    #[test]
    fn test_pop_and_shift_empty() {
        let col = DatasetCollection::new();
        assert!(col.pop().is_none());
        assert!(col.shift().is_none());
    }

    #[test]
    fn test_get_out_of_range() {
        let col = DatasetCollection::new();
        col.push(entry("n", "a"));
        assert!(col.get(1).is_none());
    }

    #[test]
    fn test_priority_scan_recency_wins() {
        let col = DatasetCollection::new();
        col.push(entry("x", "outer"));
        col.push(entry("x", "inner"));
        assert_eq!(col.get_data_string("x").as_deref(), Some("inner"));

        col.pop();
        assert_eq!(col.get_data_string("x").as_deref(), Some("outer"));
    }

    #[test]
    fn test_priority_scan_falls_through_to_older_entries() {
        let root = Dataset::new();
        root.set("name", "Al");
        let col = DatasetCollection::new();
        col.push(root);
        col.push(Dataset::new()); // top scope has no own `name`
        assert_eq!(col.get_data_string("name").as_deref(), Some("Al"));
    }

    #[test]
    fn test_typed_data_accessors_exact_kind() {
        let ds = Dataset::new();
        ds.set("i", 5);
        ds.set("f", 1.5);
        ds.set("b", true);
        let col = DatasetCollection::new();
        col.push(ds);

        assert_eq!(col.get_data_int("i"), Some(5));
        assert_eq!(col.get_data_float("f"), Some(1.5));
        assert_eq!(col.get_data_bool("b"), Some(true));
        // no cross-kind coercion at the collection level
        assert_eq!(col.get_data_int("f"), None);
        assert_eq!(col.get_data_bool("i"), None);
    }

    #[test]
    fn test_get_collection_requires_collection_kind() {
        let ds = Dataset::new();
        ds.set("items", DatasetCollection::new());
        ds.set("name", "x");
        let col = DatasetCollection::new();
        col.push(ds);

        assert!(col.get_collection("items").is_some());
        assert!(col.get_collection("name").is_none());
        assert!(col.get_collection("absent").is_none());
    }

    #[test]
    fn test_deep_clone_isolation() {
        let col = DatasetCollection::new();
        col.push(entry("n", "a"));

        let copy = col.deep_clone();
        copy.get(0).unwrap().set("n", "changed");

        assert_eq!(col.get(0).unwrap().get_string("n").as_deref(), Some("a"));
    }

    #[test]
    fn test_display_indexes_entries() {
        let col = DatasetCollection::new();
        col.push(entry("a", "1"));
        col.push(entry("b", "2"));
        assert_eq!(
            col.to_string(),
            "DatasetCollection[0:Dataset{a:1} 1:Dataset{b:2}]"
        );
    }
}
