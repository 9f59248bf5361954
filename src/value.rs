//! Dynamically-typed values stored in datasets.
//!
//! `Value` is the closed set of kinds a [`Dataset`](crate::Dataset) can hold.
//! Nested containers (`Dataset`, `Collection`) are cheap shared handles, so
//! cloning a `Value` shares them; use [`Value::deep_clone`] for an isolated
//! copy. Anything outside the closed set travels as an [`OpaqueValue`]
//! trait object: it can be formatted and capability-probed, never traversed.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::dataset::{Dataset, DatasetCollection};

/// A string lookup table capability.
///
/// The renderer resolves `##key##` markup through this trait. The concrete
/// table is located once per render at the reserved `"#"` key of the root
/// dataset, via [`OpaqueValue::as_lexicon`].
pub trait Lexicon: Send + Sync {
    /// Look up an entry. Absent keys return an empty string.
    fn get(&self, key: &str) -> String;
}

/// A value outside the closed [`Value`] kinds.
///
/// Opaque values are shared by reference (cloning a `Value` or deep-cloning
/// a dataset never copies them), can always be formatted to some string, and
/// may expose capabilities through the probe methods.
pub trait OpaqueValue: fmt::Debug + Send + Sync {
    /// Render this value as text.
    fn format(&self) -> String;

    /// Expose this value as a language table, if it is one.
    fn as_lexicon(&self) -> Option<&dyn Lexicon> {
        None
    }
}

/// One dynamically-typed value.
///
/// `Clone` shares container handles; [`Value::deep_clone`] copies them.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Time(DateTime<Utc>),
    StrList(Vec<String>),
    BoolList(Vec<bool>),
    IntList(Vec<i64>),
    FloatList(Vec<f64>),
    TimeList(Vec<DateTime<Utc>>),
    Dataset(Dataset),
    Collection(DatasetCollection),
    Opaque(Arc<dyn OpaqueValue>),
}

impl Value {
    /// Wrap an opaque value.
    pub fn opaque<T: OpaqueValue + 'static>(value: T) -> Self {
        Value::Opaque(Arc::new(value))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Format this value as text. Every kind formats to *some* string;
    /// `Null` formats to the empty string.
    pub fn format(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Str(s) => s.clone(),
            Value::Time(t) => t.to_string(),
            Value::StrList(l) => format_list(l),
            Value::BoolList(l) => format_list(l),
            Value::IntList(l) => format_list(l),
            Value::FloatList(l) => format_list(l),
            Value::TimeList(l) => format_list(l),
            Value::Dataset(d) => d.to_string(),
            Value::Collection(c) => c.to_string(),
            Value::Opaque(o) => o.format(),
        }
    }

    /// Coerce to boolean where unambiguous.
    ///
    /// Numbers map zero/non-zero, a zero timestamp is false, and any other
    /// present kind is truthy except `Null`.
    pub fn as_bool(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Time(t) => *t != DateTime::UNIX_EPOCH,
            _ => true,
        }
    }

    /// Coerce to integer: bool maps 0/1, floats truncate toward zero,
    /// timestamps yield unix seconds (zero timestamp yields 0).
    /// Non-numeric kinds do not coerce.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Bool(b) => Some(i64::from(*b)),
            Value::Int(i) => Some(*i),
            Value::Float(f) => Some(*f as i64),
            Value::Time(t) if *t == DateTime::UNIX_EPOCH => Some(0),
            Value::Time(t) => Some(t.timestamp()),
            _ => None,
        }
    }

    /// Coerce to float: bool maps 0.0/1.0, integers widen, timestamps yield
    /// unix seconds. Non-numeric kinds do not coerce.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::Time(t) if *t == DateTime::UNIX_EPOCH => Some(0.0),
            Value::Time(t) => Some(t.timestamp() as f64),
            _ => None,
        }
    }

    /// The nested dataset handle, if this value is one. Exact kind match.
    pub fn as_dataset(&self) -> Option<Dataset> {
        match self {
            Value::Dataset(d) => Some(d.clone()),
            _ => None,
        }
    }

    /// The nested collection handle, if this value is one. Exact kind match.
    pub fn as_collection(&self) -> Option<DatasetCollection> {
        match self {
            Value::Collection(c) => Some(c.clone()),
            _ => None,
        }
    }

    /// The opaque handle, if this value is one.
    pub fn as_opaque(&self) -> Option<Arc<dyn OpaqueValue>> {
        match self {
            Value::Opaque(o) => Some(Arc::clone(o)),
            _ => None,
        }
    }

    /// Recursively copy nested containers; scalars copy by value, opaque
    /// values stay shared. Mutations through the copy are never observable
    /// through the original.
    pub fn deep_clone(&self) -> Value {
        match self {
            Value::Dataset(d) => Value::Dataset(d.deep_clone()),
            Value::Collection(c) => Value::Collection(c.deep_clone()),
            other => other.clone(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format())
    }
}

/// Space-separated bracketed list, matching scalar formatting.
fn format_list<T: fmt::Display>(items: &[T]) -> String {
    let inner: Vec<String> = items.iter().map(ToString::to_string).collect();
    format!("[{}]", inner.join(" "))
}

// ============================================================================
// Conversions
// ============================================================================

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Time(v)
    }
}

impl From<Vec<String>> for Value {
    fn from(v: Vec<String>) -> Self {
        Value::StrList(v)
    }
}

impl From<Vec<i64>> for Value {
    fn from(v: Vec<i64>) -> Self {
        Value::IntList(v)
    }
}

impl From<Vec<f64>> for Value {
    fn from(v: Vec<f64>) -> Self {
        Value::FloatList(v)
    }
}

impl From<Vec<bool>> for Value {
    fn from(v: Vec<bool>) -> Self {
        Value::BoolList(v)
    }
}

impl From<Dataset> for Value {
    fn from(v: Dataset) -> Self {
        Value::Dataset(v)
    }
}

impl From<DatasetCollection> for Value {
    fn from(v: DatasetCollection) -> Self {
        Value::Collection(v)
    }
}
