//! Structurally comparable argument values.
//!
//! Call arguments are described with [`HashableValue`] so that a cache key can
//! be derived from them without reflection: sets compare by content regardless
//! of insertion order and maps compare by sorted keys.

use serde_json::{Map, Number, Value};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

#[derive(Debug, Clone, PartialEq)]
pub enum HashableValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// Ordered sequence (lists, tuples, slices).
    Seq(Vec<HashableValue>),
    /// Unordered collection; member order never affects identity.
    Set(Vec<HashableValue>),
    Map(BTreeMap<String, HashableValue>),
}

impl HashableValue {
    /// Build a set value from any iterable.
    pub fn set<I, T>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<HashableValue>,
    {
        HashableValue::Set(items.into_iter().map(Into::into).collect())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            HashableValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            HashableValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            HashableValue::Int(i) if *i >= 0 => Some(*i as u64),
            _ => None,
        }
    }

    /// Canonical JSON form: maps sorted by key, sets sorted by the canonical
    /// text of their members, sequences kept in order.
    pub fn to_canonical_json(&self) -> Value {
        match self {
            HashableValue::Null => Value::Null,
            HashableValue::Bool(b) => Value::Bool(*b),
            HashableValue::Int(i) => Value::Number((*i).into()),
            HashableValue::Float(f) => Number::from_f64(*f).map(Value::Number).unwrap_or(Value::Null),
            HashableValue::Str(s) => Value::String(s.clone()),
            HashableValue::Seq(items) => {
                Value::Array(items.iter().map(HashableValue::to_canonical_json).collect())
            }
            HashableValue::Set(items) => {
                let mut members: Vec<(String, Value)> = items
                    .iter()
                    .map(|item| {
                        let json = item.to_canonical_json();
                        (json.to_string(), json)
                    })
                    .collect();
                members.sort_by(|a, b| a.0.cmp(&b.0));
                members.dedup_by(|a, b| a.0 == b.0);
                // Tag sets so that a set never collides with a list of the same members.
                let mut tagged = Map::new();
                tagged.insert(
                    "__set__".to_string(),
                    Value::Array(members.into_iter().map(|(_, v)| v).collect()),
                );
                Value::Object(tagged)
            }
            HashableValue::Map(map) => {
                let mut out = Map::new();
                for (k, v) in map {
                    out.insert(k.clone(), v.to_canonical_json());
                }
                Value::Object(out)
            }
        }
    }

    /// Collect every string leaf, depth first.
    pub fn collect_text<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            HashableValue::Str(s) => out.push(s),
            HashableValue::Seq(items) | HashableValue::Set(items) => {
                for item in items {
                    item.collect_text(out);
                }
            }
            HashableValue::Map(map) => {
                for v in map.values() {
                    v.collect_text(out);
                }
            }
            _ => {}
        }
    }
}

impl From<Value> for HashableValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => HashableValue::Null,
            Value::Bool(b) => HashableValue::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => HashableValue::Int(i),
                None => HashableValue::Float(n.as_f64().unwrap_or(0.0)),
            },
            Value::String(s) => HashableValue::Str(s),
            Value::Array(items) => HashableValue::Seq(items.into_iter().map(Into::into).collect()),
            Value::Object(map) => {
                HashableValue::Map(map.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
        }
    }
}

impl From<&str> for HashableValue {
    fn from(s: &str) -> Self {
        HashableValue::Str(s.to_string())
    }
}

impl From<String> for HashableValue {
    fn from(s: String) -> Self {
        HashableValue::Str(s)
    }
}

impl From<bool> for HashableValue {
    fn from(b: bool) -> Self {
        HashableValue::Bool(b)
    }
}

impl From<i64> for HashableValue {
    fn from(i: i64) -> Self {
        HashableValue::Int(i)
    }
}

impl From<i32> for HashableValue {
    fn from(i: i32) -> Self {
        HashableValue::Int(i as i64)
    }
}

impl From<u32> for HashableValue {
    fn from(i: u32) -> Self {
        HashableValue::Int(i as i64)
    }
}

impl From<f64> for HashableValue {
    fn from(f: f64) -> Self {
        HashableValue::Float(f)
    }
}

impl<T: Into<HashableValue>> From<Option<T>> for HashableValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(HashableValue::Null)
    }
}

impl<T: Into<HashableValue>> From<Vec<T>> for HashableValue {
    fn from(items: Vec<T>) -> Self {
        HashableValue::Seq(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<HashableValue>> From<BTreeSet<T>> for HashableValue {
    fn from(items: BTreeSet<T>) -> Self {
        HashableValue::set(items)
    }
}

impl<T: Into<HashableValue>> From<HashSet<T>> for HashableValue {
    fn from(items: HashSet<T>) -> Self {
        HashableValue::set(items)
    }
}

impl<V: Into<HashableValue>> From<BTreeMap<String, V>> for HashableValue {
    fn from(map: BTreeMap<String, V>) -> Self {
        HashableValue::Map(map.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

impl<V: Into<HashableValue>> From<HashMap<String, V>> for HashableValue {
    fn from(map: HashMap<String, V>) -> Self {
        HashableValue::Map(map.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}
