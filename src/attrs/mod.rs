// Ordered attribute bag carried through every validation phase.
use std::ops::{Add, Index};

use serde_json::{Map, Value};

use crate::error::{fail, ApiError, ApiResult, ValidationErrors};

/// An insertion-ordered mapping from field name to JSON value.
///
/// `Attrs` is the single data carrier of the engine: request payloads are
/// converted into a bag, every hook phase reads and mutates the bag, and the
/// bag is what ultimately gets copied onto a store record. Nested objects
/// keep their own insertion order as well (`serde_json` runs with
/// `preserve_order`), so the same addressing rules apply at every depth.
///
/// Lookup comes in two flavors mirroring the difference between a graceful
/// and a strict read: [`Attrs::get`] returns `None` for an absent key (an
/// explicit "undefined", distinguishable from a stored `Value::Null`), while
/// indexing `bag["key"]` panics when the key is missing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attrs {
    inner: Map<String, Value>,
}

impl Attrs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a bag from a JSON value, which must be an object.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self { inner: map }),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.inner.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.inner.get_mut(key)
    }

    /// Insert or replace a value, returning the previous one if any.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.inner.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.inner.shift_remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.inner.keys().map(String::as_str)
    }

    /// Keys in alphabetical order. Field-scoped hooks run in this order.
    pub fn sorted_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.inner.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.inner.iter()
    }

    /// Non-mutating merge: a new bag with `other`'s entries overlaid.
    pub fn merged(&self, other: &Attrs) -> Attrs {
        let mut result = self.clone();
        for (key, value) in other.iter() {
            result.insert(key.clone(), value.clone());
        }
        result
    }

    /// A new bag containing only the listed keys (absent keys are skipped).
    pub fn pluck(&self, keys: &[&str]) -> Attrs {
        let mut result = Attrs::new();
        for &key in keys {
            if let Some(value) = self.get(key) {
                result.insert(key, value.clone());
            }
        }
        result
    }

    /// Strict read that signals a validation failure for an absent key.
    pub fn require(&self, key: &str) -> ApiResult<&Value> {
        self.get(key)
            .ok_or_else(|| fail(key, "This field is required"))
    }

    /// Require every listed key, reporting all missing fields at once.
    pub fn require_all(&self, keys: &[&str]) -> ApiResult<()> {
        let mut errors = ValidationErrors::new();
        for &key in keys {
            if !self.contains(key) {
                errors.push(key, "This field is required");
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ApiError::Validation(errors))
        }
    }

    /// Move the value stored under `from` to `to`.
    pub fn rename(&mut self, from: &str, to: &str) -> ApiResult<()> {
        match self.remove(from) {
            Some(value) => {
                self.insert(to, value);
                Ok(())
            }
            None => Err(ApiError::Contract(format!(
                "cannot rename missing attribute `{from}`"
            ))),
        }
    }

    /// Apply `f` to every key, recursing into nested objects and lists.
    pub fn map_keys_recursive(&self, f: &dyn Fn(&str) -> String) -> Attrs {
        match map_keys(&Value::Object(self.inner.clone()), f) {
            Value::Object(map) => Attrs { inner: map },
            _ => unreachable!("object input maps to object output"),
        }
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.inner
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.inner)
    }
}

/// Recursively rewrite object keys with `f`, descending through arrays.
pub fn map_keys(value: &Value, f: &dyn Fn(&str) -> String) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, value)| (f(key), map_keys(value, f)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(|item| map_keys(item, f)).collect()),
        other => other.clone(),
    }
}

impl From<Map<String, Value>> for Attrs {
    fn from(map: Map<String, Value>) -> Self {
        Self { inner: map }
    }
}

impl From<Attrs> for Value {
    fn from(attrs: Attrs) -> Self {
        attrs.into_value()
    }
}

impl FromIterator<(String, Value)> for Attrs {
    /// Later pairs win on key collision.
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        let mut attrs = Attrs::new();
        for (key, value) in iter {
            attrs.insert(key, value);
        }
        attrs
    }
}

impl Index<&str> for Attrs {
    type Output = Value;

    fn index(&self, key: &str) -> &Value {
        self.inner
            .get(key)
            .unwrap_or_else(|| panic!("no attribute `{key}`"))
    }
}

impl Add<&Attrs> for &Attrs {
    type Output = Attrs;

    fn add(self, other: &Attrs) -> Attrs {
        self.merged(other)
    }
}

impl PartialEq<Map<String, Value>> for Attrs {
    fn eq(&self, other: &Map<String, Value>) -> bool {
        &self.inner == other
    }
}

impl<'a> IntoIterator for &'a Attrs {
    type Item = (&'a String, &'a Value);
    type IntoIter = serde_json::map::Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.inner.iter()
    }
}

impl IntoIterator for Attrs {
    type Item = (String, Value);
    type IntoIter = serde_json::map::IntoIter;

    fn into_iter(self) -> Self::IntoIter {
        self.inner.into_iter()
    }
}
