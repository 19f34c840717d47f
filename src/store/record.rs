// Dynamic record handle returned by the persistence collaborator.
use std::fmt;

use serde_json::Value;

use crate::attrs::Attrs;

/// One persisted object, addressed by its ordered field bag.
///
/// Records are what the store hands back from create/update/query calls and
/// what lifecycle hooks receive in `will_update`/`did_create` and friends.
/// The engine never interprets fields beyond `id`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: Attrs,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_attrs(fields: Attrs) -> Self {
        Self { fields }
    }

    /// Store-assigned identifier, when present.
    pub fn id(&self) -> Option<i64> {
        self.fields.get("id").and_then(Value::as_i64)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.fields.insert(key, value);
        self
    }

    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains(key)
    }

    /// Copy every key from `attrs` onto this record, replacing existing
    /// values. This is the "assign attributes, then save" half of an update.
    pub fn merge(&mut self, attrs: &Attrs) -> &mut Self {
        for (key, value) in attrs.iter() {
            self.fields.insert(key.clone(), value.clone());
        }
        self
    }

    pub fn attrs(&self) -> &Attrs {
        &self.fields
    }

    pub fn to_attrs(&self) -> Attrs {
        self.fields.clone()
    }

    pub fn to_value(&self) -> Value {
        self.fields.clone().into_value()
    }
}

impl From<Attrs> for Record {
    fn from(fields: Attrs) -> Self {
        Self::from_attrs(fields)
    }
}

impl From<Record> for Value {
    fn from(record: Record) -> Self {
        record.fields.into_value()
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Record(id: {:?}, fields: {})", self.id(), self.fields.len())
    }
}
