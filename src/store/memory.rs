// In-memory object store used by the demo binary and the test-suite.
use std::collections::HashMap;
use std::sync::Mutex;

use serde_json::Value;

use crate::attrs::Attrs;
use crate::error::{not_found, ApiError, ApiResult};
use crate::store::{ObjectStore, Record, Selection};

#[derive(Default)]
struct Table {
    next_id: i64,
    rows: Vec<Record>,
}

impl Table {
    fn assign_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn position_of(&self, id: i64) -> Option<usize> {
        self.rows.iter().position(|row| row.id() == Some(id))
    }
}

/// Reference [`ObjectStore`] backed by per-model row vectors.
///
/// Ids are sequential integers assigned per model; rows keep insertion
/// order. Interior mutability keeps the trait surface `&self`, matching
/// stores that talk to an external database.
#[derive(Default)]
pub struct MemStore {
    tables: Mutex<HashMap<String, Table>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of persisted rows for a model (test helper).
    pub fn count(&self, model: &str) -> usize {
        self.tables
            .lock()
            .expect("store lock")
            .get(model)
            .map_or(0, |table| table.rows.len())
    }
}

impl ObjectStore for MemStore {
    fn create(&self, model: &str, attrs: &Attrs) -> ApiResult<Record> {
        let mut tables = self.tables.lock().expect("store lock");
        let table = tables.entry(model.to_string()).or_default();
        let id = table.assign_id();

        let mut record = Record::new();
        record.set("id", id);
        record.merge(attrs);
        table.rows.push(record.clone());
        tracing::debug!(model, id, "created record");
        Ok(record)
    }

    fn create_many(&self, model: &str, batch: &[Attrs]) -> ApiResult<Vec<Record>> {
        let mut tables = self.tables.lock().expect("store lock");
        let table = tables.entry(model.to_string()).or_default();

        let mut records = Vec::with_capacity(batch.len());
        for attrs in batch {
            let id = table.assign_id();
            let mut record = Record::new();
            record.set("id", id);
            record.merge(attrs);
            table.rows.push(record.clone());
            records.push(record);
        }
        tracing::debug!(model, count = records.len(), "bulk-created records");
        Ok(records)
    }

    fn update(&self, model: &str, instance: &Record, attrs: &Attrs) -> ApiResult<Record> {
        let id = instance.id().ok_or_else(|| {
            ApiError::Contract(format!("cannot update a `{model}` record without an id"))
        })?;

        let mut tables = self.tables.lock().expect("store lock");
        let table = tables
            .get_mut(model)
            .ok_or_else(|| not_found(format!("No {model} found")))?;
        let position = table
            .position_of(id)
            .ok_or_else(|| not_found(format!("No {model} with id {id} found")))?;

        let row = &mut table.rows[position];
        row.merge(attrs);
        Ok(row.clone())
    }

    fn delete(&self, model: &str, selection: Selection) -> ApiResult<Selection> {
        let mut tables = self.tables.lock().expect("store lock");
        if let Some(table) = tables.get_mut(model) {
            for record in selection.records() {
                if let Some(id) = record.id() {
                    if let Some(position) = table.position_of(id) {
                        table.rows.remove(position);
                    }
                }
            }
        }
        Ok(selection)
    }

    fn all(&self, model: &str) -> ApiResult<Vec<Record>> {
        let tables = self.tables.lock().expect("store lock");
        Ok(tables.get(model).map_or_else(Vec::new, |table| table.rows.clone()))
    }

    fn find(&self, model: &str, field: &str, value: &Value) -> ApiResult<Vec<Record>> {
        let tables = self.tables.lock().expect("store lock");
        Ok(tables.get(model).map_or_else(Vec::new, |table| {
            table
                .rows
                .iter()
                .filter(|row| row.get(field) == Some(value))
                .cloned()
                .collect()
        }))
    }

    fn get(&self, model: &str, field: &str, value: &Value) -> ApiResult<Record> {
        self.find(model, field, value)?
            .into_iter()
            .next()
            .ok_or_else(|| not_found(format!("No {model} with {field} = {value} found")))
    }
}
