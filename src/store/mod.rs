// Persistence collaborator interface: the engine mutates state only here.
pub mod memory;
pub mod record;

use serde_json::Value;

use crate::attrs::Attrs;
use crate::error::ApiResult;

pub use memory::MemStore;
pub use record::Record;

/// A resolved target collection: nothing, a single record, or many.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Selection {
    #[default]
    Empty,
    One(Record),
    Many(Vec<Record>),
}

impl Selection {
    pub fn one(record: Record) -> Self {
        Selection::One(record)
    }

    pub fn many(records: Vec<Record>) -> Self {
        Selection::Many(records)
    }

    /// Does this selection represent multiple items?
    pub fn is_many(&self) -> bool {
        matches!(self, Selection::Many(_))
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Selection::Empty)
    }

    pub fn len(&self) -> usize {
        match self {
            Selection::Empty => 0,
            Selection::One(_) => 1,
            Selection::Many(records) => records.len(),
        }
    }

    /// The single record of a one-item selection.
    pub fn single(&self) -> Option<&Record> {
        match self {
            Selection::One(record) => Some(record),
            _ => None,
        }
    }

    pub fn records(&self) -> Vec<&Record> {
        match self {
            Selection::Empty => Vec::new(),
            Selection::One(record) => vec![record],
            Selection::Many(records) => records.iter().collect(),
        }
    }

    pub fn into_records(self) -> Vec<Record> {
        match self {
            Selection::Empty => Vec::new(),
            Selection::One(record) => vec![record],
            Selection::Many(records) => records,
        }
    }
}

/// The external persistence abstraction.
///
/// The engine calls `create`/`create_many`/`update`/`delete` exactly once
/// per successful operation, strictly after every validation phase. The
/// query surface (`all`/`find`/`get`) is what endpoint `query` closures use
/// to resolve a request's target collection; consistency and transaction
/// semantics are entirely the implementor's concern.
pub trait ObjectStore: Send + Sync {
    fn create(&self, model: &str, attrs: &Attrs) -> ApiResult<Record>;

    /// Insert a batch in one call, returning records in input order.
    fn create_many(&self, model: &str, batch: &[Attrs]) -> ApiResult<Vec<Record>>;

    /// Copy every key from `attrs` onto the stored record and save it.
    fn update(&self, model: &str, instance: &Record, attrs: &Attrs) -> ApiResult<Record>;

    /// Delete every record in the selection; returns the detached records.
    fn delete(&self, model: &str, selection: Selection) -> ApiResult<Selection>;

    fn all(&self, model: &str) -> ApiResult<Vec<Record>>;

    fn find(&self, model: &str, field: &str, value: &Value) -> ApiResult<Vec<Record>>;

    /// Single-record lookup; `NotFound` when nothing matches.
    fn get(&self, model: &str, field: &str, value: &Value) -> ApiResult<Record>;
}
