//! Storage trait and record filters.

use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::error::Result;

/// Comparison applied by a [`Filter`]
#[derive(Debug, Clone, PartialEq)]
pub enum FilterOp {
    Eq,
    Ne,
    /// Substring of a string field, or element of an array field
    Contains,
}

/// Field predicate evaluated against the JSON form of a record
#[derive(Debug, Clone)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

impl Filter {
    fn with_op(field: impl Into<String>, op: FilterOp, value: impl Serialize) -> Self {
        Self {
            field: field.into(),
            op,
            value: serde_json::to_value(value).unwrap_or(Value::Null),
        }
    }

    pub fn eq(field: impl Into<String>, value: impl Serialize) -> Self {
        Self::with_op(field, FilterOp::Eq, value)
    }

    pub fn ne(field: impl Into<String>, value: impl Serialize) -> Self {
        Self::with_op(field, FilterOp::Ne, value)
    }

    pub fn contains(field: impl Into<String>, value: impl Serialize) -> Self {
        Self::with_op(field, FilterOp::Contains, value)
    }

    /// Missing fields compare equal to `null`
    pub fn matches(&self, record: &Value) -> bool {
        let field_value = record.get(&self.field);
        match &self.op {
            FilterOp::Eq => field_value.map(|v| *v == self.value).unwrap_or(self.value.is_null()),
            FilterOp::Ne => field_value.map(|v| *v != self.value).unwrap_or(!self.value.is_null()),
            FilterOp::Contains => match (field_value, &self.value) {
                (Some(Value::String(s)), Value::String(needle)) => s.contains(needle.as_str()),
                (Some(Value::Array(items)), needle) => items.contains(needle),
                _ => false,
            },
        }
    }
}

/// Records addressable by a string id
pub trait HasId {
    fn id(&self) -> &str;
}

/// Collection-oriented record storage
pub trait Storage: Send + Sync {
    /// Insert a record; fails if the id already exists in the collection
    fn create<T: Serialize + HasId>(&self, collection: &str, record: &T) -> Result<()>;

    fn get<T: DeserializeOwned>(&self, collection: &str, id: &str) -> Result<Option<T>>;

    /// Overwrite an existing record; `NotFound` if absent
    fn update<T: Serialize + HasId>(&self, collection: &str, record: &T) -> Result<()>;

    fn query<T: DeserializeOwned>(&self, collection: &str, filters: &[Filter]) -> Result<Vec<T>>;

    fn list<T: DeserializeOwned>(&self, collection: &str) -> Result<Vec<T>> {
        self.query(collection, &[])
    }

    /// Remove every record matching `predicate` and insert `records`, as one
    /// write. Readers see either the old or the new contents. Returns the
    /// number of records removed.
    fn replace_where<T, F>(&self, collection: &str, predicate: F, records: &[T]) -> Result<usize>
    where
        T: Serialize + HasId,
        F: Fn(&Value) -> bool;
}
