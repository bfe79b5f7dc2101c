//! Record store interface and its filter/patch language.
//!
//! Records are addressed through their serialized JSON form, so filters and
//! patches name fields by their wire names (see [`crate::types::fields`]).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::StoreError;

/// A value persisted in a [`RecordStore`] collection.
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Collection name, used in logs and errors.
    const COLLECTION: &'static str;

    /// Unique id within the collection.
    fn record_id(&self) -> &str;
}

/// Comparison operator of a [`Condition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Eq,
    Neq,
    /// Numeric or string less-than. Never matches null.
    Lt,
    /// Field equals one of the values in an array.
    In,
    NotIn,
}

/// A single field comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub field: String,
    pub op: Op,
    pub value: Value,
}

impl Condition {
    pub fn matches(&self, record: &Value) -> bool {
        let actual = record.get(&self.field).unwrap_or(&Value::Null);
        match self.op {
            Op::Eq => values_equal(actual, &self.value),
            Op::Neq => !values_equal(actual, &self.value),
            Op::Lt => value_less_than(actual, &self.value),
            Op::In => in_list(actual, &self.value),
            Op::NotIn => !in_list(actual, &self.value),
        }
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) if a.is_number() && b.is_number() => x == y,
        _ => a == b,
    }
}

fn value_less_than(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x < y,
            _ => false,
        },
        (Value::String(x), Value::String(y)) => x < y,
        _ => false,
    }
}

fn in_list(actual: &Value, list: &Value) -> bool {
    list.as_array()
        .is_some_and(|items| items.iter().any(|item| values_equal(actual, item)))
}

/// Conjunction of conditions. An empty filter matches every record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    pub conditions: Vec<Condition>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(mut self, field: &str, op: Op, value: Value) -> Self {
        self.conditions.push(Condition {
            field: field.to_string(),
            op,
            value,
        });
        self
    }

    pub fn eq(self, field: &str, value: impl Serialize) -> Self {
        self.push(field, Op::Eq, to_value(value))
    }

    pub fn neq(self, field: &str, value: impl Serialize) -> Self {
        self.push(field, Op::Neq, to_value(value))
    }

    pub fn lt(self, field: &str, value: impl Serialize) -> Self {
        self.push(field, Op::Lt, to_value(value))
    }

    /// Less-than against a timestamp, compared as epoch milliseconds.
    pub fn lt_time(self, field: &str, time: DateTime<Utc>) -> Self {
        self.push(field, Op::Lt, Value::from(time.timestamp_millis()))
    }

    pub fn is_in<T: Serialize>(self, field: &str, values: impl IntoIterator<Item = T>) -> Self {
        let list = values.into_iter().map(to_value).collect();
        self.push(field, Op::In, Value::Array(list))
    }

    pub fn not_in<T: Serialize>(self, field: &str, values: impl IntoIterator<Item = T>) -> Self {
        let list = values.into_iter().map(to_value).collect();
        self.push(field, Op::NotIn, Value::Array(list))
    }

    pub fn matches(&self, record: &Value) -> bool {
        self.conditions.iter().all(|c| c.matches(record))
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }
}

fn to_value(value: impl Serialize) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

/// A partial update: top-level fields to overwrite.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Patch(pub Map<String, Value>);

impl Patch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, field: &str, value: impl Serialize) -> Self {
        self.0.insert(field.to_string(), to_value(value));
        self
    }

    pub fn set_null(mut self, field: &str) -> Self {
        self.0.insert(field.to_string(), Value::Null);
        self
    }

    /// Set a timestamp field in its stored (epoch millisecond) form.
    pub fn set_time(mut self, field: &str, time: DateTime<Utc>) -> Self {
        self.0
            .insert(field.to_string(), Value::from(time.timestamp_millis()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Overwrite the patched fields of a serialized record.
    pub fn apply_to(&self, record: &mut Value) {
        if let Value::Object(map) = record {
            for (field, value) in &self.0 {
                map.insert(field.clone(), value.clone());
            }
        }
    }
}

/// Filterable CRUD store over one record collection.
///
/// `update_where` is the conditional write every concurrent actor relies
/// on: the guard is evaluated and the patch applied atomically per record.
#[async_trait]
pub trait RecordStore<R: Record>: Send + Sync {
    async fn find(&self, filter: &Filter) -> Result<Vec<R>, StoreError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<R>, StoreError>;

    /// Insert a new record. Fails with [`StoreError::Duplicate`] if the id exists.
    async fn create(&self, record: R) -> Result<R, StoreError>;

    /// Apply `patch` if the record exists. Returns the updated record.
    async fn update_by_id(&self, id: &str, patch: Patch) -> Result<Option<R>, StoreError> {
        self.update_where(id, &Filter::new(), patch).await
    }

    /// Apply `patch` only if the record exists and matches `guard`.
    async fn update_where(
        &self,
        id: &str,
        guard: &Filter,
        patch: Patch,
    ) -> Result<Option<R>, StoreError>;

    /// Remove a record. Returns whether it existed.
    async fn delete_by_id(&self, id: &str) -> Result<bool, StoreError>;
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
