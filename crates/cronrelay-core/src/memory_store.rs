//! In-process record store.
//!
//! Records are held in their serialized JSON form so the generic [`Filter`]
//! language applies directly. Each entry is locked while its guard is
//! evaluated and its patch applied, which makes `update_where` atomic per
//! record.

use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde_json::Value;
use tracing::trace;

use cronrelay_protocols::{Filter, Patch, Record, RecordStore, StoreError};

struct Stored {
    seq: u64,
    value: Value,
}

/// [`RecordStore`] backed by a [`DashMap`].
///
/// `find` returns records in insertion order.
pub struct MemoryStore<R: Record> {
    records: DashMap<String, Stored>,
    next_seq: AtomicU64,
    _marker: PhantomData<fn() -> R>,
}

impl<R: Record> MemoryStore<R> {
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
            next_seq: AtomicU64::new(0),
            _marker: PhantomData,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn decode(value: &Value) -> Result<R, StoreError> {
        Ok(serde_json::from_value(value.clone())?)
    }
}

impl<R: Record> Default for MemoryStore<R> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<R: Record> RecordStore<R> for MemoryStore<R> {
    async fn find(&self, filter: &Filter) -> Result<Vec<R>, StoreError> {
        let mut hits: Vec<(u64, Value)> = self
            .records
            .iter()
            .filter(|entry| filter.matches(&entry.value().value))
            .map(|entry| (entry.value().seq, entry.value().value.clone()))
            .collect();
        hits.sort_by_key(|(seq, _)| *seq);

        hits.iter().map(|(_, value)| Self::decode(value)).collect()
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<R>, StoreError> {
        match self.records.get(id) {
            Some(entry) => Ok(Some(Self::decode(&entry.value().value)?)),
            None => Ok(None),
        }
    }

    async fn create(&self, record: R) -> Result<R, StoreError> {
        let id = record.record_id().to_string();
        let value = serde_json::to_value(&record)?;

        match self.records.entry(id) {
            Entry::Occupied(entry) => Err(StoreError::Duplicate {
                collection: R::COLLECTION.to_string(),
                id: entry.key().clone(),
            }),
            Entry::Vacant(entry) => {
                let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
                trace!("Created {} record {}", R::COLLECTION, entry.key());
                entry.insert(Stored { seq, value });
                Ok(record)
            }
        }
    }

    async fn update_where(
        &self,
        id: &str,
        guard: &Filter,
        patch: Patch,
    ) -> Result<Option<R>, StoreError> {
        let Some(mut entry) = self.records.get_mut(id) else {
            return Ok(None);
        };
        let stored = entry.value_mut();
        if !guard.matches(&stored.value) {
            return Ok(None);
        }

        let mut updated = stored.value.clone();
        patch.apply_to(&mut updated);
        // Reject patches that would leave the record undecodable.
        let record = Self::decode(&updated)?;
        stored.value = updated;
        Ok(Some(record))
    }

    async fn delete_by_id(&self, id: &str) -> Result<bool, StoreError> {
        Ok(self.records.remove(id).is_some())
    }
}

#[cfg(test)]
#[path = "memory_store_tests.rs"]
mod tests;
