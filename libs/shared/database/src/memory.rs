use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::StoreError;
use crate::filter::{ConflictPredicate, RecordFilter};
use crate::store::{with_id, RecordStore};

pub(crate) type Collection = BTreeMap<String, Value>;
pub(crate) type Collections = HashMap<String, Collection>;

/// Process-local store. Guarded writes take the write lock for the whole
/// check-and-insert, so concurrent bookings serialize here.
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<Collections>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

pub(crate) fn read_from(
    collections: &Collections,
    collection: &str,
    id: &str,
) -> Result<Value, StoreError> {
    collections
        .get(collection)
        .and_then(|records| records.get(id))
        .cloned()
        .ok_or_else(|| StoreError::not_found(collection, id))
}

pub(crate) fn query_from(
    collections: &Collections,
    collection: &str,
    filter: &RecordFilter,
) -> Vec<Value> {
    collections
        .get(collection)
        .map(|records| {
            records
                .values()
                .filter(|record| filter.matches(record))
                .cloned()
                .collect()
        })
        .unwrap_or_default()
}

/// `Ok` when `id` exists and still matches `expected`.
pub(crate) fn check_current(
    collections: &Collections,
    collection: &str,
    id: &str,
    expected: &RecordFilter,
) -> Result<(), StoreError> {
    let current = collections
        .get(collection)
        .and_then(|records| records.get(id))
        .ok_or_else(|| StoreError::not_found(collection, id))?;

    if expected.matches(current) {
        Ok(())
    } else {
        debug!("{}/{} changed since it was read", collection, id);
        Err(StoreError::conflict(collection, id))
    }
}

pub(crate) fn find_conflict(
    collections: &Collections,
    collection: &str,
    id: &str,
    predicate: &ConflictPredicate,
) -> bool {
    collections
        .get(collection)
        .is_some_and(|records| records.values().any(|record| predicate.conflicts_with(id, record)))
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn read_record(&self, collection: &str, id: &str) -> Result<Value, StoreError> {
        let collections = self.collections.read().await;
        read_from(&collections, collection, id)
    }

    async fn query_records(
        &self,
        collection: &str,
        filter: &RecordFilter,
    ) -> Result<Vec<Value>, StoreError> {
        let collections = self.collections.read().await;
        Ok(query_from(&collections, collection, filter))
    }

    async fn write_record(
        &self,
        collection: &str,
        id: &str,
        record: Value,
    ) -> Result<(), StoreError> {
        let record = with_id(collection, id, record)?;
        let mut collections = self.collections.write().await;
        collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), record);
        debug!("Wrote {}/{}", collection, id);
        Ok(())
    }

    async fn write_record_if_unconflicted(
        &self,
        collection: &str,
        id: &str,
        record: Value,
        predicate: &ConflictPredicate,
    ) -> Result<(), StoreError> {
        let record = with_id(collection, id, record)?;
        let mut collections = self.collections.write().await;

        if find_conflict(&collections, collection, id, predicate) {
            debug!("Guarded write to {}/{} rejected", collection, id);
            return Err(StoreError::conflict(collection, id));
        }

        collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), record);
        debug!("Guarded write to {}/{} committed", collection, id);
        Ok(())
    }

    async fn write_record_if_matches(
        &self,
        collection: &str,
        id: &str,
        record: Value,
        expected: &RecordFilter,
    ) -> Result<(), StoreError> {
        let record = with_id(collection, id, record)?;
        let mut collections = self.collections.write().await;

        check_current(&collections, collection, id, expected)?;

        collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), record);
        debug!("Conditional write to {}/{} committed", collection, id);
        Ok(())
    }
}
