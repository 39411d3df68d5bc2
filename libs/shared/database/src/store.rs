use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use crate::error::StoreError;
use crate::filter::{ConflictPredicate, RecordFilter};

/// Minimal document-store contract consumed by the scheduling services.
///
/// Records are JSON objects carrying a string `id` field.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn read_record(&self, collection: &str, id: &str) -> Result<Value, StoreError>;

    async fn query_records(
        &self,
        collection: &str,
        filter: &RecordFilter,
    ) -> Result<Vec<Value>, StoreError>;

    /// Plain upsert for uncontested writes.
    async fn write_record(&self, collection: &str, id: &str, record: Value)
        -> Result<(), StoreError>;

    /// Insert or replace `id` only if no other record satisfies `predicate`.
    ///
    /// The predicate evaluation and the write happen atomically with respect
    /// to other guarded writes on the same collection.
    async fn write_record_if_unconflicted(
        &self,
        collection: &str,
        id: &str,
        record: Value,
        predicate: &ConflictPredicate,
    ) -> Result<(), StoreError>;

    /// Replace `id` only if the stored record still satisfies `expected`.
    ///
    /// Fails with `NotFound` when `id` is absent and with `Conflict` when the
    /// stored record no longer matches, leaving it untouched.
    async fn write_record_if_matches(
        &self,
        collection: &str,
        id: &str,
        record: Value,
        expected: &RecordFilter,
    ) -> Result<(), StoreError>;
}

/// Parse a stored document into its typed form.
pub fn decode_record<T: DeserializeOwned>(collection: &str, record: Value) -> Result<T, StoreError> {
    serde_json::from_value(record).map_err(|e| StoreError::malformed(collection, e.to_string()))
}

pub fn encode_record<T: Serialize>(collection: &str, value: &T) -> Result<Value, StoreError> {
    serde_json::to_value(value).map_err(|e| StoreError::malformed(collection, e.to_string()))
}

/// Stamp `id` onto the record, rejecting non-object documents.
pub(crate) fn with_id(collection: &str, id: &str, mut record: Value) -> Result<Value, StoreError> {
    match record.as_object_mut() {
        Some(fields) => {
            fields.insert("id".to_string(), Value::String(id.to_string()));
            Ok(record)
        }
        None => Err(StoreError::malformed(collection, "record must be a JSON object")),
    }
}
