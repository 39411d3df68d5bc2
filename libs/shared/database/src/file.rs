use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::filter::{ConflictPredicate, RecordFilter};
use crate::memory::{check_current, find_conflict, query_from, read_from, Collection, Collections};
use crate::store::{with_id, RecordStore};

/// Development backend: one `<collection>.json` file per collection, each a
/// JSON object keyed by record id. Everything is loaded on open and the
/// affected collection is rewritten after every write.
#[derive(Debug)]
pub struct FileStore {
    dir: PathBuf,
    collections: RwLock<Collections>,
}

impl FileStore {
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).await?;

        let mut collections = Collections::new();
        let mut entries = fs::read_dir(&dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|stem| stem.to_str()) else {
                warn!("Skipping data file with non UTF-8 name: {}", path.display());
                continue;
            };

            let raw = fs::read(&path).await?;
            let records: Collection = serde_json::from_slice(&raw)
                .map_err(|e| StoreError::malformed(name, e.to_string()))?;
            debug!("Loaded {} records from {}", records.len(), path.display());
            collections.insert(name.to_string(), records);
        }

        info!("Opened file store at {} ({} collections)", dir.display(), collections.len());

        Ok(Self {
            dir,
            collections: RwLock::new(collections),
        })
    }

    fn collection_path(&self, collection: &str) -> PathBuf {
        self.dir.join(format!("{}.json", collection))
    }

    /// Rewrite one collection file via a temp file and rename.
    async fn persist(&self, collection: &str, records: &Collection) -> Result<(), StoreError> {
        let path = self.collection_path(collection);
        let tmp = path.with_extension("json.tmp");
        let body = serde_json::to_vec_pretty(records)
            .map_err(|e| StoreError::malformed(collection, e.to_string()))?;

        fs::write(&tmp, body).await?;
        fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn insert(
        &self,
        collections: &mut Collections,
        collection: &str,
        id: &str,
        record: Value,
    ) -> Result<(), StoreError> {
        let records = collections.entry(collection.to_string()).or_default();
        let previous = records.insert(id.to_string(), record);

        if let Err(e) = self.persist(collection, records).await {
            // Keep memory in step with disk.
            match previous {
                Some(old) => records.insert(id.to_string(), old),
                None => records.remove(id),
            };
            return Err(e);
        }

        Ok(())
    }
}

#[async_trait]
impl RecordStore for FileStore {
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
        self.insert(&mut collections, collection, id, record).await?;
        debug!("Wrote {}/{} to disk", collection, id);
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

        self.insert(&mut collections, collection, id, record).await?;
        debug!("Guarded write to {}/{} committed to disk", collection, id);
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

        self.insert(&mut collections, collection, id, record).await?;
        debug!("Conditional write to {}/{} committed to disk", collection, id);
        Ok(())
    }
}
