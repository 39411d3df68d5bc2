pub mod collections;
pub mod error;
pub mod file;
pub mod filter;
pub mod memory;
pub mod store;
pub mod supabase;

use std::sync::Arc;

use tracing::info;

use shared_config::{AppConfig, StorageBackend};

pub use error::StoreError;
pub use file::FileStore;
pub use filter::{ConflictPredicate, RecordFilter};
pub use memory::MemoryStore;
pub use store::{decode_record, encode_record, RecordStore};
pub use supabase::{SupabaseClient, SupabaseStore};

/// Build the store selected by `STORAGE_BACKEND`.
pub async fn open_store(config: &AppConfig) -> Result<Arc<dyn RecordStore>, StoreError> {
    let store: Arc<dyn RecordStore> = match config.storage_backend {
        StorageBackend::Memory => {
            info!("Using in-memory record store");
            Arc::new(MemoryStore::new())
        }
        StorageBackend::File => {
            info!("Using file record store at {}", config.data_dir.display());
            Arc::new(FileStore::open(&config.data_dir).await?)
        }
        StorageBackend::Supabase => {
            info!("Using Supabase record store at {}", config.supabase_url);
            Arc::new(SupabaseStore::new(config))
        }
    };

    Ok(store)
}
